use super::*;

#[test]
fn position_first_line() {
    let map = LineMap::build("abc\ndef");
    assert_eq!(map.position(1), Position::new(0, 1));
}

#[test]
fn position_after_newline() {
    let map = LineMap::build("abc\ndef\nghi");
    assert_eq!(map.position(4), Position::new(1, 0));
    assert_eq!(map.position(9), Position::new(2, 1));
}

#[test]
fn position_at_line_start_boundary() {
    let map = LineMap::build("a\nb");
    assert_eq!(map.position(2), Position::new(1, 0));
}

#[test]
fn line_count_counts_trailing() {
    assert_eq!(LineMap::build("").line_count(), 1);
    assert_eq!(LineMap::build("a\nb\n").line_count(), 3);
}

#[test]
fn details_render_caret_under_column() {
    let source = "let x = 3\nlet y = oops + 1\n";
    let offset = source.find("oops").unwrap() as u32;
    let details = LineDetails::from_offset(source, offset);

    assert_eq!(details.line_number, 2);
    assert_eq!(details.line, "let y = oops + 1");
    assert_eq!(details.marker, "        ^");
}

#[test]
fn details_preserve_tab_alignment() {
    let source = "\tbad";
    let details = LineDetails::from_offset(source, 1);
    assert_eq!(details.marker, "\t^");
}
