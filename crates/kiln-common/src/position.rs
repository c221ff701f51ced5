//! Line/column positions and error-rendering details.
//!
//! The AST tracks byte offsets; user-facing diagnostics need line numbers,
//! the offending line's text, and a caret marker under the column.

/// A position in a source file (0-indexed line, byte column within the line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    /// 0-indexed line number
    pub line: u32,
    /// 0-indexed byte column
    pub column: u32,
}

impl Position {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Line map for efficient offset -> position conversion.
/// Stores the starting offset of each line.
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Starting offset of each line (`line_starts[0]` is always 0)
    line_starts: Vec<u32>,
}

impl LineMap {
    /// Build a line map from source text.
    #[must_use]
    pub fn build(source: &str) -> Self {
        let mut line_starts = vec![0u32];

        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(u32::try_from(i + 1).unwrap_or(u32::MAX));
            }
        }

        Self { line_starts }
    }

    /// Convert a byte offset to a line/column position.
    #[must_use]
    pub fn position(&self, offset: u32) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_point) => insert_point.saturating_sub(1),
        };

        let line_start = self.line_starts.get(line).copied().unwrap_or(0);

        Position {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: offset.saturating_sub(line_start),
        }
    }

    /// Get the number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Get the starting offset of a line.
    #[must_use]
    pub fn line_start(&self, line: usize) -> Option<u32> {
        self.line_starts.get(line).copied()
    }
}

/// The details needed to render a one-line error report:
/// line number, the line's text, and a caret marker under the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDetails {
    /// 1-indexed line number as shown to the user
    pub line_number: u32,
    /// The full text of the offending line (no trailing newline)
    pub line: String,
    /// A `^` marker string aligned under the offending column
    pub marker: String,
}

impl LineDetails {
    /// Compute rendering details for a byte offset into `source`.
    #[must_use]
    pub fn from_offset(source: &str, offset: u32) -> Self {
        let map = LineMap::build(source);
        let position = map.position(offset);

        let start = map
            .line_start(position.line as usize)
            .map(|s| s as usize)
            .unwrap_or(0)
            .min(source.len());
        let rest = &source[start..];
        let line: String = rest.chars().take_while(|&c| c != '\n').collect();
        let line = line.trim_end_matches('\r').to_string();

        // Tabs keep their width in the marker line so the caret stays aligned.
        let mut marker = String::new();
        for ch in line.chars().take(position.column as usize) {
            marker.push(if ch == '\t' { '\t' } else { ' ' });
        }
        marker.push('^');

        Self {
            line_number: position.line + 1,
            line,
            marker,
        }
    }
}

#[cfg(test)]
#[path = "tests/position_tests.rs"]
mod tests;
