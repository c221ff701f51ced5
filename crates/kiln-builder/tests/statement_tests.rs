//! Control flow, scopes, and temporary destruction.

mod util;

use util::*;

#[test]
fn statement_temporaries_are_destroyed_at_commit() {
    let compiled = compile(
        "type T { x int }\n\
         use() nothing {\n\
             T(1)\n\
             return\n\
         }\n\
         main() int { return 0 }\n",
    );

    // The discarded constructor temporary gets exactly one destroy at
    // the statement boundary.
    let use_fn = function(&compiled.module, "use");
    assert_eq!(count_calls_to(&compiled.module, use_fn, "T.destroy"), 1);
}

#[test]
fn escaped_temporaries_are_not_destroyed_twice() {
    let compiled = compile(
        "type T { x int }\n\
         main() int {\n\
             let t = T(1)\n\
             return 0\n\
         }\n",
    );

    // The temporary escaped into the local; only the scope's own exit
    // chain destroys it.
    let main = function(&compiled.module, "main");
    assert_eq!(count_calls_to(&compiled.module, main, "T.destroy"), 1);
}

#[test]
fn conditional_loops_branch_back_through_the_condition() {
    let compiled = compile(
        "main() int {\n\
             var i int = 0\n\
             for i < 3 {\n\
                 i += 1\n\
             }\n\
             return i\n\
         }\n",
    );

    let main = function(&compiled.module, "main");
    assert!(has_cond_br(&compiled.module, main));
    assert!(count_switches(&compiled.module, main) >= 2);
}

#[test]
fn break_and_continue_lower_in_infinite_loops() {
    let compiled = compile(
        "main() int {\n\
             var i int = 0\n\
             for {\n\
                 i += 1\n\
                 if i > 3 {\n\
                     break\n\
                 }\n\
                 continue\n\
             }\n\
             return i\n\
         }\n",
    );

    let main = function(&compiled.module, "main");
    assert!(count_switches(&compiled.module, main) >= 3);
}

#[test]
fn if_else_chains_lower() {
    compile(
        "classify(x int) int {\n\
             if x > 10 {\n\
                 return 2\n\
             } else if x > 0 {\n\
                 return 1\n\
             } else {\n\
                 return 0\n\
             }\n\
         }\n\
         main() int { return classify(5) }\n",
    );
}

#[test]
fn exit_blocks_splice_onto_the_destructor_chain() {
    let compiled = compile(
        "count() nothing { return }\n\
         main() int {\n\
             exit {\n\
                 count()\n\
             }\n\
             return 0\n\
         }\n",
    );

    // The exit block body runs on the way out: its call sits on the
    // chain, not on the straight-line path.
    let main = function(&compiled.module, "main");
    assert_eq!(count_calls_to(&compiled.module, main, "count"), 1);
    assert!(count_switches(&compiled.module, main) >= 2);
}

#[test]
fn compound_assignment_reads_modifies_writes() {
    let compiled = compile(
        "main() int {\n\
             var x int = 4\n\
             x *= 3\n\
             x -= 2\n\
             x /= 2\n\
             x %= 4\n\
             return x\n\
         }\n",
    );

    let _ = compiled;
}

#[test]
fn nested_blocks_propagate_returns() {
    compile(
        "main() int {\n\
             block {\n\
                 block {\n\
                     return 42\n\
                 }\n\
             }\n\
             return 0\n\
         }\n",
    );
}

#[test]
fn insight_reports_the_type_without_emitting() {
    let compiled = compile(
        "main() int {\n\
             insight 3 + 4\n\
             insight \"text\"\n\
             return 0\n\
         }\n",
    );

    assert_eq!(compiled.insights.len(), 2);
    assert!(compiled.insights[0].contains("int"), "{:?}", compiled.insights);
    assert!(
        compiled.insights[1].contains("&[byte:]"),
        "{:?}",
        compiled.insights
    );
}

#[test]
fn shadowing_picks_the_closest_declaration() {
    compile(
        "main() int {\n\
             let x = 1\n\
             block {\n\
                 let x = 2.5\n\
                 insight x\n\
             }\n\
             return x\n\
         }\n",
    );
}
