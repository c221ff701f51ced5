//! End-to-end lowering scenarios over full program fragments.

mod util;

use util::*;

#[test]
fn overload_resolution_prefers_no_conversion() {
    let compiled = compile(
        "f(x int) int { return x }\n\
         f(x long) long { return x }\n\
         main() int { return f(3) }\n",
    );

    let main = function(&compiled.module, "main");
    assert_eq!(calls_in(&compiled.module, main), vec!["f".to_string()]);

    // The int overload was selected: the called function's signature
    // takes an i32.
    let callee = compiled
        .module
        .functions
        .iter()
        .find(|f| f.name == "f" && f.ty.params == vec![kiln_ir::Ty::Int(32)])
        .expect("int overload emitted");
    assert!(!callee.external);
}

#[test]
fn passing_a_non_temporary_unique_requires_a_move() {
    let message = compile_error(
        "f(x *int) nothing { return }\n\
         alloc() *int { return *int(0) }\n\
         main() int {\n\
             let p = alloc()\n\
             f(p)\n\
             return 0\n\
         }\n",
    );

    assert!(
        message.contains("Passing non-temporary of type *int is prohibited"),
        "unexpected message: {message}"
    );
}

#[test]
fn dot_resolves_through_uniform_function_call() {
    let compiled = compile(
        "length(s &[byte:]) ulong { return 0 }\n\
         main() int {\n\
             let s = \"hi\"\n\
             s.length()\n\
             return 0\n\
         }\n",
    );

    let main = function(&compiled.module, "main");
    assert_eq!(count_calls_to(&compiled.module, main, "length"), 1);

    // The literal became an immutable global.
    assert!(compiled.module.globals.iter().any(|g| g.constant));
}

#[test]
fn exit_chain_runs_destructors_across_nested_scopes() {
    let compiled = compile(
        "type Tracer { tag int }\n\
         destroy(t &Tracer) nothing { return }\n\
         main() int {\n\
             let a = Tracer(1)\n\
             block {\n\
                 let b = Tracer(2)\n\
                 block {\n\
                     let c = Tracer(3)\n\
                     return 0\n\
                 }\n\
             }\n\
             return 1\n\
         }\n",
    );

    let main = function(&compiled.module, "main");

    // One destructor pass per scoped variable: three scopes deep means
    // three passes on the return path.
    assert_eq!(count_calls_to(&compiled.module, main, "Tracer.destroy"), 3);

    // Each scope dispatches through its own exit switch.
    assert!(count_switches(&compiled.module, main) >= 3);

    // The implicit destructor runs the user hook.
    let destructor = function(&compiled.module, "Tracer.destroy");
    assert_eq!(count_calls_to(&compiled.module, destructor, "destroy"), 1);
}

#[test]
fn array_size_is_memoized_across_the_call() {
    let compiled = compile(
        "alloc(n ulong) *[int:n] { return *[int:n] }\n\
         main() int {\n\
             let a = alloc(5)\n\
             return a.size as int\n\
         }\n",
    );

    // The callee allocates once.
    let alloc = function(&compiled.module, "alloc");
    assert_eq!(count_calls_to(&compiled.module, alloc, "malloc"), 1);

    // The caller re-emits the memoized size: no extra allocation or
    // re-evaluation machinery, just the one call plus the unique's free.
    let main = function(&compiled.module, "main");
    assert_eq!(count_calls_to(&compiled.module, main, "malloc"), 0);
    assert_eq!(count_calls_to(&compiled.module, main, "alloc"), 1);
    assert_eq!(count_calls_to(&compiled.module, main, "free"), 1);
}

#[test]
fn null_converts_into_an_optional() {
    let compiled = compile(
        "maybe() ?int { return null }\n\
         main() int { return maybe() ? 0 : 1 }\n",
    );

    let main = function(&compiled.module, "main");
    assert_eq!(count_calls_to(&compiled.module, main, "maybe"), 1);
    assert!(has_cond_br(&compiled.module, main));
}
