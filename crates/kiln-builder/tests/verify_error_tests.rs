//! Boundary behaviors: programs that must be rejected, with the message
//! naming the fault.

mod util;

use util::*;

#[test]
fn constructor_arity_names_the_missing_field() {
    let message = compile_error(
        "type P { x int, y int }\n\
         main() int {\n\
             let p = P(1)\n\
             return 0\n\
         }\n",
    );

    assert!(
        message.contains("Expected 2 parameters but got 1"),
        "unexpected message: {message}"
    );
    assert!(message.contains("y"), "missing field not named: {message}");
}

#[test]
fn constructor_extra_arguments_are_reported() {
    let message = compile_error(
        "type P { x int }\n\
         main() int {\n\
             let p = P(1, 2)\n\
             return 0\n\
         }\n",
    );

    assert!(
        message.contains("Expected 1 parameters but got 2"),
        "unexpected message: {message}"
    );
}

#[test]
fn returning_a_value_from_a_nothing_function_is_rejected() {
    let message = compile_error("f() nothing { return 3 }\nmain() int { return 0 }\n");

    assert!(
        message.contains("does not have a return type"),
        "unexpected message: {message}"
    );
}

#[test]
fn bare_return_in_a_valued_function_is_rejected() {
    let message = compile_error("f() int { return }\nmain() int { return 0 }\n");

    assert!(
        message.contains("return statement does not return anything"),
        "unexpected message: {message}"
    );
}

#[test]
fn falling_off_a_valued_function_is_rejected() {
    let message = compile_error("f() int { let x = 3 }\nmain() int { return 0 }\n");

    assert!(
        message.contains("not every path returns a value"),
        "unexpected message: {message}"
    );
}

#[test]
fn assignment_to_an_immutable_binding_is_rejected() {
    let message = compile_error(
        "main() int {\n\
             let x = 3\n\
             x = 4\n\
             return x\n\
         }\n",
    );

    assert!(
        message.contains("must be a mutable variable"),
        "unexpected message: {message}"
    );
}

#[test]
fn unknown_names_do_not_resolve() {
    let message = compile_error("main() int { return mystery }\n");

    assert!(
        message.contains("does not implicitly resolve"),
        "unexpected message: {message}"
    );
}

#[test]
fn ambiguous_overloads_are_an_error() {
    let message = compile_error(
        "f(x int) int { return x }\n\
         f(y int) int { return y }\n\
         main() int { return f(3) }\n",
    );

    assert!(
        message.contains("Multiple functions match"),
        "unexpected message: {message}"
    );
}

#[test]
fn repeated_extern_declarations_are_tolerated() {
    // External declarations may legally repeat; the tie is not an
    // ambiguity.
    compile(
        "extern puts(s &[byte:]) int\n\
         extern puts(s &[byte:]) int\n\
         main() int {\n\
             let s = \"x\"\n\
             return puts(s)\n\
         }\n",
    );
}

#[test]
fn condition_must_be_bool() {
    let message = compile_error(
        "type P { x int }\n\
         main() int {\n\
             let p = P(1)\n\
             if p { return 1 }\n\
             return 0\n\
         }\n",
    );

    assert!(
        message.contains("must evaluate to a bool"),
        "unexpected message: {message}"
    );
}

#[test]
fn indexing_non_arrays_is_rejected() {
    let message = compile_error(
        "main() int {\n\
             let x = 3\n\
             return x[0]\n\
         }\n",
    );

    assert!(
        message.contains("Indexing must only be applied on array types"),
        "unexpected message: {message}"
    );
}

#[test]
fn growable_array_index_converts_to_ulong() {
    // An int-typed index into a growable array is accepted through the
    // automatic conversion.
    compile(
        "f(v [int]) int {\n\
             let i = 1\n\
             return v[i]\n\
         }\n\
         main() int { return 0 }\n",
    );
}

#[test]
fn fixed_index_out_of_bounds_is_accepted_at_compile_time() {
    // No static bounds check on fixed arrays.
    compile(
        "main() int {\n\
             let v = [1, 2, 3]\n\
             return v[9]\n\
         }\n",
    );
}
