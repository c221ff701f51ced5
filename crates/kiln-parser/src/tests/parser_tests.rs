use super::*;
use kiln_ast::{NodeData, NodeKind};

fn parse_ok(text: &str) -> ParseOutput {
    parse(text).expect("parses")
}

fn root_kinds(output: &ParseOutput) -> Vec<NodeKind> {
    match &output.arena.get(output.root).data {
        NodeData::Root(root) => root
            .children
            .iter()
            .map(|&c| output.arena.kind(c))
            .collect(),
        _ => unreachable!(),
    }
}

#[test]
fn parses_top_level_declarations() {
    let output = parse_ok(
        "import \"lib.kiln\"\n\
         type Point { x int, y int }\n\
         let g int\n\
         extern puts(s &[byte:]) int\n\
         main() int { return 0 }\n",
    );

    assert_eq!(
        root_kinds(&output),
        vec![
            NodeKind::Import,
            NodeKind::TypeDecl,
            NodeKind::Variable,
            NodeKind::Function,
            NodeKind::Function,
        ]
    );
}

#[test]
fn function_signature_shapes() {
    let output = parse_ok("f(x int, y &var double) long { return 0 }");

    let function = match &output.arena.get(output.root).data {
        NodeData::Root(root) => root.children[0],
        _ => unreachable!(),
    };

    match &output.arena.get(function).data {
        NodeData::Function(f) => {
            assert_eq!(f.name, "f");
            assert_eq!(f.parameters.len(), 2);
            assert!(!f.external);
            assert!(f.body.is_some());
        }
        _ => panic!("expected function"),
    }
}

#[test]
fn extern_functions_have_no_body() {
    let output = parse_ok("extern malloc(size ulong) &any");

    let function = match &output.arena.get(output.root).data {
        NodeData::Root(root) => root.children[0],
        _ => unreachable!(),
    };

    match &output.arena.get(function).data {
        NodeData::Function(f) => {
            assert!(f.external);
            assert!(f.body.is_none());
        }
        _ => panic!("expected function"),
    }
}

#[test]
fn array_type_flavors() {
    use kiln_ast::{ArraySpec, TypeSpec};

    let output = parse_ok(
        "a(v [int]) nothing { return }\n\
         b(v [int:4]) nothing { return }\n\
         c(v &[int:]) nothing { return }\n\
         d(n ulong) *[int:n] { return *[int:n] }\n",
    );

    let spec_of = |index: usize| -> TypeSpec {
        let function = match &output.arena.get(output.root).data {
            NodeData::Root(root) => root.children[index],
            _ => unreachable!(),
        };
        match &output.arena.get(function).data {
            NodeData::Function(f) => {
                let param = f.parameters[0];
                match &output.arena.get(param).data {
                    NodeData::Variable(v) => v.type_spec.clone().expect("typed"),
                    _ => unreachable!(),
                }
            }
            _ => unreachable!(),
        }
    };

    assert!(matches!(
        spec_of(0),
        TypeSpec::Array {
            kind: ArraySpec::VariableSize,
            ..
        }
    ));
    assert!(matches!(
        spec_of(1),
        TypeSpec::Array {
            kind: ArraySpec::FixedSize(4),
            ..
        }
    ));
    assert!(matches!(
        spec_of(2),
        TypeSpec::Reference { value, .. }
            if matches!(*value, TypeSpec::Array { kind: ArraySpec::Unbounded, .. })
    ));

    // The fourth function's return type carries a size expression.
    let function = match &output.arena.get(output.root).data {
        NodeData::Root(root) => root.children[3],
        _ => unreachable!(),
    };
    match &output.arena.get(function).data {
        NodeData::Function(f) => match &f.return_spec {
            TypeSpec::Reference { value, .. } => {
                assert!(matches!(
                    **value,
                    TypeSpec::Array {
                        kind: ArraySpec::UnboundedSized(_),
                        ..
                    }
                ));
            }
            other => panic!("expected reference return, got {other:?}"),
        },
        _ => unreachable!(),
    }
}

#[test]
fn statements_fill_scopes() {
    let output = parse_ok(
        "main() int {\n\
             let x = 3\n\
             var y int = 4\n\
             y += 1\n\
             if x > 2 { y = 5 } else { y = 6 }\n\
             for y < 10 { y = y + 1 }\n\
             block { y = 11 }\n\
             return y\n\
         }",
    );

    let function = match &output.arena.get(output.root).data {
        NodeData::Root(root) => root.children[0],
        _ => unreachable!(),
    };
    let body = match &output.arena.get(function).data {
        NodeData::Function(f) => f.body.expect("body"),
        _ => unreachable!(),
    };

    let kinds: Vec<NodeKind> = match &output.arena.get(body).data {
        NodeData::Code(code) => code.children.iter().map(|&c| output.arena.kind(c)).collect(),
        _ => unreachable!(),
    };

    assert_eq!(
        kinds,
        vec![
            NodeKind::Variable,
            NodeKind::Variable,
            NodeKind::Assign,
            NodeKind::If,
            NodeKind::For,
            NodeKind::Block,
            NodeKind::Statement,
        ]
    );
}

#[test]
fn ternary_and_calls_nest() {
    let output = parse_ok("pick(c bool) int { return c ? 1 : 2 }");
    let _ = output;
}

#[test]
fn named_arguments_record_their_slot() {
    let output = parse_ok("main() nothing { f(x: 1, 2) }");

    // Find the call node.
    let call = output
        .arena
        .ids()
        .find(|&id| output.arena.kind(id) == NodeKind::Call)
        .expect("call parsed");

    match &output.arena.get(call).data {
        NodeData::Call(call) => {
            assert_eq!(call.named_indices(), vec![(0, "x".to_string())]);
            assert_eq!(call.arguments.len(), 2);
        }
        _ => unreachable!(),
    }
}

#[test]
fn error_carries_offset() {
    let error = parse("main() int { return 0").unwrap_err();
    assert!(error.message.contains("Expected }"));
    assert!(error.offset > 0);
}

#[test]
fn spans_cover_declarations() {
    let text = "first() int { return 1 }";
    let output = parse_ok(text);

    let function = match &output.arena.get(output.root).data {
        NodeData::Root(root) => root.children[0],
        _ => unreachable!(),
    };

    let span = output.arena.span(function);
    assert_eq!(span.start, 0);
    assert_eq!(span.slice(text), text);
}
