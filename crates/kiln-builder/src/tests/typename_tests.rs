use super::*;
use crate::sources::FileId;
use kiln_ast::NodeId;

fn node(n: u32) -> NodeRef {
    NodeRef {
        file: FileId(0),
        node: NodeId(n),
    }
}

#[test]
fn display_references() {
    let int = Typename::primitive(Primitive::Int);

    assert_eq!(
        Typename::reference(int.clone(), false, ReferenceKind::Regular).to_string(),
        "&int"
    );
    assert_eq!(
        Typename::reference(int.clone(), true, ReferenceKind::Regular).to_string(),
        "&var int"
    );
    assert_eq!(
        Typename::reference(int.clone(), true, ReferenceKind::Unique).to_string(),
        "*int"
    );
    assert_eq!(
        Typename::reference(int.clone(), false, ReferenceKind::Unique).to_string(),
        "*let int"
    );
    assert_eq!(
        Typename::reference(int, true, ReferenceKind::Shared).to_string(),
        "*shared int"
    );
}

#[test]
fn display_arrays_and_optionals() {
    let byte = Typename::primitive(Primitive::Byte);

    assert_eq!(
        Typename::array(ArrayKind::VariableSize, byte.clone()).to_string(),
        "[byte]"
    );
    assert_eq!(
        Typename::array(ArrayKind::FixedSize(40), byte.clone()).to_string(),
        "[byte:40]"
    );
    assert_eq!(
        Typename::array(ArrayKind::Unbounded, byte.clone()).to_string(),
        "[byte:]"
    );
    assert_eq!(
        Typename::array(ArrayKind::Iterable, byte.clone()).to_string(),
        "[byte::]"
    );
    assert_eq!(Typename::optional(byte.clone(), false).to_string(), "?byte");
    assert_eq!(Typename::optional(byte, true).to_string(), "!byte");
}

#[test]
fn display_function_types() {
    let ty = Typename::Function(FunctionTypename {
        kind: FunctionKind::Pointer,
        parameters: vec![
            ("a".into(), Typename::primitive(Primitive::Int)),
            ("b".into(), Typename::bool_type()),
        ],
        return_type: Box::new(Typename::nothing()),
        locked: false,
    });

    assert_eq!(ty.to_string(), "func ptr(int, bool) nothing");
}

#[test]
fn named_equality_is_identity() {
    let a = Typename::Named(NamedTypename {
        name: "Point".into(),
        node: node(1),
    });
    let same_node = Typename::Named(NamedTypename {
        name: "Alias".into(),
        node: node(1),
    });
    let other_node = Typename::Named(NamedTypename {
        name: "Point".into(),
        node: node(2),
    });

    assert_eq!(a, same_node);
    assert_ne!(a, other_node);
}

#[test]
fn function_equality_ignores_parameter_names() {
    let make = |name: &str| {
        Typename::Function(FunctionTypename {
            kind: FunctionKind::Pointer,
            parameters: vec![(name.into(), Typename::primitive(Primitive::Int))],
            return_type: Box::new(Typename::primitive(Primitive::Int)),
            locked: false,
        })
    };

    assert_eq!(make("x"), make("y"));
}

#[test]
fn unbounded_sized_equality_uses_size_key() {
    let elem = Typename::primitive(Primitive::Int);
    let a = Typename::array(ArrayKind::UnboundedSized(SizeKey::Var(node(5))), elem.clone());
    let b = Typename::array(ArrayKind::UnboundedSized(SizeKey::Var(node(5))), elem.clone());
    let c = Typename::array(ArrayKind::UnboundedSized(SizeKey::Var(node(6))), elem);

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn priority_orders_numerics() {
    use PrimitiveExt as _;

    assert!(Primitive::Double.priority() > Primitive::ULong.priority());
    assert!(Primitive::ULong.priority() > Primitive::Long.priority());
    assert!(Primitive::Long.priority() > Primitive::Float.priority());
    assert!(Primitive::Float.priority() > Primitive::UInt.priority());
    assert!(Primitive::Byte.priority() > 0);
    assert_eq!(Primitive::Bool.priority(), -1);
}

#[test]
fn size_reports_bytes() {
    use PrimitiveExt as _;

    assert_eq!(Primitive::Byte.size(), 1);
    assert_eq!(Primitive::Short.size(), 2);
    assert_eq!(Primitive::Float.size(), 4);
    assert_eq!(Primitive::ULong.size(), 8);
    assert_eq!(Primitive::Nothing.size(), -1);
}
