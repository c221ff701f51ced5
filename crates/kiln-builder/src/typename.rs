//! The semantic type algebra.
//!
//! A [`Typename`] is the resolved form of a type: named aggregates point at
//! their declaring node, array sizes are canonicalized, and equality follows
//! the language rules rather than structural derive semantics (named types
//! compare by declaration identity, function types ignore parameter names,
//! unbounded-sized arrays compare by size-expression identity).

use std::fmt;
use std::hash::{Hash, Hasher};

pub use kiln_ast::{Primitive, ReferenceKind};

use crate::sources::NodeRef;

/// Identity key of an unbounded-sized array's size expression.
///
/// A size that is a bare reference to a variable canonicalizes to the
/// variable's declaring node, which makes the size spelled in a signature
/// and the same size spelled in the body compare equal. Anything more
/// involved keys by the expression node itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SizeKey {
    Var(NodeRef),
    Expr(NodeRef),
}

/// Array kinds, with sizes resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    /// `[T]`: heap-backed growable `(size, capacity, data)` triple.
    VariableSize,
    /// `[T:40]`: in-place storage.
    FixedSize(u64),
    /// `[T:]`: unchecked pointer-like view.
    Unbounded,
    /// `[T:expr]`: view with a runtime length evaluated at allocation.
    UnboundedSized(SizeKey),
    /// `[T::]`: opaque iterator view.
    Iterable,
}

#[derive(Clone, Debug)]
pub struct NamedTypename {
    pub name: String,
    pub node: NodeRef,
}

impl PartialEq for NamedTypename {
    fn eq(&self, other: &Self) -> bool {
        // Identity of the declaring node, never structure.
        self.node == other.node
    }
}

impl Eq for NamedTypename {}

impl Hash for NamedTypename {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceTypename {
    pub value: Box<Typename>,
    pub mutable: bool,
    pub kind: ReferenceKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OptionalTypename {
    pub value: Box<Typename>,
    pub bubbles: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayTypename {
    pub kind: ArrayKind,
    pub value: Box<Typename>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Pointer,
    Regular,
}

#[derive(Clone, Debug)]
pub struct FunctionTypename {
    pub kind: FunctionKind,
    pub parameters: Vec<(String, Typename)>,
    pub return_type: Box<Typename>,
    /// A locked function value is never auto-invoked by `infer`.
    pub locked: bool,
}

impl PartialEq for FunctionTypename {
    fn eq(&self, other: &Self) -> bool {
        // Parameter names are not part of a function type.
        self.kind == other.kind
            && self.return_type == other.return_type
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|((_, a), (_, b))| a == b)
    }
}

impl Eq for FunctionTypename {}

impl Hash for FunctionTypename {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.return_type.hash(state);
        for (_, ty) in &self.parameters {
            ty.hash(state);
        }
    }
}

/// A resolved type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Typename {
    Primitive(Primitive),
    Named(NamedTypename),
    Reference(ReferenceTypename),
    Optional(OptionalTypename),
    Array(ArrayTypename),
    Function(FunctionTypename),
}

impl Typename {
    pub fn primitive(p: Primitive) -> Self {
        Typename::Primitive(p)
    }

    pub fn nothing() -> Self {
        Typename::Primitive(Primitive::Nothing)
    }

    pub fn bool_type() -> Self {
        Typename::Primitive(Primitive::Bool)
    }

    pub fn ulong() -> Self {
        Typename::Primitive(Primitive::ULong)
    }

    pub fn reference(value: Typename, mutable: bool, kind: ReferenceKind) -> Self {
        Typename::Reference(ReferenceTypename {
            value: Box::new(value),
            mutable,
            kind,
        })
    }

    pub fn optional(value: Typename, bubbles: bool) -> Self {
        Typename::Optional(OptionalTypename {
            value: Box::new(value),
            bubbles,
        })
    }

    pub fn array(kind: ArrayKind, value: Typename) -> Self {
        Typename::Array(ArrayTypename {
            kind,
            value: Box::new(value),
        })
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Typename::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceTypename> {
        match self {
            Typename::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_optional(&self) -> Option<&OptionalTypename> {
        match self {
            Typename::Optional(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayTypename> {
        match self {
            Typename::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionTypename> {
        match self {
            Typename::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_primitive(&self, p: Primitive) -> bool {
        self.as_primitive() == Some(p)
    }
}

// ----------------------------------------------------------------------
// Primitive queries
// ----------------------------------------------------------------------

/// Priority order used for numeric negotiation, highest first.
const PRIORITY: [Primitive; 10] = [
    Primitive::Double,
    Primitive::ULong,
    Primitive::Long,
    Primitive::Float,
    Primitive::UInt,
    Primitive::Int,
    Primitive::UShort,
    Primitive::Short,
    Primitive::UByte,
    Primitive::Byte,
];

pub trait PrimitiveExt {
    fn is_signed(self) -> bool;
    fn is_unsigned(self) -> bool;
    fn is_integer(self) -> bool;
    fn is_float(self) -> bool;
    fn is_number(self) -> bool;
    /// Size in bytes, or -1 for non-numeric primitives.
    fn size(self) -> i32;
    /// Promotion priority, higher accommodates lower; -1 for non-numbers.
    fn priority(self) -> i32;
}

impl PrimitiveExt for Primitive {
    fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::Byte | Primitive::Short | Primitive::Int | Primitive::Long
        )
    }

    fn is_unsigned(self) -> bool {
        matches!(
            self,
            Primitive::UByte | Primitive::UShort | Primitive::UInt | Primitive::ULong
        )
    }

    fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    fn is_float(self) -> bool {
        matches!(self, Primitive::Float | Primitive::Double)
    }

    fn is_number(self) -> bool {
        self.is_integer() || self.is_float()
    }

    fn size(self) -> i32 {
        match self {
            Primitive::ULong | Primitive::Long | Primitive::Double => 8,
            Primitive::UInt | Primitive::Int | Primitive::Float => 4,
            Primitive::UShort | Primitive::Short => 2,
            Primitive::UByte | Primitive::Byte => 1,
            _ => -1,
        }
    }

    fn priority(self) -> i32 {
        match PRIORITY.iter().position(|&p| p == self) {
            Some(index) => (PRIORITY.len() - index) as i32,
            None => -1,
        }
    }
}

// ----------------------------------------------------------------------
// Display
// ----------------------------------------------------------------------

fn primitive_name(p: Primitive) -> &'static str {
    match p {
        Primitive::Any => "any",
        Primitive::Null => "null",
        Primitive::Nothing => "nothing",
        Primitive::Bool => "bool",
        Primitive::Byte => "byte",
        Primitive::Short => "short",
        Primitive::Int => "int",
        Primitive::Long => "long",
        Primitive::UByte => "ubyte",
        Primitive::UShort => "ushort",
        Primitive::UInt => "uint",
        Primitive::ULong => "ulong",
        Primitive::Float => "float",
        Primitive::Double => "double",
    }
}

impl fmt::Display for Typename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typename::Primitive(p) => f.write_str(primitive_name(*p)),
            Typename::Named(named) => f.write_str(&named.name),
            Typename::Reference(reference) => {
                let prefix = match reference.kind {
                    ReferenceKind::Regular => "&",
                    ReferenceKind::Unique => "*",
                    ReferenceKind::Shared => "*shared ",
                };
                let mutability = match reference.kind {
                    ReferenceKind::Regular => {
                        if reference.mutable {
                            "var "
                        } else {
                            ""
                        }
                    }
                    ReferenceKind::Unique | ReferenceKind::Shared => {
                        if reference.mutable {
                            ""
                        } else {
                            "let "
                        }
                    }
                };
                write!(f, "{prefix}{mutability}{}", reference.value)
            }
            Typename::Optional(optional) => {
                write!(
                    f,
                    "{}{}",
                    if optional.bubbles { "!" } else { "?" },
                    optional.value
                )
            }
            Typename::Array(array) => {
                let end = match &array.kind {
                    ArrayKind::VariableSize => String::new(),
                    ArrayKind::FixedSize(size) => format!(":{size}"),
                    ArrayKind::Unbounded => ":".into(),
                    ArrayKind::UnboundedSized(_) => ":expr".into(),
                    ArrayKind::Iterable => "::".into(),
                };
                write!(f, "[{}{end}]", array.value)
            }
            Typename::Function(function) => {
                let heading = match function.kind {
                    FunctionKind::Pointer => "func ptr",
                    FunctionKind::Regular => "func",
                };
                let parameters: Vec<String> = function
                    .parameters
                    .iter()
                    .map(|(_, ty)| ty.to_string())
                    .collect();
                write!(
                    f,
                    "{heading}({}) {}",
                    parameters.join(", "),
                    function.return_type
                )
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/typename_tests.rs"]
mod tests;
