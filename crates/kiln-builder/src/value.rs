//! Expression results.
//!
//! Lowering an expression produces either a typed value or an unresolved
//! name with its candidate declarations. Values carry a small flag set;
//! `REFERENCE` means the backend handle points at storage of the value's
//! type, `MUTABLE` authorizes writes through it, `TEMPORARY` schedules it
//! for end-of-statement destruction, and `EXPLICIT` suppresses the
//! zero-argument auto-call in `infer`.

use bitflags::bitflags;

use crate::sources::NodeRef;
use crate::typename::Typename;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ValueFlags: u32 {
        const REFERENCE = 1 << 0;
        const MUTABLE = 1 << 1;
        const TEMPORARY = 1 << 2;
        const EXPLICIT = 1 << 3;
    }
}

/// A fully lowered, typed value. `repr` is `None` in analyze-only mode.
#[derive(Clone, Debug)]
pub struct ExprValue {
    pub flags: ValueFlags,
    pub repr: Option<kiln_ir::Value>,
    pub ty: Typename,
    /// Identity within the owning statement accumulator; zero when the
    /// value was produced outside any statement.
    pub uid: u64,
}

impl ExprValue {
    pub fn is_set(&self, flags: ValueFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn is_reference(&self) -> bool {
        self.is_set(ValueFlags::REFERENCE)
    }

    pub fn is_mutable(&self) -> bool {
        self.is_set(ValueFlags::MUTABLE)
    }

    pub fn is_temporary(&self) -> bool {
        self.is_set(ValueFlags::TEMPORARY)
    }
}

/// A builtin callable that participates in overload resolution when its
/// name matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    ArraySize,
    ArrayCapacity,
    ArrayData,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::ArraySize => "size",
            Builtin::ArrayCapacity => "capacity",
            Builtin::ArrayData => "data",
        }
    }

    /// Builtins answering to `name`.
    pub fn matching(name: &str) -> Vec<Builtin> {
        [Builtin::ArraySize, Builtin::ArrayCapacity, Builtin::ArrayData]
            .into_iter()
            .filter(|b| b.name() == name)
            .collect()
    }
}

/// A name that has not collapsed to a value yet: the node it came from,
/// every declaration it might mean, matching builtins, and the implicit
/// receiver when it came off a dot.
#[derive(Debug)]
pub struct Unresolved {
    pub from: NodeRef,
    pub references: Vec<NodeRef>,
    pub builtins: Vec<Builtin>,
    pub implicit: Option<Box<ExprValue>>,
}

/// An expression's intermediate form before `infer`.
#[derive(Debug)]
pub enum Wrapped {
    Value(ExprValue),
    Unresolved(Unresolved),
}

impl From<ExprValue> for Wrapped {
    fn from(value: ExprValue) -> Self {
        Wrapped::Value(value)
    }
}

impl From<Unresolved> for Wrapped {
    fn from(value: Unresolved) -> Self {
        Wrapped::Unresolved(value)
    }
}
