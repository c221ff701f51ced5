//! Arena-backed abstract syntax tree for the kiln compiler.
//!
//! The parser (or any other front end, such as a header translator or the
//! test factory) produces one [`Arena`] per source file. Nodes are addressed
//! by stable [`NodeId`] indices and discriminated by a small kind tag; node
//! identity is index identity, which is what the semantic layer's
//! named-type and size-expression equality rules rely on.

pub mod arena;
pub use arena::{Arena, Node, NodeId};

pub mod nodes;
pub use nodes::{
    Assign, AssignOp, Block, BlockKind, Code, For, Function, If, Import, NodeData, NodeKind, Root,
    Statement, StatementOp, TypeDecl, Variable,
};

pub mod expr;
pub use expr::{BinaryOp, ExprTree, NumberValue, SpecialLit, UnaryOp};

pub mod typespec;
pub use typespec::{ArraySpec, FunctionSpecKind, Primitive, ReferenceKind, TypeSpec};

pub mod factory;
pub use factory::AstFactory;
