//! Semantic analysis and code generation core of the kiln compiler.
//!
//! The crate consumes parsed arenas (via [`sources::SourceManager`]) and a
//! set of options, resolves names and types, enforces the ownership
//! discipline, and emits a [`kiln_ir::Module`] per translation unit:
//! - [`typename`]: the resolved type algebra and its equality rules
//! - [`builder`]: the per-unit symbol builder and name search
//! - [`expression`], [`modifiers`], [`operators`], [`nouns`]: expression
//!   lowering via handler chains
//! - [`convert`]: the implicit/forced conversion lattice
//! - [`matching`]: overload resolution and call emission
//! - [`statements`]: scopes, control flow, and the exit-chain protocol
//! - [`lifecycle`]: initialization, destruction, statement commit
//! - [`platform`]: ABI formatting per target triple

pub mod error;
pub use error::{blame, BuildError, BuildResult};

pub mod sources;
pub use sources::{FileId, NodeRef, ParsedFile, SourceManager};

pub mod typename;
pub use typename::{
    ArrayKind, ArrayTypename, FunctionKind, FunctionTypename, NamedTypename, OptionalTypename,
    Primitive, PrimitiveExt, ReferenceKind, ReferenceTypename, SizeKey, Typename,
};

pub mod value;
pub use value::{Builtin, ExprValue, Unresolved, ValueFlags, Wrapped};

pub mod accumulator;
pub use accumulator::Accumulator;

pub mod cache;
pub use cache::{ScopeCache, VariableBinding};

pub mod builder;
pub use builder::{Builder, BuilderFunction, BuilderGlobal, BuilderOptions, BuilderType};

pub mod emit;
pub use emit::{Context, ExitInfo, FunctionFrame};

pub mod convert;
pub mod expression;
pub mod lifecycle;
pub mod matching;
pub mod modifiers;
pub mod nouns;
pub mod operators;
pub mod statements;

pub mod function;

pub mod platform;
pub use platform::{FormatPackage, Platform};
