//! In-memory intermediate representation.
//!
//! The semantic layer lowers into this IR through a deliberately narrow
//! surface: modules, functions, basic blocks, an instruction cursor with
//! `alloca`/`load`/`store`/`gep`/`struct-gep`/casts/`call`/branching/
//! `switch`/`ret`, integer and float arithmetic and comparisons, constant
//! construction, and a data layout that answers type store sizes. Nothing
//! else is assumed about the backend.

pub mod types;
pub use types::{FnTy, StructDef, StructId, Ty};

pub mod value;
pub use value::{ConstData, ConstId, Value};

pub mod inst;
pub use inst::{BinOp, CastOp, CmpOp, InstData, InstKind, Terminator};

pub mod module;
pub use module::{BlockId, Cursor, FuncId, FunctionData, GlobalData, GlobalId, InstId, Module};

pub mod layout;
pub use layout::DataLayout;

pub mod display;
