//! Instructions and terminators.

use smallvec::SmallVec;

use crate::module::BlockId;
use crate::types::Ty;
use crate::value::Value;

/// Integer/float arithmetic and bitwise operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
}

/// Comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
    Ugt,
    Uge,
    Ult,
    Ule,
    FOeq,
    FOne,
    FOgt,
    FOge,
    FOlt,
    FOle,
}

/// Value casts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastOp {
    SExt,
    ZExt,
    Trunc,
    FpExt,
    FpTrunc,
    SiToFp,
    UiToFp,
    FpToSi,
    FpToUi,
    BitCast,
    PtrToInt,
    IntToPtr,
    /// Pointer-to-pointer cast.
    PointerCast,
}

/// One instruction.
#[derive(Clone, Debug)]
pub enum InstKind {
    Alloca {
        ty: Ty,
        name: String,
    },
    Load {
        ty: Ty,
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    /// Pointer arithmetic over `ptr`'s pointee type.
    Gep {
        ptr: Value,
        indices: SmallVec<[Value; 2]>,
        name: String,
    },
    /// Field address of an aggregate pointer.
    StructGep {
        ptr: Value,
        index: u32,
        name: String,
    },
    Call {
        callee: Value,
        args: Vec<Value>,
    },
    Binary {
        op: BinOp,
        a: Value,
        b: Value,
    },
    Cmp {
        op: CmpOp,
        a: Value,
        b: Value,
    },
    Cast {
        op: CastOp,
        value: Value,
        ty: Ty,
    },
    Not {
        value: Value,
    },
    Neg {
        value: Value,
    },
    FNeg {
        value: Value,
    },
    IsNotNull {
        value: Value,
    },
}

/// One instruction slot in a function body.
#[derive(Clone, Debug)]
pub struct InstData {
    pub kind: InstKind,
}

/// Block terminators.
#[derive(Clone, Debug)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Value,
        on_true: BlockId,
        on_false: BlockId,
    },
    Switch {
        value: Value,
        default: BlockId,
        cases: Vec<(i64, BlockId)>,
    },
    Ret(Option<Value>),
}
