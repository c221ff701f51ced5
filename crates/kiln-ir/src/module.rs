//! Module, functions, blocks, and the instruction cursor.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::inst::{BinOp, CastOp, CmpOp, InstData, InstKind, Terminator};
use crate::types::{FnTy, StructDef, StructId, Ty};
use crate::value::{ConstData, ConstId, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstId(pub u32);

/// A module global: storage address, optional initializer.
#[derive(Clone, Debug)]
pub struct GlobalData {
    pub name: String,
    pub ty: Ty,
    pub init: Option<ConstId>,
    pub constant: bool,
    pub external: bool,
}

/// One basic block: ordered instructions plus at most one terminator.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    pub name: String,
    pub insts: Vec<InstId>,
    pub terminator: Option<Terminator>,
}

/// A function: signature, argument names, and a body unless external.
#[derive(Debug)]
pub struct FunctionData {
    pub name: String,
    pub ty: FnTy,
    pub param_names: Vec<String>,
    pub external: bool,
    pub blocks: Vec<BlockData>,
    pub insts: Vec<InstData>,
}

/// Where the next instruction lands: a block, and optionally a fixed index
/// inside it. With `at: None` instructions append; with `at: Some(i)` they
/// insert at `i` and advance, which is how destructor code is threaded in
/// front of an existing chain.
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    pub func: FuncId,
    pub block: BlockId,
    pub at: Option<usize>,
}

impl Cursor {
    pub fn at_end(func: FuncId, block: BlockId) -> Self {
        Self {
            func,
            block,
            at: None,
        }
    }

    pub fn at_start(func: FuncId, block: BlockId) -> Self {
        Self {
            func,
            block,
            at: Some(0),
        }
    }
}

/// An IR module: named struct types, interned constants, globals,
/// functions.
#[derive(Debug, Default)]
pub struct Module {
    pub name: String,
    structs: Vec<StructDef>,
    consts: Vec<ConstData>,
    const_map: FxHashMap<ConstData, ConstId>,
    pub globals: Vec<GlobalData>,
    pub functions: Vec<FunctionData>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    // ------------------------------------------------------------------
    // Struct types
    // ------------------------------------------------------------------

    /// Register an opaque named struct type.
    pub fn add_struct(&mut self, name: impl Into<String>) -> StructId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(StructDef {
            name: name.into(),
            fields: None,
        });
        id
    }

    /// Complete an opaque struct with its field list.
    pub fn set_struct_body(&mut self, id: StructId, fields: Vec<Ty>) {
        self.structs[id.0 as usize].fields = Some(fields);
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.0 as usize]
    }

    // ------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------

    fn intern(&mut self, data: ConstData) -> Value {
        if let Some(&id) = self.const_map.get(&data) {
            return Value::Const(id);
        }

        let id = ConstId(self.consts.len() as u32);
        self.consts.push(data.clone());
        self.const_map.insert(data, id);
        Value::Const(id)
    }

    pub fn const_int(&mut self, ty: Ty, value: i128) -> Value {
        self.intern(ConstData::Int { ty, value })
    }

    pub fn const_float(&mut self, ty: Ty, value: f64) -> Value {
        self.intern(ConstData::float(ty, value))
    }

    pub fn const_null(&mut self, ty: Ty) -> Value {
        self.intern(ConstData::Null(ty))
    }

    pub fn const_zero(&mut self, ty: Ty) -> Value {
        self.intern(ConstData::Zero(ty))
    }

    pub fn const_data(&self, id: ConstId) -> &ConstData {
        &self.consts[id.0 as usize]
    }

    // ------------------------------------------------------------------
    // Globals and functions
    // ------------------------------------------------------------------

    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        ty: Ty,
        init: Option<ConstData>,
        constant: bool,
    ) -> GlobalId {
        let init = init.map(|data| match self.intern(data) {
            Value::Const(id) => id,
            _ => unreachable!(),
        });

        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(GlobalData {
            name: name.into(),
            ty,
            init,
            constant,
            external: false,
        });
        id
    }

    pub fn add_external_global(&mut self, name: impl Into<String>, ty: Ty) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(GlobalData {
            name: name.into(),
            ty,
            init: None,
            constant: false,
            external: true,
        });
        id
    }

    pub fn add_function(&mut self, name: impl Into<String>, ty: FnTy, param_names: Vec<String>) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(FunctionData {
            name: name.into(),
            ty,
            param_names,
            external: false,
            blocks: Vec::new(),
            insts: Vec::new(),
        });
        id
    }

    pub fn declare_function(&mut self, name: impl Into<String>, ty: FnTy) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(FunctionData {
            name: name.into(),
            ty,
            param_names: Vec::new(),
            external: true,
            blocks: Vec::new(),
            insts: Vec::new(),
        });
        id
    }

    pub fn function(&self, id: FuncId) -> &FunctionData {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut FunctionData {
        &mut self.functions[id.0 as usize]
    }

    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FuncId(i as u32))
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    pub fn append_block(&mut self, func: FuncId, name: impl Into<String>) -> BlockId {
        let function = self.function_mut(func);
        let id = BlockId(function.blocks.len() as u32);
        function.blocks.push(BlockData {
            name: name.into(),
            insts: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn block(&self, func: FuncId, block: BlockId) -> &BlockData {
        &self.function(func).blocks[block.0 as usize]
    }

    pub fn terminator(&self, func: FuncId, block: BlockId) -> Option<&Terminator> {
        self.block(func, block).terminator.as_ref()
    }

    pub fn inst(&self, func: FuncId, inst: InstId) -> &InstData {
        &self.function(func).insts[inst.0 as usize]
    }

    // ------------------------------------------------------------------
    // Instruction emission
    // ------------------------------------------------------------------

    /// Emit one instruction at the cursor and return its value handle.
    pub fn emit(&mut self, cursor: &mut Cursor, kind: InstKind) -> Value {
        let function = self.function_mut(cursor.func);
        assert!(!function.external, "cannot emit into an external function");

        let id = InstId(function.insts.len() as u32);
        function.insts.push(InstData { kind });

        let block = &mut function.blocks[cursor.block.0 as usize];
        match &mut cursor.at {
            None => block.insts.push(id),
            Some(index) => {
                block.insts.insert(*index, id);
                *index += 1;
            }
        }

        Value::Inst(id)
    }

    fn terminate(&mut self, cursor: &Cursor, terminator: Terminator) {
        let block = &mut self.function_mut(cursor.func).blocks[cursor.block.0 as usize];
        assert!(
            block.terminator.is_none(),
            "block {} already terminated",
            block.name
        );
        block.terminator = Some(terminator);
    }

    pub fn build_alloca(&mut self, cursor: &mut Cursor, ty: Ty, name: &str) -> Value {
        self.emit(
            cursor,
            InstKind::Alloca {
                ty,
                name: name.into(),
            },
        )
    }

    pub fn build_load(&mut self, cursor: &mut Cursor, ty: Ty, ptr: Value) -> Value {
        self.emit(cursor, InstKind::Load { ty, ptr })
    }

    pub fn build_store(&mut self, cursor: &mut Cursor, value: Value, ptr: Value) -> Value {
        self.emit(cursor, InstKind::Store { value, ptr })
    }

    pub fn build_gep(&mut self, cursor: &mut Cursor, ptr: Value, indices: &[Value], name: &str) -> Value {
        self.emit(
            cursor,
            InstKind::Gep {
                ptr,
                indices: SmallVec::from_slice(indices),
                name: name.into(),
            },
        )
    }

    pub fn build_struct_gep(&mut self, cursor: &mut Cursor, ptr: Value, index: u32, name: &str) -> Value {
        self.emit(
            cursor,
            InstKind::StructGep {
                ptr,
                index,
                name: name.into(),
            },
        )
    }

    pub fn build_call(&mut self, cursor: &mut Cursor, callee: Value, args: Vec<Value>) -> Value {
        self.emit(cursor, InstKind::Call { callee, args })
    }

    pub fn build_binary(&mut self, cursor: &mut Cursor, op: BinOp, a: Value, b: Value) -> Value {
        self.emit(cursor, InstKind::Binary { op, a, b })
    }

    pub fn build_cmp(&mut self, cursor: &mut Cursor, op: CmpOp, a: Value, b: Value) -> Value {
        self.emit(cursor, InstKind::Cmp { op, a, b })
    }

    pub fn build_cast(&mut self, cursor: &mut Cursor, op: CastOp, value: Value, ty: Ty) -> Value {
        self.emit(cursor, InstKind::Cast { op, value, ty })
    }

    pub fn build_not(&mut self, cursor: &mut Cursor, value: Value) -> Value {
        self.emit(cursor, InstKind::Not { value })
    }

    pub fn build_neg(&mut self, cursor: &mut Cursor, value: Value) -> Value {
        self.emit(cursor, InstKind::Neg { value })
    }

    pub fn build_fneg(&mut self, cursor: &mut Cursor, value: Value) -> Value {
        self.emit(cursor, InstKind::FNeg { value })
    }

    pub fn build_is_not_null(&mut self, cursor: &mut Cursor, value: Value) -> Value {
        self.emit(cursor, InstKind::IsNotNull { value })
    }

    pub fn build_br(&mut self, cursor: &Cursor, dest: BlockId) {
        self.terminate(cursor, Terminator::Br(dest));
    }

    pub fn build_cond_br(&mut self, cursor: &Cursor, cond: Value, on_true: BlockId, on_false: BlockId) {
        self.terminate(
            cursor,
            Terminator::CondBr {
                cond,
                on_true,
                on_false,
            },
        );
    }

    pub fn build_switch(
        &mut self,
        cursor: &Cursor,
        value: Value,
        default: BlockId,
        cases: Vec<(i64, BlockId)>,
    ) {
        self.terminate(
            cursor,
            Terminator::Switch {
                value,
                default,
                cases,
            },
        );
    }

    pub fn build_ret(&mut self, cursor: &Cursor, value: Option<Value>) {
        self.terminate(cursor, Terminator::Ret(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared() -> (Module, FuncId, BlockId) {
        let mut module = Module::new("test");
        let func = module.add_function(
            "f",
            FnTy {
                params: vec![],
                ret: Ty::Void,
            },
            vec![],
        );
        let block = module.append_block(func, "entry");
        (module, func, block)
    }

    #[test]
    fn constants_are_interned() {
        let mut module = Module::new("test");
        let a = module.const_int(Ty::Int(32), 7);
        let b = module.const_int(Ty::Int(32), 7);
        let c = module.const_int(Ty::Int(64), 7);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn cursor_at_start_keeps_emission_order_ahead_of_existing() {
        let (mut module, func, block) = prepared();

        let mut end = Cursor::at_end(func, block);
        let seven = module.const_int(Ty::Int(32), 7);
        let slot = module.build_alloca(&mut end, Ty::Int(32), "slot");
        module.build_store(&mut end, seven, slot);

        // A fresh at-start cursor lands its run before everything emitted
        // so far, in its own order.
        let mut front = Cursor::at_start(func, block);
        module.build_load(&mut front, Ty::Int(32), slot);
        module.build_not(&mut front, slot);

        let insts = &module.block(func, block).insts;
        assert!(matches!(
            module.inst(func, insts[0]).kind,
            InstKind::Load { .. }
        ));
        assert!(matches!(
            module.inst(func, insts[1]).kind,
            InstKind::Not { .. }
        ));
        assert!(matches!(
            module.inst(func, insts[2]).kind,
            InstKind::Alloca { .. }
        ));
    }

    #[test]
    #[should_panic(expected = "already terminated")]
    fn double_terminator_is_rejected() {
        let (mut module, func, block) = prepared();
        let cursor = Cursor::at_end(func, block);
        module.build_ret(&cursor, None);
        module.build_ret(&cursor, None);
    }

    #[test]
    fn opaque_struct_completes_later() {
        let mut module = Module::new("test");
        let id = module.add_struct("Pair");
        assert!(module.struct_def(id).fields.is_none());

        module.set_struct_body(id, vec![Ty::Int(32), Ty::Struct(id)]);
        assert_eq!(
            module.struct_def(id).fields.as_ref().map(Vec::len),
            Some(2)
        );
    }
}
