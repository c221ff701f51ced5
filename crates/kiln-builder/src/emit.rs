//! The lowering context: a thin emitter over the backend builder.
//!
//! A [`Context`] threads everything one function lowering needs: the
//! symbol builder, the current function frame, the insertion cursor (absent
//! in analyze-only mode), the statement accumulator, the scope cache, and
//! the active exit-chain. All IR goes through the helpers here, which
//! silently become no-ops when no cursor is installed.

use crate::accumulator::Accumulator;
use crate::builder::Builder;
use crate::cache::ScopeCache;
use crate::error::{BuildError, BuildResult};
use crate::expression;
use crate::sources::NodeRef;
use crate::typename::{ArrayKind, FunctionTypename, Typename};
use crate::value::{ExprValue, ValueFlags};

/// Per-function lowering state.
#[derive(Clone, Debug)]
pub struct FunctionFrame {
    pub node: Option<NodeRef>,
    pub func: kiln_ir::FuncId,
    pub entry: kiln_ir::BlockId,
    pub exit: kiln_ir::BlockId,
    pub return_slot: Option<kiln_ir::Value>,
    pub signature: FunctionTypename,
}

/// The three-piece exit-chain of the innermost scope: the byte slot
/// recording how the scope is being left, the first destructor block, and
/// the trailing dispatch block.
#[derive(Clone, Copy, Debug)]
pub struct ExitInfo {
    pub slot: kiln_ir::Value,
    pub begin: kiln_ir::BlockId,
    pub end: kiln_ir::BlockId,
}

pub struct Context<'b, 's> {
    pub builder: &'b mut Builder<'s>,
    pub function: Option<FunctionFrame>,
    /// Insertion point; `None` switches every emission into analyze-only
    /// mode.
    pub ir: Option<kiln_ir::Cursor>,
    pub accumulator: Accumulator,
    pub cache: ScopeCache,
    pub exit: Option<ExitInfo>,
}

impl<'b, 's> Context<'b, 's> {
    pub fn new(builder: &'b mut Builder<'s>) -> Self {
        Self {
            builder,
            function: None,
            ir: None,
            accumulator: Accumulator::new(),
            cache: ScopeCache::new(),
            exit: None,
        }
    }

    pub fn has_ir(&self) -> bool {
        self.ir.is_some()
    }

    /// Borrow an AST node for the life of the source set, independent of
    /// this context's mutable borrows.
    pub fn ast(&self, nref: NodeRef) -> &'s kiln_ast::Node {
        self.builder.sources.node(nref)
    }

    pub fn frame(&self) -> BuildResult<&FunctionFrame> {
        self.function
            .as_ref()
            .ok_or_else(|| BuildError::new("operation requires an active function"))
    }

    /// Run `f` in analyze-only mode, restoring the cursor afterwards.
    pub fn with_no_ir<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> BuildResult<T>,
    ) -> BuildResult<T> {
        let saved = self.ir.take();
        let result = f(self);
        self.ir = saved;
        result
    }

    /// Run `f` with the cursor parked at `cursor`; returns `f`'s output
    /// and the cursor position it advanced to.
    pub fn with_cursor<T>(
        &mut self,
        cursor: kiln_ir::Cursor,
        f: impl FnOnce(&mut Self) -> BuildResult<T>,
    ) -> BuildResult<(T, kiln_ir::Cursor)> {
        let saved = self.ir.replace(cursor);
        let result = f(self);
        let end = self.ir.take();
        self.ir = saved;

        Ok((result?, end.expect("cursor still installed")))
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Construct a value and register it with the statement accumulator
    /// when it is a destructible temporary.
    pub fn new_value(
        &mut self,
        flags: ValueFlags,
        repr: Option<kiln_ir::Value>,
        ty: Typename,
    ) -> ExprValue {
        let uid = self.accumulator.next_uid();
        let value = ExprValue {
            flags,
            repr,
            ty,
            uid,
        };

        if self.has_ir()
            && value.is_temporary()
            && crate::lifecycle::needs_destroy(&value.ty)
        {
            self.accumulator.consider(value.clone());
        }

        value
    }

    /// The loaded form of a value: reads through `REFERENCE` handles.
    pub fn get(&mut self, value: &ExprValue) -> BuildResult<Option<kiln_ir::Value>> {
        if value.is_reference() {
            let ty = self.builder.make_ty(&value.ty)?;
            match (self.ir, value.repr) {
                (Some(_), Some(ptr)) => Ok(self.build_load(ty, ptr)),
                _ => Ok(None),
            }
        } else {
            Ok(value.repr)
        }
    }

    /// The address of a value: references pass through, plain values are
    /// spilled into entry-block storage.
    pub fn ref_value(&mut self, value: &ExprValue) -> BuildResult<Option<kiln_ir::Value>> {
        if value.is_reference() {
            return Ok(value.repr);
        }

        if !self.has_ir() {
            return Ok(None);
        }

        let ty = self.builder.make_ty(&value.ty)?;
        let slot = self.alloca_entry(ty, "");
        if let (Some(slot), Some(repr)) = (slot, value.repr) {
            self.build_store(repr, slot);
        }

        Ok(slot)
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Stack storage for a type, allocated in the function's entry block.
    pub fn make_alloca(&mut self, ty: &Typename, name: &str) -> BuildResult<Option<kiln_ir::Value>> {
        if let Typename::Array(array) = ty {
            match &array.kind {
                ArrayKind::Unbounded => {
                    return Err(BuildError::new(format!(
                        "Attempt to allocate type {ty} on stack."
                    )));
                }
                ArrayKind::UnboundedSized(_) => {
                    return Err(BuildError::new(format!(
                        "VLA unsupported for type {ty}. Use *{ty} for allocation instead."
                    )));
                }
                _ => {}
            }
        }

        let ir_ty = self.builder.make_ty(ty)?;
        Ok(self.alloca_entry(ir_ty, name))
    }

    /// Heap storage for a type. Unbounded-sized arrays evaluate their
    /// length expression once; the converted length is memoized in the
    /// scope cache under the size's identity key.
    pub fn make_malloc(&mut self, ty: &Typename, name: &str) -> BuildResult<Option<kiln_ir::Value>> {
        let mut byte_count: Option<kiln_ir::Value> = None;

        if let Typename::Array(array) = ty {
            match &array.kind {
                ArrayKind::Unbounded => {
                    return Err(BuildError::new(format!(
                        "Attempt to allocate type {ty} on heap."
                    )));
                }
                ArrayKind::UnboundedSized(key) => {
                    let size = match self.cache.find_size(*key) {
                        Some(cached) => cached.clone(),
                        None => {
                            // First sight of this size: evaluate it once
                            // and remember the converted value.
                            let length = match key {
                                crate::typename::SizeKey::Expr(node) => {
                                    expression::make(self, *node)?
                                }
                                crate::typename::SizeKey::Var(variable) => {
                                    expression::make_variable_read(self, *variable)?
                                }
                            };

                            let converted = crate::convert::make_convert(
                                self,
                                &length,
                                &Typename::ulong(),
                                false,
                            )?
                            .ok_or_else(|| {
                                BuildError::new(
                                    "Expression cannot be converted to ulong for size for array.",
                                )
                            })?;

                            self.cache.insert_size(*key, converted.clone());
                            converted
                        }
                    };

                    let elem = (*array.value).clone();
                    byte_count = self.scaled_size(&size, &elem)?;
                }
                _ => {}
            }
        }

        self.finish_malloc(ty, byte_count, name)
    }

    /// `count * store_size(elem)` as an i64 value.
    fn scaled_size(
        &mut self,
        count: &ExprValue,
        elem: &Typename,
    ) -> BuildResult<Option<kiln_ir::Value>> {
        let elem_ty = self.builder.make_ty(elem)?;
        let elem_size = self
            .builder
            .layout
            .store_size(&self.builder.module, &elem_ty);

        let count = self.get(count)?;
        let size_const = self
            .builder
            .module
            .const_int(kiln_ir::Ty::Int(64), i128::from(elem_size));

        Ok(match count {
            Some(count) => {
                self.build_binary(kiln_ir::BinOp::Mul, size_const, count)
            }
            None => None,
        })
    }

    fn finish_malloc(
        &mut self,
        ty: &Typename,
        byte_count: Option<kiln_ir::Value>,
        name: &str,
    ) -> BuildResult<Option<kiln_ir::Value>> {
        if !self.has_ir() {
            return Ok(None);
        }

        let ir_ty = self.builder.make_ty(ty)?;
        let pointer_ty = kiln_ir::Ty::ptr_to(ir_ty.clone());
        let bytes = self.builder.layout.store_size(&self.builder.module, &ir_ty);

        let malloc = self.builder.get_malloc();
        let size = match byte_count {
            Some(value) => value,
            None => self
                .builder
                .module
                .const_int(kiln_ir::Ty::Int(64), i128::from(bytes)),
        };

        let raw = self
            .build_call(kiln_ir::Value::Func(malloc), vec![size])
            .expect("cursor installed");
        let cast = self.build_cast(kiln_ir::CastOp::PointerCast, raw, pointer_ty);

        let _ = name;
        Ok(cast)
    }

    // ------------------------------------------------------------------
    // Emission wrappers: no-ops without a cursor
    // ------------------------------------------------------------------

    pub fn append_block(&mut self, name: &str) -> BuildResult<kiln_ir::BlockId> {
        let func = self.frame()?.func;
        Ok(self.builder.module.append_block(func, name))
    }

    /// Move the cursor to the end of a block.
    pub fn seek_end(&mut self, block: kiln_ir::BlockId) -> BuildResult<()> {
        let func = self.frame()?.func;
        self.ir = Some(kiln_ir::Cursor::at_end(func, block));
        Ok(())
    }

    pub fn alloca_entry(&mut self, ty: kiln_ir::Ty, name: &str) -> Option<kiln_ir::Value> {
        if !self.has_ir() {
            return None;
        }

        let frame = self.function.as_ref()?;
        let mut cursor = kiln_ir::Cursor::at_end(frame.func, frame.entry);
        Some(self.builder.module.build_alloca(&mut cursor, ty, name))
    }

    fn emit_with<T>(
        &mut self,
        f: impl FnOnce(&mut kiln_ir::Module, &mut kiln_ir::Cursor) -> T,
    ) -> Option<T> {
        let mut cursor = self.ir?;
        let out = f(&mut self.builder.module, &mut cursor);
        self.ir = Some(cursor);
        Some(out)
    }

    pub fn build_load(&mut self, ty: kiln_ir::Ty, ptr: kiln_ir::Value) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_load(cursor, ty, ptr))
    }

    pub fn build_store(&mut self, value: kiln_ir::Value, ptr: kiln_ir::Value) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_store(cursor, value, ptr))
    }

    pub fn build_gep(
        &mut self,
        ptr: kiln_ir::Value,
        indices: &[kiln_ir::Value],
        name: &str,
    ) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_gep(cursor, ptr, indices, name))
    }

    pub fn build_struct_gep(
        &mut self,
        ptr: kiln_ir::Value,
        index: u32,
        name: &str,
    ) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_struct_gep(cursor, ptr, index, name))
    }

    pub fn build_call(
        &mut self,
        callee: kiln_ir::Value,
        args: Vec<kiln_ir::Value>,
    ) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_call(cursor, callee, args))
    }

    pub fn build_binary(
        &mut self,
        op: kiln_ir::BinOp,
        a: kiln_ir::Value,
        b: kiln_ir::Value,
    ) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_binary(cursor, op, a, b))
    }

    pub fn build_cmp(
        &mut self,
        op: kiln_ir::CmpOp,
        a: kiln_ir::Value,
        b: kiln_ir::Value,
    ) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_cmp(cursor, op, a, b))
    }

    pub fn build_cast(
        &mut self,
        op: kiln_ir::CastOp,
        value: kiln_ir::Value,
        ty: kiln_ir::Ty,
    ) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_cast(cursor, op, value, ty))
    }

    pub fn build_not(&mut self, value: kiln_ir::Value) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_not(cursor, value))
    }

    pub fn build_neg(&mut self, value: kiln_ir::Value) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_neg(cursor, value))
    }

    pub fn build_fneg(&mut self, value: kiln_ir::Value) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_fneg(cursor, value))
    }

    pub fn build_is_not_null(&mut self, value: kiln_ir::Value) -> Option<kiln_ir::Value> {
        self.emit_with(|module, cursor| module.build_is_not_null(cursor, value))
    }

    pub fn build_br(&mut self, dest: kiln_ir::BlockId) {
        if let Some(cursor) = self.ir {
            self.builder.module.build_br(&cursor, dest);
        }
    }

    pub fn build_cond_br(
        &mut self,
        cond: kiln_ir::Value,
        on_true: kiln_ir::BlockId,
        on_false: kiln_ir::BlockId,
    ) {
        if let Some(cursor) = self.ir {
            self.builder
                .module
                .build_cond_br(&cursor, cond, on_true, on_false);
        }
    }

    pub fn build_switch(
        &mut self,
        value: kiln_ir::Value,
        default: kiln_ir::BlockId,
        cases: Vec<(i64, kiln_ir::BlockId)>,
    ) {
        if let Some(cursor) = self.ir {
            self.builder.module.build_switch(&cursor, value, default, cases);
        }
    }

    pub fn build_ret(&mut self, value: Option<kiln_ir::Value>) {
        if let Some(cursor) = self.ir {
            self.builder.module.build_ret(&cursor, value);
        }
    }

    /// Whether the block under the cursor is already terminated.
    pub fn current_terminated(&self) -> bool {
        match self.ir {
            Some(cursor) => self
                .builder
                .module
                .terminator(cursor.func, cursor.block)
                .is_some(),
            None => false,
        }
    }
}
