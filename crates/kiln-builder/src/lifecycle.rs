//! Initialization and destruction.
//!
//! Both operations dispatch over the type kind through a small handler
//! chain. Destruction of aggregates routes through the per-type implicit
//! destructor function; shared cells decrement their refcount and free on
//! zero.

use kiln_ir::{BinOp, CastOp, CmpOp, Ty};

use crate::emit::Context;
use crate::error::BuildResult;
use crate::typename::{ArrayKind, PrimitiveExt, ReferenceKind, Typename};

/// Whether values of this type require destruction at end of life.
pub fn needs_destroy(ty: &Typename) -> bool {
    match ty {
        Typename::Reference(reference) => reference.kind != ReferenceKind::Regular,
        Typename::Array(array) => array.kind == ArrayKind::VariableSize,
        Typename::Named(_) => true,
        Typename::Optional(optional) => needs_destroy(&optional.value),
        _ => false,
    }
}

// ----------------------------------------------------------------------
// Initialization
// ----------------------------------------------------------------------

/// Write the default value of `ty` into the storage at `ptr`.
pub fn make_initialize(ctx: &mut Context, ptr: kiln_ir::Value, ty: &Typename) -> BuildResult<()> {
    if !ctx.has_ir() {
        return Ok(());
    }

    match ty {
        Typename::Primitive(p) if p.is_number() || *p == crate::typename::Primitive::Bool => {
            let ir_ty = ctx.builder.make_primitive_ty(*p);
            let zero = if p.is_float() {
                ctx.builder.module.const_float(ir_ty, 0.0)
            } else {
                ctx.builder.module.const_int(ir_ty, 0)
            };
            ctx.build_store(zero, ptr);
        }
        Typename::Reference(_) => {
            let ir_ty = ctx.builder.make_ty(ty)?;
            let null = ctx.builder.module.const_null(ir_ty);
            ctx.build_store(null, ptr);
        }
        Typename::Array(array) if array.kind == ArrayKind::VariableSize => {
            // The empty triple: (0, 0, null).
            let ir_ty = ctx.builder.make_ty(ty)?;
            let zero = ctx.builder.module.const_zero(ir_ty);
            ctx.build_store(zero, ptr);
        }
        Typename::Optional(_) => {
            let ir_ty = ctx.builder.make_ty(ty)?;
            let zero = ctx.builder.module.const_zero(ir_ty);
            ctx.build_store(zero, ptr);
        }
        Typename::Named(named) => {
            // Field-wise default initialization.
            let info = ctx.builder.make_type(named.node)?;
            for (index, (_, name, field_ty, _)) in info.fields.iter().enumerate() {
                let field_ptr = ctx
                    .build_struct_gep(ptr, index as u32, name)
                    .expect("cursor installed");
                make_initialize(ctx, field_ptr, field_ty)?;
            }
        }
        _ => {}
    }

    Ok(())
}

// ----------------------------------------------------------------------
// Destruction
// ----------------------------------------------------------------------

fn call_free(ctx: &mut Context, pointer: kiln_ir::Value) {
    let free = ctx.builder.get_free();
    let byte_ptr = Ty::ptr_to(Ty::Int(8));

    if let Some(cast) = ctx.build_cast(CastOp::PointerCast, pointer, byte_ptr) {
        ctx.build_call(kiln_ir::Value::Func(free), vec![cast]);
    }
}

/// Destroy the value stored at `ptr`.
///
/// Regular references are borrows and destroy to nothing; unique
/// references destroy their pointee and free it; growable arrays free
/// their data pointer; shared cells decrement and conditionally free;
/// named aggregates run their implicit destructor.
pub fn make_destroy(ctx: &mut Context, ptr: kiln_ir::Value, ty: &Typename) -> BuildResult<()> {
    if !ctx.has_ir() {
        return Ok(());
    }

    match ty {
        Typename::Reference(reference) => match reference.kind {
            ReferenceKind::Regular => {}
            ReferenceKind::Unique => {
                let ir_ty = ctx.builder.make_ty(ty)?;
                let pointee = (*reference.value).clone();

                if let Some(value) = ctx.build_load(ir_ty, ptr) {
                    if needs_destroy(&pointee) {
                        make_destroy(ctx, value, &pointee)?;
                    }
                    call_free(ctx, value);
                }
            }
            ReferenceKind::Shared => {
                let ir_ty = ctx.builder.make_ty(ty)?;
                let Some(cell) = ctx.build_load(ir_ty, ptr) else {
                    return Ok(());
                };

                let count_ptr = ctx
                    .build_struct_gep(cell, 0, "refcount")
                    .expect("cursor installed");
                let count = ctx.build_load(Ty::Int(64), count_ptr).expect("cursor");
                let one = ctx.builder.module.const_int(Ty::Int(64), 1);
                let next = ctx.build_binary(BinOp::Sub, count, one).expect("cursor");
                ctx.build_store(next, count_ptr);

                let zero = ctx.builder.module.const_int(Ty::Int(64), 0);
                let dead = ctx.build_cmp(CmpOp::Eq, next, zero).expect("cursor");

                let free_block = ctx.append_block("shared.free")?;
                let resume_block = ctx.append_block("shared.done")?;

                ctx.build_cond_br(dead, free_block, resume_block);

                ctx.seek_end(free_block)?;
                call_free(ctx, cell);
                ctx.build_br(resume_block);

                ctx.seek_end(resume_block)?;
            }
        },
        Typename::Array(array) if array.kind == ArrayKind::VariableSize => {
            let data_ptr = ctx
                .build_struct_gep(ptr, 2, "data")
                .expect("cursor installed");
            let elem_ptr_ty = Ty::ptr_to(ctx.builder.make_ty(&array.value)?);

            if let Some(data) = ctx.build_load(elem_ptr_ty, data_ptr) {
                call_free(ctx, data);
            }
        }
        Typename::Named(named) => {
            let destructor = ctx.builder.make_implicit_destructor(named.node)?;
            ctx.build_call(kiln_ir::Value::Func(destructor), vec![ptr]);
        }
        Typename::Optional(optional) if needs_destroy(&optional.value) => {
            // Destroy the payload only when present.
            let present_ptr = ctx
                .build_struct_gep(ptr, 0, "present")
                .expect("cursor installed");
            let present = ctx.build_load(Ty::Int(1), present_ptr).expect("cursor");

            let destroy_block = ctx.append_block("optional.destroy")?;
            let resume_block = ctx.append_block("optional.done")?;

            ctx.build_cond_br(present, destroy_block, resume_block);

            ctx.seek_end(destroy_block)?;
            let payload_ptr = ctx
                .build_struct_gep(ptr, 1, "payload")
                .expect("cursor installed");
            make_destroy(ctx, payload_ptr, &optional.value)?;
            ctx.build_br(resume_block);

            ctx.seek_end(resume_block)?;
        }
        _ => {}
    }

    Ok(())
}

/// End-of-statement commit: destroy every queued temporary FIFO, skipping
/// the ones escaped by `pass`.
pub fn commit_accumulator(ctx: &mut Context) -> BuildResult<()> {
    if !ctx.has_ir() {
        ctx.accumulator.drain_pending();
        return Ok(());
    }

    let pending = ctx.accumulator.drain_pending();

    for value in pending {
        if let Some(ptr) = ctx.ref_value(&value)? {
            make_destroy(ctx, ptr, &value.ty)?;
        }
    }

    Ok(())
}
