//! Atomic expression lowering: literals, strings, arrays, allocations.

use kiln_ast::{NumberValue, SpecialLit};
use kiln_ir::Ty;

use crate::emit::Context;
use crate::error::{BuildError, BuildResult};
use crate::lifecycle;
use crate::typename::{ArrayKind, Primitive, ReferenceKind, Typename};
use crate::value::{ExprValue, ValueFlags};

pub fn make_special(ctx: &mut Context, lit: SpecialLit) -> BuildResult<ExprValue> {
    match lit {
        SpecialLit::Null => {
            let repr = Some(ctx.builder.module.const_null(Ty::ptr_to(Ty::Int(8))));
            Ok(ctx.new_value(
                ValueFlags::TEMPORARY,
                repr,
                Typename::primitive(Primitive::Null),
            ))
        }
        SpecialLit::Nothing | SpecialLit::Any => Err(BuildError::new(
            "This literal cannot be used as a value.",
        )),
    }
}

pub fn make_bool(ctx: &mut Context, value: bool) -> BuildResult<ExprValue> {
    let repr = Some(ctx.builder.module.const_int(Ty::Int(1), i128::from(value)));
    Ok(ctx.new_value(ValueFlags::TEMPORARY, repr, Typename::bool_type()))
}

/// Numeric literals keep the class the scanner gave them: signed literals
/// are `int` (or `long` past 32 bits), unsigned are `ulong`, floats are
/// `double`. Conversion to the context's type happens through the
/// lattice, so an exact-width overload wins with zero conversions.
pub fn make_number(ctx: &mut Context, value: NumberValue) -> BuildResult<ExprValue> {
    let (repr, ty) = match value {
        NumberValue::Signed(v) => {
            if i32::try_from(v).is_ok() {
                (
                    ctx.builder.module.const_int(Ty::Int(32), i128::from(v)),
                    Typename::primitive(Primitive::Int),
                )
            } else {
                (
                    ctx.builder.module.const_int(Ty::Int(64), i128::from(v)),
                    Typename::primitive(Primitive::Long),
                )
            }
        }
        NumberValue::Unsigned(v) => (
            ctx.builder.module.const_int(Ty::Int(64), i128::from(v)),
            Typename::ulong(),
        ),
        NumberValue::Float(v) => (
            ctx.builder.module.const_float(Ty::Double, v),
            Typename::primitive(Primitive::Double),
        ),
    };

    Ok(ctx.new_value(ValueFlags::TEMPORARY, Some(repr), ty))
}

/// A string literal is an immutable global; its value is an unbounded
/// byte-view reference into it.
pub fn make_string(ctx: &mut Context, text: &str) -> BuildResult<ExprValue> {
    let ty = Typename::reference(
        Typename::array(ArrayKind::Unbounded, Typename::primitive(Primitive::Byte)),
        false,
        ReferenceKind::Regular,
    );

    let repr = if ctx.has_ir() {
        let name = ctx.builder.next_string_name(text);
        let storage_ty = Ty::array_of(Ty::Int(8), text.len() as u64 + 1);
        let global = ctx.builder.module.add_global(
            name,
            storage_ty,
            Some(kiln_ir::ConstData::Str(text.to_string())),
            true,
        );

        let zero = ctx.builder.module.const_int(Ty::Int(64), 0);
        ctx.build_gep(kiln_ir::Value::Global(global), &[zero, zero], "str")
    } else {
        None
    };

    Ok(ctx.new_value(ValueFlags::TEMPORARY, repr, ty))
}

/// An array literal lowers to fixed-size stack storage, filled in order.
pub fn make_array(ctx: &mut Context, values: Vec<ExprValue>) -> BuildResult<ExprValue> {
    let elem = values
        .first()
        .map(|v| v.ty.clone())
        .unwrap_or(Typename::primitive(Primitive::Any));

    if values.iter().any(|v| v.ty != elem) {
        return Err(BuildError::new(format!(
            "Array elements must all be the same type {elem}."
        )));
    }

    let ty = Typename::array(ArrayKind::FixedSize(values.len() as u64), elem);

    let storage = if ctx.has_ir() {
        let ir_ty = ctx.builder.make_ty(&ty)?;
        let slot = ctx.alloca_entry(ir_ty, "array.literal");

        if let Some(slot) = slot {
            for (index, value) in values.iter().enumerate() {
                let zero = ctx.builder.module.const_int(Ty::Int(64), 0);
                let offset = ctx.builder.module.const_int(Ty::Int(64), index as i128);
                let point = ctx
                    .build_gep(slot, &[zero, offset], "element")
                    .expect("cursor installed");

                if let Some(loaded) = ctx.get(value)? {
                    ctx.build_store(loaded, point);
                }
            }
        }

        slot
    } else {
        None
    };

    Ok(ctx.new_value(
        ValueFlags::TEMPORARY | ValueFlags::REFERENCE,
        storage,
        ty,
    ))
}

/// `new`: heap-allocate a default-initialized value and own it uniquely.
pub fn make_new(ctx: &mut Context, ty: &Typename) -> BuildResult<ExprValue> {
    let ptr = ctx.make_malloc(ty, "new")?;

    if let Some(ptr) = ptr {
        lifecycle::make_initialize(ctx, ptr, ty)?;
    }

    Ok(ctx.new_value(
        ValueFlags::TEMPORARY,
        ptr,
        Typename::reference(ty.clone(), true, ReferenceKind::Unique),
    ))
}
