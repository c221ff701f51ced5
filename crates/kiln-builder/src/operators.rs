//! Unary and binary operator lowering.
//!
//! Each operator is a handler chain; the first handler that recognizes the
//! operand types produces the value, and exhaustion is the operator's type
//! error. Numeric operands negotiate to a common primitive first.

use kiln_ir::{BinOp, CmpOp, Ty};

use crate::convert::{make_convert, make_convert_double};
use crate::emit::Context;
use crate::error::{BuildError, BuildResult};
use crate::expression;
use crate::typename::{Primitive, PrimitiveExt, ReferenceKind, Typename};
use crate::value::{ExprValue, ValueFlags, Wrapped};

// ----------------------------------------------------------------------
// Operand coercion helpers
// ----------------------------------------------------------------------

/// Negotiate both operands to a common primitive number.
fn to_number(
    ctx: &mut Context,
    left: &ExprValue,
    right: &ExprValue,
) -> BuildResult<Option<(ExprValue, ExprValue, Primitive)>> {
    let (Some(l), Some(r)) = (left.ty.as_primitive(), right.ty.as_primitive()) else {
        return Ok(None);
    };

    if !(l.is_number() && r.is_number()) {
        return Ok(None);
    }

    let converted = make_convert_double(ctx, left, right)?
        .ok_or_else(|| BuildError::new("Cannot convert two number types to each other."))?;

    let (a, b) = converted;
    let prim = a.ty.as_primitive().expect("negotiated to a primitive");

    Ok(Some((a, b, prim)))
}

/// Negotiate both operands to a common reference type.
fn to_reference(
    ctx: &mut Context,
    left: &ExprValue,
    right: &ExprValue,
) -> BuildResult<Option<(ExprValue, ExprValue)>> {
    let leftish = left.ty.as_reference().is_some()
        || left.ty.is_primitive(Primitive::Null);
    let rightish = right.ty.as_reference().is_some()
        || right.ty.is_primitive(Primitive::Null);

    // At least one true reference; null may ride along.
    if !(leftish && rightish)
        || (left.ty.as_reference().is_none() && right.ty.as_reference().is_none())
    {
        return Ok(None);
    }

    let converted = make_convert_double(ctx, left, right)?
        .ok_or_else(|| BuildError::new("Cannot convert references to each other normally."))?;

    Ok(Some(converted))
}

/// Convert both operands to bool.
fn to_binary(
    ctx: &mut Context,
    left: &ExprValue,
    right: &ExprValue,
) -> BuildResult<Option<(ExprValue, ExprValue)>> {
    let target = Typename::bool_type();

    let a = make_convert(ctx, left, &target, false)?;
    let b = make_convert(ctx, right, &target, false)?;

    match (a, b) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        _ => Ok(None),
    }
}

fn number_arith(
    ctx: &mut Context,
    left: &ExprValue,
    right: &ExprValue,
    pick: impl Fn(Primitive) -> BinOp,
) -> BuildResult<Option<ExprValue>> {
    let Some((a, b, prim)) = to_number(ctx, left, right)? else {
        return Ok(None);
    };

    let ty = a.ty.clone();
    let op = pick(prim);

    let repr = match (ctx.get(&a)?, ctx.get(&b)?) {
        (Some(av), Some(bv)) => ctx.build_binary(op, av, bv),
        _ => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, ty)))
}

fn number_compare(
    ctx: &mut Context,
    left: &ExprValue,
    right: &ExprValue,
    pick: impl Fn(Primitive) -> CmpOp,
) -> BuildResult<Option<ExprValue>> {
    let Some((a, b, prim)) = to_number(ctx, left, right)? else {
        return Ok(None);
    };

    let op = pick(prim);
    let repr = match (ctx.get(&a)?, ctx.get(&b)?) {
        (Some(av), Some(bv)) => ctx.build_cmp(op, av, bv),
        _ => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, Typename::bool_type())))
}

fn reference_compare(
    ctx: &mut Context,
    left: &ExprValue,
    right: &ExprValue,
    op: CmpOp,
) -> BuildResult<Option<ExprValue>> {
    let Some((a, b)) = to_reference(ctx, left, right)? else {
        return Ok(None);
    };

    let repr = match (ctx.get(&a)?, ctx.get(&b)?) {
        (Some(av), Some(bv)) => ctx.build_cmp(op, av, bv),
        _ => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, Typename::bool_type())))
}

fn boolean_binary(
    ctx: &mut Context,
    left: &ExprValue,
    right: &ExprValue,
    op: BinOp,
) -> BuildResult<Option<ExprValue>> {
    let Some((a, b)) = to_binary(ctx, left, right)? else {
        return Ok(None);
    };

    let repr = match (ctx.get(&a)?, ctx.get(&b)?) {
        (Some(av), Some(bv)) => ctx.build_binary(op, av, bv),
        _ => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, Typename::bool_type())))
}

fn operator_error(left: &ExprValue, right: &ExprValue) -> BuildError {
    BuildError::new(format!(
        "Cannot use operator on ls of type {} and rs of type {}.",
        left.ty, right.ty
    ))
}

// ----------------------------------------------------------------------
// Binary operators
// ----------------------------------------------------------------------

pub fn make_add(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_arith(ctx, left, right, |p| {
        if p.is_float() { BinOp::FAdd } else { BinOp::Add }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_sub(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_arith(ctx, left, right, |p| {
        if p.is_float() { BinOp::FSub } else { BinOp::Sub }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_mul(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_arith(ctx, left, right, |p| {
        if p.is_float() { BinOp::FMul } else { BinOp::Mul }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_div(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_arith(ctx, left, right, |p| {
        if p.is_float() {
            BinOp::FDiv
        } else if p.is_signed() {
            BinOp::SDiv
        } else {
            BinOp::UDiv
        }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_mod(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_arith(ctx, left, right, |p| {
        if p.is_float() {
            BinOp::FRem
        } else if p.is_signed() {
            BinOp::SRem
        } else {
            BinOp::URem
        }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_eq(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    if let Some(value) = number_compare(ctx, left, right, |p| {
        if p.is_float() { CmpOp::FOeq } else { CmpOp::Eq }
    })? {
        return Ok(value);
    }

    reference_compare(ctx, left, right, CmpOp::Eq)?
        .ok_or_else(|| operator_error(left, right))
}

pub fn make_ne(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    if let Some(value) = number_compare(ctx, left, right, |p| {
        if p.is_float() { CmpOp::FOne } else { CmpOp::Ne }
    })? {
        return Ok(value);
    }

    reference_compare(ctx, left, right, CmpOp::Ne)?
        .ok_or_else(|| operator_error(left, right))
}

pub fn make_gt(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_compare(ctx, left, right, |p| {
        if p.is_float() {
            CmpOp::FOgt
        } else if p.is_signed() {
            CmpOp::Sgt
        } else {
            CmpOp::Ugt
        }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_ge(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_compare(ctx, left, right, |p| {
        if p.is_float() {
            CmpOp::FOge
        } else if p.is_signed() {
            CmpOp::Sge
        } else {
            CmpOp::Uge
        }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_lt(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_compare(ctx, left, right, |p| {
        if p.is_float() {
            CmpOp::FOlt
        } else if p.is_signed() {
            CmpOp::Slt
        } else {
            CmpOp::Ult
        }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_le(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    number_compare(ctx, left, right, |p| {
        if p.is_float() {
            CmpOp::FOle
        } else if p.is_signed() {
            CmpOp::Sle
        } else {
            CmpOp::Ule
        }
    })?
    .ok_or_else(|| operator_error(left, right))
}

pub fn make_or(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    boolean_binary(ctx, left, right, BinOp::Or)?.ok_or_else(|| operator_error(left, right))
}

pub fn make_and(ctx: &mut Context, left: &ExprValue, right: &ExprValue) -> BuildResult<ExprValue> {
    boolean_binary(ctx, left, right, BinOp::And)?.ok_or_else(|| operator_error(left, right))
}

/// `a ?? b`: the optional's payload when present, otherwise `b`.
pub fn make_fallback(
    ctx: &mut Context,
    left: &ExprValue,
    right: &ExprValue,
) -> BuildResult<ExprValue> {
    let Some(optional) = left.ty.as_optional() else {
        return Err(operator_error(left, right));
    };

    let inner = (*optional.value).clone();
    let fallback = make_convert(ctx, right, &inner, false)?
        .ok_or_else(|| operator_error(left, right))?;

    if !ctx.has_ir() {
        return Ok(ctx.new_value(ValueFlags::TEMPORARY, None, inner));
    }

    let inner_ir = ctx.builder.make_ty(&inner)?;
    let result = ctx.alloca_entry(inner_ir.clone(), "fallback").expect("cursor");

    let slot = ctx.ref_value(left)?.expect("cursor installed");
    let present_ptr = ctx.build_struct_gep(slot, 0, "present").expect("cursor");
    let present = ctx.build_load(Ty::Int(1), present_ptr).expect("cursor");

    let some_block = ctx.append_block("fallback.some")?;
    let none_block = ctx.append_block("fallback.none")?;
    let resume_block = ctx.append_block("fallback.done")?;

    ctx.build_cond_br(present, some_block, none_block);

    ctx.seek_end(some_block)?;
    let payload_ptr = ctx.build_struct_gep(slot, 1, "payload").expect("cursor");
    let payload = ctx.build_load(inner_ir, payload_ptr).expect("cursor");
    ctx.build_store(payload, result);
    ctx.build_br(resume_block);

    ctx.seek_end(none_block)?;
    if let Some(value) = ctx.get(&fallback)? {
        ctx.build_store(value, result);
    }
    ctx.build_br(resume_block);

    ctx.seek_end(resume_block)?;

    Ok(ctx.new_value(
        ValueFlags::TEMPORARY | ValueFlags::REFERENCE,
        Some(result),
        inner,
    ))
}

// ----------------------------------------------------------------------
// Unary operators
// ----------------------------------------------------------------------

pub fn make_not(ctx: &mut Context, value: &ExprValue) -> BuildResult<ExprValue> {
    let converted = make_convert(ctx, value, &Typename::bool_type(), false)?.ok_or_else(|| {
        BuildError::new(format!(
            "Cannot use operator or convert source type {} to bool.",
            value.ty
        ))
    })?;

    let repr = match ctx.get(&converted)? {
        Some(v) => ctx.build_not(v),
        None => None,
    };

    Ok(ctx.new_value(ValueFlags::TEMPORARY, repr, Typename::bool_type()))
}

pub fn make_negative(ctx: &mut Context, value: &ExprValue) -> BuildResult<ExprValue> {
    let prim = value.ty.as_primitive().filter(|p| p.is_signed() || p.is_float());

    let Some(prim) = prim else {
        return Err(BuildError::new(format!(
            "Cannot use operator or convert source type {} to signed or float.",
            value.ty
        )));
    };

    let repr = match ctx.get(value)? {
        Some(v) => {
            if prim.is_float() {
                ctx.build_fneg(v)
            } else {
                ctx.build_neg(v)
            }
        }
        None => None,
    };

    Ok(ctx.new_value(ValueFlags::TEMPORARY, repr, value.ty.clone()))
}

/// `&x`: a function name becomes an explicit function value; anything
/// addressable becomes a regular borrow.
pub fn make_reference(ctx: &mut Context, wrapped: &Wrapped) -> BuildResult<ExprValue> {
    if let Wrapped::Unresolved(unresolved) = wrapped {
        let function = unresolved.references.iter().copied().find(|&nref| {
            ctx.builder.node(nref).kind() == kiln_ast::NodeKind::Function
        });

        if let Some(function) = function {
            let info = ctx.builder.make_function(function)?;

            return Ok(ctx.new_value(
                ValueFlags::TEMPORARY | ValueFlags::EXPLICIT,
                Some(kiln_ir::Value::Func(info.func)),
                Typename::Function(info.signature),
            ));
        }
    }

    let value = expression::make_infer(ctx, wrapped)?;

    if !value.is_reference() {
        return Err(BuildError::new("Cannot get reference of temporary."));
    }

    Ok(ctx.new_value(
        ValueFlags::TEMPORARY,
        value.repr,
        Typename::reference(value.ty.clone(), value.is_mutable(), ReferenceKind::Regular),
    ))
}

/// `@x`: read through a reference, or unwrap an optional's payload.
pub fn make_dereference(ctx: &mut Context, wrapped: &Wrapped) -> BuildResult<ExprValue> {
    let value = expression::make_infer(ctx, wrapped)?;

    if let Some(reference) = value.ty.as_reference() {
        let mutable = reference.mutable;
        let inner = (*reference.value).clone();

        let repr = match reference.kind {
            ReferenceKind::Regular | ReferenceKind::Unique => ctx.get(&value)?,
            ReferenceKind::Shared => match ctx.get(&value)? {
                Some(cell) => ctx.build_struct_gep(cell, 1, "shared.value"),
                None => None,
            },
        };

        let mut flags = ValueFlags::REFERENCE;
        if mutable {
            flags |= ValueFlags::MUTABLE;
        }

        return Ok(ctx.new_value(flags, repr, inner));
    }

    if let Some(optional) = value.ty.as_optional() {
        let inner = (*optional.value).clone();

        let repr = match ctx.ref_value(&value)? {
            Some(slot) => ctx.build_struct_gep(slot, 1, "payload"),
            None => None,
        };

        let mut flags = ValueFlags::REFERENCE;
        if value.is_mutable() {
            flags |= ValueFlags::MUTABLE;
        }

        return Ok(ctx.new_value(flags, repr, inner));
    }

    Err(BuildError::new("Cannot dereference value of non reference."))
}
