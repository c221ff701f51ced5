//! The implicit/forced conversion lattice.
//!
//! `make_convert` runs a bridge pre-pass (auto-reference, auto-dereference)
//! to fixpoint, then an ordered rule chain; the first applicable rule wins.
//! Every rule is total over its guard: if the guard matches, the rule
//! produces a value of exactly the target type. `negotiate` picks the
//! common type two operands meet at.

use kiln_ir::{BinOp, CastOp, CmpOp, Ty};

use crate::emit::Context;
use crate::error::BuildResult;
use crate::typename::{
    ArrayKind, OptionalTypename, Primitive, PrimitiveExt, ReferenceKind, ReferenceTypename,
    Typename,
};
use crate::value::{ExprValue, ValueFlags};

type ConvertHandler =
    fn(&mut Context, &ExprValue, &Typename, bool) -> BuildResult<Option<ExprValue>>;

fn prim_of(ty: &Typename) -> Option<Primitive> {
    ty.as_primitive()
}

fn ref_of(ty: &Typename) -> Option<&ReferenceTypename> {
    ty.as_reference()
}

// ----------------------------------------------------------------------
// Bridge rules (pre-pass)
// ----------------------------------------------------------------------

/// Auto-reference: wrap an addressable value when the target wants a
/// compatible regular borrow. Never upgrades mutability.
fn bridge_reference(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let Some(target_ref) = ref_of(target) else {
        return Ok(None);
    };

    let points_to = *target_ref.value == value.ty;
    let source_not_ref = ref_of(&value.ty).is_none();

    let workable = target_ref.kind == ReferenceKind::Regular
        && (!target_ref.mutable || value.is_mutable());

    if !((points_to || source_not_ref) && workable) {
        return Ok(None);
    }

    let repr = ctx.ref_value(value)?;
    let ty = Typename::reference(value.ty.clone(), value.is_mutable(), ReferenceKind::Regular);

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, ty)))
}

/// Auto-dereference: peel one regular reference layer when the target is
/// exactly the pointee.
fn bridge_dereference(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let Some(value_ref) = ref_of(&value.ty) else {
        return Ok(None);
    };

    // Shared cells are not flat pointers; they peel through their own
    // rule instead.
    if *value_ref.value != *target || value_ref.kind == ReferenceKind::Shared {
        return Ok(None);
    }

    let mutable = value_ref.mutable;
    let inner = (*value_ref.value).clone();
    let repr = ctx.get(value)?;

    let mut flags = ValueFlags::REFERENCE;
    if mutable {
        flags |= ValueFlags::MUTABLE;
    }

    Ok(Some(ctx.new_value(flags, repr, inner)))
}

fn bridge(
    ctx: &mut Context,
    value: ExprValue,
    target: &Typename,
    force: bool,
) -> BuildResult<ExprValue> {
    let mut current = value;

    loop {
        if current.ty == *target {
            return Ok(current);
        }

        if let Some(next) = bridge_reference(ctx, &current, target, force)? {
            current = next;
            continue;
        }

        if let Some(next) = bridge_dereference(ctx, &current, target, force)? {
            current = next;
            continue;
        }

        return Ok(current);
    }
}

// ----------------------------------------------------------------------
// Main rules, in chain order
// ----------------------------------------------------------------------

fn convert_equal(
    _ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    if value.ty != *target {
        return Ok(None);
    }

    Ok(Some(value.clone()))
}

fn convert_forced_ref_to_ref(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    force: bool,
) -> BuildResult<Option<ExprValue>> {
    if !force || ref_of(target).is_none() || ref_of(&value.ty).is_none() {
        return Ok(None);
    }

    let ty = ctx.builder.make_ty(target)?;
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(CastOp::BitCast, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

fn convert_forced_ref_to_ulong(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    force: bool,
) -> BuildResult<Option<ExprValue>> {
    if !force || !target.is_primitive(Primitive::ULong) || ref_of(&value.ty).is_none() {
        return Ok(None);
    }

    let ty = ctx.builder.make_ty(target)?;
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(CastOp::PtrToInt, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

fn convert_forced_ulong_to_ref(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    force: bool,
) -> BuildResult<Option<ExprValue>> {
    if !force || !value.ty.is_primitive(Primitive::ULong) || ref_of(target).is_none() {
        return Ok(None);
    }

    let ty = ctx.builder.make_ty(target)?;
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(CastOp::IntToPtr, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

fn convert_forced_int_bool(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    force: bool,
) -> BuildResult<Option<ExprValue>> {
    if !force {
        return Ok(None);
    }

    let source = prim_of(&value.ty);
    let wanted = prim_of(target);

    // integer -> bool: non-zero test
    if let (Some(source), Some(Primitive::Bool)) = (source, wanted) {
        if source.is_integer() {
            let width = Ty::Int(u32::try_from(source.size()).unwrap_or(8) * 8);
            let zero = ctx.builder.module.const_int(width, 0);
            let repr = match ctx.get(value)? {
                Some(v) => ctx.build_cmp(CmpOp::Ne, v, zero),
                None => None,
            };
            return Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())));
        }
    }

    // bool -> integer: zero extension
    if let (Some(Primitive::Bool), Some(wanted_prim)) = (source, wanted) {
        if wanted_prim.is_integer() {
            let ty = ctx.builder.make_ty(target)?;
            let repr = match ctx.get(value)? {
                Some(v) => ctx.build_cast(CastOp::ZExt, v, ty),
                None => None,
            };
            return Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())));
        }
    }

    Ok(None)
}

fn convert_forced_func_ptr(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    force: bool,
) -> BuildResult<Option<ExprValue>> {
    if !force || value.ty.as_function().is_none() || target.as_function().is_none() {
        return Ok(None);
    }

    let ty = ctx.builder.make_ty(target)?;
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(CastOp::BitCast, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

/// Owning (or mutability-downgraded) reference to a regular borrow, same
/// pointee. Shared cells expose their payload slot.
fn convert_owning_to_ref(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let (Some(target_ref), Some(value_ref)) = (ref_of(target), ref_of(&value.ty)) else {
        return Ok(None);
    };

    let workable = target_ref.kind == ReferenceKind::Regular
        && *target_ref.value == *value_ref.value
        && (!target_ref.mutable || value_ref.mutable);

    if !workable {
        return Ok(None);
    }

    let repr = match value_ref.kind {
        ReferenceKind::Regular | ReferenceKind::Unique => ctx.get(value)?,
        ReferenceKind::Shared => match ctx.get(value)? {
            Some(cell) => ctx.build_struct_gep(cell, 1, "shared.value"),
            None => None,
        },
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

/// Unique sized array to a growable array: the triple is constructed with
/// `capacity == size` and the unique pointer as data.
fn convert_unique_to_variable_array(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let Some(value_ref) = ref_of(&value.ty) else {
        return Ok(None);
    };
    let (Some(source_array), Some(target_array)) =
        (value_ref.value.as_array(), target.as_array())
    else {
        return Ok(None);
    };

    let workable = value_ref.kind == ReferenceKind::Unique
        && target_array.kind == ArrayKind::VariableSize
        && target_array.value == source_array.value;

    if !workable {
        return Ok(None);
    }

    let length = match &source_array.kind {
        ArrayKind::FixedSize(n) => {
            Some(ctx.builder.module.const_int(Ty::Int(64), i128::from(*n)))
        }
        ArrayKind::UnboundedSized(key) => {
            let cached = ctx.cache.find_size(*key).cloned().ok_or_else(|| {
                crate::error::BuildError::new(format!(
                    "Attempting to access size of {} but size has not yet been calculated.",
                    value.ty
                ))
            })?;
            ctx.get(&cached)?
        }
        _ => return Ok(None),
    };

    if !ctx.has_ir() {
        return Ok(Some(ctx.new_value(
            ValueFlags::TEMPORARY | ValueFlags::REFERENCE,
            None,
            target.clone(),
        )));
    }

    let triple_ty = ctx.builder.make_ty(target)?;
    let elem_ptr_ty = Ty::ptr_to(ctx.builder.make_ty(&target_array.value)?);

    let slot = ctx.alloca_entry(triple_ty, "array");
    let data = ctx.get(value)?;

    if let (Some(slot), Some(length), Some(data)) = (slot, length, data) {
        let size_ptr = ctx.build_struct_gep(slot, 0, "size").expect("cursor");
        ctx.build_store(length, size_ptr);

        let capacity_ptr = ctx.build_struct_gep(slot, 1, "capacity").expect("cursor");
        ctx.build_store(length, capacity_ptr);

        let data_cast = ctx
            .build_cast(CastOp::PointerCast, data, elem_ptr_ty)
            .expect("cursor");
        let data_ptr = ctx.build_struct_gep(slot, 2, "data").expect("cursor");
        ctx.build_store(data_cast, data_ptr);
    }

    Ok(Some(ctx.new_value(
        ValueFlags::TEMPORARY | ValueFlags::REFERENCE,
        slot,
        target.clone(),
    )))
}

/// Any reference erases to `&any` when mutability allows.
fn convert_ref_to_any_ref(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let (Some(target_ref), Some(value_ref)) = (ref_of(target), ref_of(&value.ty)) else {
        return Ok(None);
    };

    let workable = target_ref.value.is_primitive(Primitive::Any)
        && target_ref.kind == ReferenceKind::Regular
        && (!target_ref.mutable || value_ref.mutable);

    if !workable {
        return Ok(None);
    }

    let ty = ctx.builder.make_ty(target)?;
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(CastOp::PointerCast, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

/// `&T` to `&[T:]`: a borrow of one element is a view of unknown extent.
fn convert_ref_to_unbounded_ref(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let (Some(target_ref), Some(value_ref)) = (ref_of(target), ref_of(&value.ty)) else {
        return Ok(None);
    };
    let Some(target_array) = target_ref.value.as_array() else {
        return Ok(None);
    };

    let workable = target_array.kind == ArrayKind::Unbounded
        && target_array.value == value_ref.value
        && (!target_ref.mutable || value_ref.mutable);

    if !workable {
        return Ok(None);
    }

    let repr = ctx.get(value)?;
    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

/// `&[T:n]` to `&[T:]`: step to element zero.
fn convert_fixed_ref_to_unbounded_ref(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let (Some(target_ref), Some(value_ref)) = (ref_of(target), ref_of(&value.ty)) else {
        return Ok(None);
    };
    let (Some(target_array), Some(source_array)) =
        (target_ref.value.as_array(), value_ref.value.as_array())
    else {
        return Ok(None);
    };

    let workable = target_array.kind == ArrayKind::Unbounded
        && matches!(source_array.kind, ArrayKind::FixedSize(_))
        && target_array.value == source_array.value
        && (!target_ref.mutable || value_ref.mutable);

    if !workable {
        return Ok(None);
    }

    let zero = ctx.builder.module.const_int(Ty::Int(64), 0);
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_gep(v, &[zero, zero], "front"),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

fn convert_null_to_ref(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    if !value.ty.is_primitive(Primitive::Null) || ref_of(target).is_none() {
        return Ok(None);
    }

    let ty = ctx.builder.make_ty(target)?;
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(CastOp::PointerCast, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

/// `null` wraps into any optional as the absent value.
fn convert_null_to_optional(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    if !value.ty.is_primitive(Primitive::Null) || target.as_optional().is_none() {
        return Ok(None);
    }

    let ty = ctx.builder.make_ty(target)?;
    let repr = Some(ctx.builder.module.const_zero(ty));

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

fn convert_ref_to_bool(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    if ref_of(&value.ty).is_none() || !target.is_primitive(Primitive::Bool) {
        return Ok(None);
    }

    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_is_not_null(v),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

/// An optional is truthy exactly when it holds a value.
fn convert_optional_to_bool(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    if value.ty.as_optional().is_none() || !target.is_primitive(Primitive::Bool) {
        return Ok(None);
    }

    let repr = if ctx.has_ir() {
        match ctx.ref_value(value)? {
            Some(slot) => {
                let present = ctx
                    .build_struct_gep(slot, 0, "present")
                    .expect("cursor installed");
                ctx.build_load(Ty::Int(1), present)
            }
            None => None,
        }
    } else {
        None
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

/// A value wraps into an optional of its own type.
fn convert_value_to_optional(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let Some(OptionalTypename { value: inner, .. }) = target.as_optional() else {
        return Ok(None);
    };

    if **inner != value.ty {
        return Ok(None);
    }

    if !ctx.has_ir() {
        return Ok(Some(ctx.new_value(
            ValueFlags::TEMPORARY | ValueFlags::REFERENCE,
            None,
            target.clone(),
        )));
    }

    let ty = ctx.builder.make_ty(target)?;
    let slot = ctx.alloca_entry(ty, "optional");
    let payload = ctx.get(value)?;

    if let (Some(slot), Some(payload)) = (slot, payload) {
        let truth = ctx.builder.module.const_int(Ty::Int(1), 1);
        let present = ctx.build_struct_gep(slot, 0, "present").expect("cursor");
        ctx.build_store(truth, present);

        let payload_ptr = ctx.build_struct_gep(slot, 1, "payload").expect("cursor");
        ctx.build_store(payload, payload_ptr);
    }

    Ok(Some(ctx.new_value(
        ValueFlags::TEMPORARY | ValueFlags::REFERENCE,
        slot,
        target.clone(),
    )))
}

fn convert_int_to_float(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let (Some(source), Some(wanted)) = (prim_of(&value.ty), prim_of(target)) else {
        return Ok(None);
    };

    if !(source.is_integer() && wanted.is_float()) {
        return Ok(None);
    }

    let op = if source.is_signed() {
        CastOp::SiToFp
    } else {
        CastOp::UiToFp
    };

    let ty = ctx.builder.make_primitive_ty(wanted);
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(op, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

fn convert_float_to_int(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let (Some(source), Some(wanted)) = (prim_of(&value.ty), prim_of(target)) else {
        return Ok(None);
    };

    if !(source.is_float() && wanted.is_integer()) {
        return Ok(None);
    }

    let op = if wanted.is_signed() {
        CastOp::FpToSi
    } else {
        CastOp::FpToUi
    };

    let ty = ctx.builder.make_primitive_ty(wanted);
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(op, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

/// Widening or narrowing between two integers or two floats, picked by
/// priority.
fn convert_primitive_extend(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    _force: bool,
) -> BuildResult<Option<ExprValue>> {
    let (Some(source), Some(wanted)) = (prim_of(&value.ty), prim_of(target)) else {
        return Ok(None);
    };

    if !(source.is_number() && wanted.is_number() && source.is_float() == wanted.is_float()) {
        return Ok(None);
    }

    let needs_trunc = source.priority() > wanted.priority();
    let op = if wanted.is_float() {
        if needs_trunc {
            CastOp::FpTrunc
        } else {
            CastOp::FpExt
        }
    } else if needs_trunc {
        CastOp::Trunc
    } else if wanted.is_signed() {
        CastOp::SExt
    } else {
        CastOp::ZExt
    };

    let ty = ctx.builder.make_primitive_ty(wanted);
    let repr = match ctx.get(value)? {
        Some(v) => ctx.build_cast(op, v, ty),
        None => None,
    };

    Ok(Some(ctx.new_value(ValueFlags::TEMPORARY, repr, target.clone())))
}

const CONVERT_CHAIN: &[ConvertHandler] = &[
    convert_equal,
    convert_forced_ref_to_ref,
    convert_forced_ref_to_ulong,
    convert_forced_ulong_to_ref,
    convert_forced_int_bool,
    convert_forced_func_ptr,
    convert_owning_to_ref,
    convert_unique_to_variable_array,
    convert_ref_to_any_ref,
    convert_ref_to_unbounded_ref,
    convert_fixed_ref_to_unbounded_ref,
    convert_null_to_ref,
    convert_null_to_optional,
    convert_ref_to_bool,
    convert_optional_to_bool,
    convert_value_to_optional,
    convert_int_to_float,
    convert_float_to_int,
    convert_primitive_extend,
];

/// Convert `value` to `target`, or report inapplicability with `None`.
pub fn make_convert(
    ctx: &mut Context,
    value: &ExprValue,
    target: &Typename,
    force: bool,
) -> BuildResult<Option<ExprValue>> {
    let bridged = bridge(ctx, value.clone(), target, force)?;

    for handler in CONVERT_CHAIN {
        if let Some(converted) = handler(ctx, &bridged, target, force)? {
            return Ok(Some(converted));
        }
    }

    Ok(None)
}

// ----------------------------------------------------------------------
// Negotiation
// ----------------------------------------------------------------------

fn negotiate_equal(left: &Typename, right: &Typename) -> Option<Typename> {
    (left == right).then(|| left.clone())
}

/// Two primitive numbers meet at the smallest primitive accommodating
/// both signedness, integrality, and size.
fn negotiate_primitive(left: &Typename, right: &Typename) -> Option<Typename> {
    let (l, r) = (prim_of(left)?, prim_of(right)?);

    if !(l.is_number() && r.is_number()) {
        return None;
    }

    let size = l.size().max(r.size());
    let signed = l.is_signed() || r.is_signed();
    let float = l.is_float() || r.is_float();

    let result = if float {
        match size {
            8 => Primitive::Double,
            4 => Primitive::Float,
            _ => return None,
        }
    } else if signed {
        match size {
            8 => Primitive::Long,
            4 => Primitive::Int,
            2 => Primitive::Short,
            1 => Primitive::Byte,
            _ => return None,
        }
    } else {
        match size {
            8 => Primitive::ULong,
            4 => Primitive::UInt,
            2 => Primitive::UShort,
            1 => Primitive::UByte,
            _ => return None,
        }
    };

    Some(Typename::Primitive(result))
}

fn negotiate_reference_and_null(left: &Typename, right: &Typename) -> Option<Typename> {
    let left_null = left.is_primitive(Primitive::Null);
    let right_null = right.is_primitive(Primitive::Null);

    if left_null && ref_of(right).is_some() {
        return Some(right.clone());
    }
    if right_null && ref_of(left).is_some() {
        return Some(left.clone());
    }

    None
}

/// The common type two operand types meet at, if any. Symmetric.
pub fn negotiate(left: &Typename, right: &Typename) -> Option<Typename> {
    negotiate_equal(left, right)
        .or_else(|| negotiate_primitive(left, right))
        .or_else(|| negotiate_reference_and_null(left, right))
}

/// Convert two values to their negotiated type, each in its own context.
pub fn make_convert_pair(
    ctx: &mut Context,
    a_cursor: Option<kiln_ir::Cursor>,
    a: &ExprValue,
    b_cursor: Option<kiln_ir::Cursor>,
    b: &ExprValue,
) -> BuildResult<Option<(ExprValue, ExprValue, Option<kiln_ir::Cursor>, Option<kiln_ir::Cursor>)>> {
    let Some(mediator) = negotiate(&a.ty, &b.ty) else {
        return Ok(None);
    };

    let saved = ctx.ir;

    ctx.ir = a_cursor;
    let left = make_convert(ctx, a, &mediator, false)?;
    let a_cursor = ctx.ir;

    ctx.ir = b_cursor;
    let right = make_convert(ctx, b, &mediator, false)?;
    let b_cursor = ctx.ir;

    ctx.ir = saved;

    match (left, right) {
        (Some(left), Some(right)) => Ok(Some((left, right, a_cursor, b_cursor))),
        _ => Ok(None),
    }
}

/// Convert two values to their negotiated type at the current cursor.
pub fn make_convert_double(
    ctx: &mut Context,
    a: &ExprValue,
    b: &ExprValue,
) -> BuildResult<Option<(ExprValue, ExprValue)>> {
    let cursor = ctx.ir;
    match make_convert_pair(ctx, cursor, a, cursor, b)? {
        // Both ran at the same point; keep the later cursor.
        Some((left, right, _, end)) => {
            if end.is_some() {
                ctx.ir = end;
            }
            Ok(Some((left, right)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_is_symmetric_over_numbers() {
        let int = Typename::primitive(Primitive::Int);
        let ulong = Typename::ulong();
        let float = Typename::primitive(Primitive::Float);
        let double = Typename::primitive(Primitive::Double);

        assert_eq!(
            negotiate(&int, &ulong),
            Some(Typename::primitive(Primitive::Long))
        );
        assert_eq!(negotiate(&ulong, &int), negotiate(&int, &ulong));

        assert_eq!(
            negotiate(&int, &float),
            Some(Typename::primitive(Primitive::Float))
        );
        assert_eq!(
            negotiate(&float, &double),
            Some(Typename::primitive(Primitive::Double))
        );
    }

    #[test]
    fn negotiate_reference_with_null() {
        let reference = Typename::reference(
            Typename::primitive(Primitive::Int),
            false,
            ReferenceKind::Regular,
        );
        let null = Typename::primitive(Primitive::Null);

        assert_eq!(negotiate(&reference, &null), Some(reference.clone()));
        assert_eq!(negotiate(&null, &reference), Some(reference));
    }

    #[test]
    fn negotiate_equal_passes_through() {
        let ty = Typename::array(
            ArrayKind::FixedSize(3),
            Typename::primitive(Primitive::Byte),
        );
        assert_eq!(negotiate(&ty, &ty), Some(ty));
    }

    #[test]
    fn negotiate_rejects_non_numbers() {
        let bool_ty = Typename::bool_type();
        let int = Typename::primitive(Primitive::Int);
        assert_eq!(negotiate(&bool_ty, &int), None);
    }
}
