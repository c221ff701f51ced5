//! Suffix modifier lowering: calls, member access, indexing, ternary,
//! casts.

use kiln_ast::{NodeData, NodeKind};
use kiln_ir::Ty;

use crate::convert::{make_convert, make_convert_pair};
use crate::emit::Context;
use crate::error::{blame, BuildError, BuildResult};
use crate::expression::{self, make_infer, make_real};
use crate::matching::{self, MatchInput};
use crate::nouns;
use crate::sources::NodeRef;
use crate::typename::{ArrayKind, NamedTypename, Typename};
use crate::value::{Builtin, ExprValue, Unresolved, ValueFlags, Wrapped};

// ----------------------------------------------------------------------
// Call
// ----------------------------------------------------------------------

/// Invoke a function value: arguments convert against the value's own
/// signature; there is no overload set to search.
pub fn call_function_value(
    ctx: &mut Context,
    value: &ExprValue,
    input: &MatchInput,
) -> BuildResult<ExprValue> {
    let Some(function) = value.ty.as_function().cloned() else {
        return Err(BuildError::new("Cannot call a non-function value."));
    };

    if function.parameters.len() != input.parameters.len() {
        return Err(BuildError::new(format!(
            "Expected {} parameters but got {}.",
            function.parameters.len(),
            input.parameters.len()
        )));
    }

    let mut args = Vec::with_capacity(input.parameters.len());
    for ((_, ty), argument) in function.parameters.iter().zip(&input.parameters) {
        let converted = make_convert(ctx, argument, ty, false)?.ok_or_else(|| {
            BuildError::new(format!(
                "Cannot convert parameter of type {} to type {ty}.",
                argument.ty
            ))
        })?;
        let converted = expression::make_pass(ctx, &converted)?;

        if let Some(repr) = ctx.get(&converted)? {
            args.push(repr);
        }
    }

    let callee = ctx.get(value)?;
    let repr = match callee {
        Some(callee) => ctx.build_call(callee, args),
        None => None,
    };

    Ok(ctx.new_value(
        ValueFlags::TEMPORARY,
        repr,
        (*function.return_type).clone(),
    ))
}

/// `*T(args)`: allocate, then copy-construct the pointee from the
/// constructor result.
fn call_on_new(
    ctx: &mut Context,
    unresolved: &Unresolved,
    input: &MatchInput,
) -> BuildResult<Option<Wrapped>> {
    let new_node = unresolved
        .references
        .iter()
        .copied()
        .find(|&nref| ctx.ast(nref).kind() == NodeKind::New);

    let Some(new_node) = new_node else {
        return Ok(None);
    };

    let spec = match &ctx.ast(new_node).data {
        NodeData::New(data) => &data.type_spec,
        _ => unreachable!("new node carries a new payload"),
    };
    let ty = ctx.builder.resolve_typespec(new_node, spec)?;

    let constructed = match &ty {
        Typename::Named(named) => {
            let outcome = matching::call(ctx, &[named.node], &[], input)?;
            Some(matching::unwrap(outcome, unresolved.from)?)
        }
        _ => {
            // A non-aggregate takes at most one value to copy in.
            if input.parameters.len() > 1 || !input.names.is_empty() {
                return Err(BuildError::new(
                    "New parameters may only be passed to a type/struct.",
                ));
            }

            match input.parameters.first() {
                Some(argument) => {
                    let converted =
                        make_convert(ctx, argument, &ty, false)?.ok_or_else(|| {
                            BuildError::new(format!(
                                "Cannot convert parameter of type {} to type {ty}.",
                                argument.ty
                            ))
                        })?;
                    Some(converted)
                }
                None => None,
            }
        }
    };

    let output = nouns::make_new(ctx, &ty)?;

    if let Some(constructed) = constructed {
        if let (Some(value), Some(ptr)) = (ctx.get(&constructed)?, ctx.get(&output)?) {
            ctx.build_store(value, ptr);
        }
    }

    Ok(Some(Wrapped::Value(output)))
}

fn call_on_function_or_type(
    ctx: &mut Context,
    unresolved: &Unresolved,
    input: &MatchInput,
) -> BuildResult<Option<Wrapped>> {
    let callables: Vec<NodeRef> = unresolved
        .references
        .iter()
        .copied()
        .filter(|&nref| {
            matches!(
                ctx.ast(nref).kind(),
                NodeKind::Function | NodeKind::TypeDecl
            )
        })
        .collect();

    if callables.is_empty() && unresolved.builtins.is_empty() {
        return Err(BuildError::new(
            "Reference did not resolve to any functions to call.",
        ));
    }

    let outcome = matching::call(ctx, &callables, &unresolved.builtins, input)?;
    Ok(Some(Wrapped::Value(matching::unwrap(
        outcome,
        unresolved.from,
    )?)))
}

/// The call suffix: arguments lower in order, the implicit receiver (from
/// a dot) rides in front, and the handler chain decides what the callee
/// is.
pub fn make_call(ctx: &mut Context, value: Wrapped, node: NodeRef) -> BuildResult<Wrapped> {
    let call = match &ctx.ast(node).data {
        NodeData::Call(data) => data,
        _ => unreachable!("call modifier carries call payload"),
    };

    let mut input = MatchInput::default();

    match value {
        Wrapped::Unresolved(unresolved) => {
            if let Some(implicit) = &unresolved.implicit {
                input.parameters.push((**implicit).clone());
            }

            let offset = input.parameters.len();
            for (index, name) in call.named_indices() {
                input.names.push((index + offset, name));
            }

            for &argument in &call.arguments {
                let argument = NodeRef {
                    file: node.file,
                    node: argument,
                };
                input.parameters.push(expression::make(ctx, argument)?);
            }

            blame(node.file, node.node, || {
                if let Some(result) = call_on_new(ctx, &unresolved, &input)? {
                    return Ok(result);
                }
                if let Some(result) = call_on_function_or_type(ctx, &unresolved, &input)? {
                    return Ok(result);
                }
                Err(BuildError::new("Could not resolve call target."))
            })
        }
        Wrapped::Value(value) => {
            for (index, name) in call.named_indices() {
                input.names.push((index, name));
            }

            for &argument in &call.arguments {
                let argument = NodeRef {
                    file: node.file,
                    node: argument,
                };
                input.parameters.push(expression::make(ctx, argument)?);
            }

            blame(node.file, node.node, || {
                call_function_value(ctx, &value, &input).map(Wrapped::Value)
            })
        }
    }
}

// ----------------------------------------------------------------------
// Dot
// ----------------------------------------------------------------------

/// Field access: dereference down to the named aggregate, take the
/// field's address, keep the source's mutability and temporariness.
fn dot_for_field(
    ctx: &mut Context,
    value: &ExprValue,
    name: &str,
) -> BuildResult<Option<Wrapped>> {
    let mut layers = 0usize;
    let mut cursor = &value.ty;
    while let Typename::Reference(reference) = cursor {
        cursor = &reference.value;
        layers += 1;
    }

    let Typename::Named(NamedTypename { node, .. }) = cursor else {
        return Ok(None);
    };
    let node = *node;

    let info = ctx.builder.make_type(node)?;
    let Some(index) = info
        .fields
        .iter()
        .position(|(_, field, ..)| field == name)
    else {
        return Ok(None);
    };

    let (_, field_name, field_ty, _) = info.fields[index].clone();

    // Address of the underlying aggregate, reading through every
    // reference layer on the way.
    let mut address = if layers > 0 {
        ctx.get(value)?
    } else {
        ctx.ref_value(value)?
    };

    for _ in 1..layers {
        address = match address {
            Some(ptr) => {
                let ty = ctx.builder.make_ty(cursor)?;
                ctx.build_load(Ty::ptr_to(ty), ptr)
            }
            None => None,
        };
    }

    let repr = match address {
        Some(ptr) => ctx.build_struct_gep(ptr, index as u32, &field_name),
        None => None,
    };

    let flags = (value.flags & (ValueFlags::MUTABLE | ValueFlags::TEMPORARY))
        | ValueFlags::REFERENCE;

    Ok(Some(Wrapped::Value(ctx.new_value(flags, repr, field_ty))))
}

/// Uniform function call: every function of this name that takes at
/// least one parameter becomes a candidate, with the receiver as the
/// implicit first argument.
fn dot_for_ufcs(
    ctx: &mut Context,
    value: &ExprValue,
    name: &str,
    member: NodeRef,
) -> BuildResult<Option<Wrapped>> {
    let candidates = ctx.builder.search_all_dependencies(|node| match &node.data {
        NodeData::Function(f) => f.name == name && !f.parameters.is_empty(),
        _ => false,
    });

    let builtins = Builtin::matching(name);

    if candidates.is_empty() && builtins.is_empty() {
        return Err(BuildError::new(format!(
            "Could not find method or field with name {name}."
        )));
    }

    Ok(Some(Wrapped::Unresolved(Unresolved {
        from: member,
        references: candidates,
        builtins,
        implicit: Some(Box::new(value.clone())),
    })))
}

pub fn make_dot(ctx: &mut Context, value: Wrapped, node: NodeRef) -> BuildResult<Wrapped> {
    let member = match &ctx.ast(node).data {
        NodeData::Dot(data) => NodeRef {
            file: node.file,
            node: data.member,
        },
        _ => unreachable!("dot modifier carries dot payload"),
    };

    let name = match &ctx.ast(member).data {
        NodeData::Reference(reference) => reference.name.as_str(),
        _ => {
            return Err(BuildError::at(
                node.file,
                node.node,
                "Dot operator expects a member name.",
            ));
        }
    };

    blame(node.file, node.node, || {
        let value = make_infer(ctx, &value)?;

        if let Some(result) = dot_for_field(ctx, &value, name)? {
            return Ok(result);
        }
        if let Some(result) = dot_for_ufcs(ctx, &value, name, member)? {
            return Ok(result);
        }

        Err(BuildError::new("Could not resolve dot operator."))
    })
}

// ----------------------------------------------------------------------
// Index
// ----------------------------------------------------------------------

pub fn make_index(ctx: &mut Context, value: Wrapped, node: NodeRef) -> BuildResult<Wrapped> {
    let index_expr = match &ctx.ast(node).data {
        NodeData::Index(data) => NodeRef {
            file: node.file,
            node: data.index,
        },
        _ => unreachable!("index modifier carries index payload"),
    };

    let inferred = make_infer(ctx, &value)?;
    let sub = make_real(ctx, &inferred)?;

    let Some(array) = sub.ty.as_array().cloned() else {
        return Err(BuildError::at(
            node.file,
            node.node,
            format!(
                "Indexing must only be applied on array types, type is {}.",
                sub.ty
            ),
        ));
    };

    let index = expression::make(ctx, index_expr)?;
    let index = make_convert(ctx, &index, &Typename::ulong(), false)?.ok_or_else(|| {
        BuildError::at(
            index_expr.file,
            index_expr.node,
            format!(
                "Must be able to be converted to int type for indexing, instead type is {}.",
                index.ty
            ),
        )
    })?;

    let repr = if ctx.has_ir() {
        let index_value = ctx.get(&index)?.expect("cursor installed");

        match &array.kind {
            ArrayKind::FixedSize(_) => {
                let base = ctx.ref_value(&sub)?.expect("cursor installed");
                let zero = ctx.builder.module.const_int(Ty::Int(64), 0);
                ctx.build_gep(base, &[zero, index_value], "element")
            }
            ArrayKind::Unbounded | ArrayKind::UnboundedSized(_) => {
                let base = ctx.ref_value(&sub)?.expect("cursor installed");
                ctx.build_gep(base, &[index_value], "element")
            }
            ArrayKind::VariableSize => {
                let base = ctx.ref_value(&sub)?.expect("cursor installed");
                let data_ptr = ctx.build_struct_gep(base, 2, "data").expect("cursor");
                let elem_ptr = Ty::ptr_to(ctx.builder.make_ty(&array.value)?);
                let data = ctx.build_load(elem_ptr, data_ptr).expect("cursor");
                ctx.build_gep(data, &[index_value], "element")
            }
            ArrayKind::Iterable => {
                return Err(BuildError::at(
                    node.file,
                    node.node,
                    "Iterable arrays cannot be indexed.",
                ));
            }
        }
    } else {
        None
    };

    let flags = (sub.flags & (ValueFlags::MUTABLE | ValueFlags::TEMPORARY))
        | ValueFlags::REFERENCE;

    Ok(Wrapped::Value(ctx.new_value(
        flags,
        repr,
        (*array.value).clone(),
    )))
}

// ----------------------------------------------------------------------
// Ternary
// ----------------------------------------------------------------------

pub fn make_ternary(ctx: &mut Context, value: ExprValue, node: NodeRef) -> BuildResult<Wrapped> {
    let (on_true, on_false) = match &ctx.ast(node).data {
        NodeData::Ternary(data) => (
            NodeRef {
                file: node.file,
                node: data.on_true,
            },
            NodeRef {
                file: node.file,
                node: data.on_false,
            },
        ),
        _ => unreachable!("ternary modifier carries ternary payload"),
    };

    let condition = make_convert(ctx, &value, &Typename::bool_type(), false)?.ok_or_else(|| {
        BuildError::at(
            node.file,
            node.node,
            format!(
                "Must be able to be converted to boolean type for ternary, instead type is {}.",
                value.ty
            ),
        )
    })?;

    if !ctx.has_ir() {
        // Analyze both arms for their negotiated type.
        let true_value = expression::make(ctx, on_true)?;
        let false_value = expression::make(ctx, on_false)?;

        let ty = crate::convert::negotiate(&true_value.ty, &false_value.ty).ok_or_else(|| {
            branch_error(node, &true_value.ty, &false_value.ty)
        })?;

        return Ok(Wrapped::Value(ctx.new_value(
            ValueFlags::TEMPORARY | ValueFlags::REFERENCE,
            None,
            ty,
        )));
    }

    let frame_func = ctx.frame()?.func;

    let true_block = ctx.append_block("ternary.true")?;
    let false_block = ctx.append_block("ternary.false")?;
    let resume_block = ctx.append_block("ternary.done")?;

    let (true_value, true_end) = ctx.with_cursor(
        kiln_ir::Cursor::at_end(frame_func, true_block),
        |ctx| expression::make(ctx, on_true),
    )?;
    let (false_value, false_end) = ctx.with_cursor(
        kiln_ir::Cursor::at_end(frame_func, false_block),
        |ctx| expression::make(ctx, on_false),
    )?;

    let pair = make_convert_pair(ctx, Some(true_end), &true_value, Some(false_end), &false_value)?;

    let Some((on_true_value, on_false_value, true_end, false_end)) = pair else {
        return Err(branch_error(node, &true_value.ty, &false_value.ty));
    };

    debug_assert_eq!(on_true_value.ty, on_false_value.ty);

    let result_ty = on_true_value.ty.clone();
    let ir_ty = ctx.builder.make_ty(&result_ty)?;
    let slot = ctx.alloca_entry(ir_ty, "ternary").expect("cursor installed");

    // Store each arm's value at the end of its own block, then stitch.
    let ((), true_end) = ctx.with_cursor(true_end.expect("arm cursor"), |ctx| {
        if let Some(v) = ctx.get(&on_true_value)? {
            ctx.build_store(v, slot);
        }
        Ok(())
    })?;
    let ((), false_end) = ctx.with_cursor(false_end.expect("arm cursor"), |ctx| {
        if let Some(v) = ctx.get(&on_false_value)? {
            ctx.build_store(v, slot);
        }
        Ok(())
    })?;

    if let Some(cond) = ctx.get(&condition)? {
        ctx.build_cond_br(cond, true_block, false_block);
    }

    ctx.builder.module.build_br(&true_end, resume_block);
    ctx.builder.module.build_br(&false_end, resume_block);

    ctx.seek_end(resume_block)?;

    Ok(Wrapped::Value(ctx.new_value(
        ValueFlags::TEMPORARY | ValueFlags::REFERENCE,
        Some(slot),
        result_ty,
    )))
}

fn branch_error(node: NodeRef, left: &Typename, right: &Typename) -> BuildError {
    BuildError::at(
        node.file,
        node.node,
        format!(
            "Branches of ternary of type {left} and {right} cannot be converted to each other."
        ),
    )
}

// ----------------------------------------------------------------------
// Cast
// ----------------------------------------------------------------------

pub fn make_as(ctx: &mut Context, value: ExprValue, node: NodeRef) -> BuildResult<Wrapped> {
    let spec = match &ctx.ast(node).data {
        NodeData::As(data) => &data.type_spec,
        _ => unreachable!("as modifier carries as payload"),
    };

    let target = ctx.builder.resolve_typespec(node, spec)?;

    let converted = blame(node.file, node.node, || {
        make_convert(ctx, &value, &target, true)
    })?;

    match converted {
        Some(converted) => Ok(Wrapped::Value(converted)),
        None => Err(BuildError::at(
            node.file,
            node.node,
            format!("Cannot convert type {} to type {target}.", value.ty),
        )),
    }
}
