//! Expression lowering.
//!
//! The engine walks the precedence-resolved tree: nouns produce wrapped
//! values (names stay unresolved until a consumer needs them), operations
//! apply one modifier, combinators join two inferred operands. `infer`
//! collapses an unresolved name — variable first, then zero-argument
//! overload resolution — and is applied twice at expression boundaries so
//! a resolved zero-parameter function value still auto-invokes.

use kiln_ast::{ExprTree, NodeData, NodeKind, UnaryOp};

use crate::emit::Context;
use crate::error::{blame, BuildError, BuildResult};
use crate::matching::{self, MatchInput};
use crate::modifiers;
use crate::nouns;
use crate::operators;
use crate::sources::NodeRef;
use crate::typename::{ArrayKind, ReferenceKind, Typename};
use crate::value::{Builtin, ExprValue, Unresolved, ValueFlags, Wrapped};

fn at(ctx: &Context, node: kiln_ast::NodeId) -> NodeRef {
    NodeRef {
        file: ctx.builder.file,
        node,
    }
}

// ----------------------------------------------------------------------
// Escape and shape adjustments
// ----------------------------------------------------------------------

/// Mark a temporary as escaped (consumed into storage, a return slot, or
/// an aggregate). Passing a non-temporary owning value is a hard error:
/// it would double-own without an explicit move or copy.
pub fn make_pass(ctx: &mut Context, value: &ExprValue) -> BuildResult<ExprValue> {
    let reference = value.ty.as_reference();
    let array = value.ty.as_array();

    let is_regular_reference = reference.is_some_and(|r| r.kind == ReferenceKind::Regular);

    if value.is_temporary() {
        if !is_regular_reference {
            ctx.accumulator.avoid(value.uid);
        }
    } else {
        let owning_reference = reference.is_some_and(|r| r.kind != ReferenceKind::Regular);
        let owning_array = array.is_some_and(|a| a.kind == ArrayKind::VariableSize);

        if owning_reference || owning_array {
            return Err(BuildError::new(format!(
                "Passing non-temporary of type {} is prohibited. May require a move or copy.",
                value.ty
            )));
        }
    }

    Ok(value.clone())
}

/// The type under every reference layer.
pub fn find_real(ty: &Typename) -> &Typename {
    let mut current = ty;
    while let Typename::Reference(reference) = current {
        current = &reference.value;
    }
    current
}

/// Read through every reference layer, keeping flags honest about the
/// innermost layer's mutability.
pub fn make_real(ctx: &mut Context, value: &ExprValue) -> BuildResult<ExprValue> {
    let mut current = value.clone();

    while let Typename::Reference(reference) = current.ty.clone() {
        let repr = if current.is_reference() {
            match current.repr {
                Some(ptr) => {
                    let ty = ctx.builder.make_ty(&current.ty)?;
                    ctx.build_load(ty, ptr)
                }
                None => None,
            }
        } else {
            current.repr
        };

        let mut flags = current.flags;
        flags.remove(ValueFlags::MUTABLE);
        if reference.mutable {
            flags |= ValueFlags::MUTABLE;
        }
        flags |= ValueFlags::REFERENCE;

        current = ExprValue {
            flags,
            repr,
            ty: (*reference.value).clone(),
            uid: current.uid,
        };
    }

    Ok(current)
}

// ----------------------------------------------------------------------
// Infer
// ----------------------------------------------------------------------

/// Read a variable binding: locals through the scope cache, globals
/// through the symbol tables.
pub fn make_variable_read(ctx: &mut Context, variable: NodeRef) -> BuildResult<ExprValue> {
    let parent = ctx.ast(variable).parent;
    let is_global = parent.is_some_and(|p| {
        ctx.ast(NodeRef {
            file: variable.file,
            node: p,
        })
        .kind()
            == NodeKind::Root
    });

    let (storage, ty, mutable) = if is_global {
        let info = ctx.builder.make_global(variable)?;
        (Some(info.value), info.ty, info.mutable)
    } else {
        let binding = ctx
            .cache
            .find_variable(variable)
            .ok_or_else(|| BuildError::new("Cannot find variable reference."))?;
        (binding.storage, binding.ty.clone(), binding.mutable)
    };

    let mut flags = ValueFlags::REFERENCE;
    if mutable {
        flags |= ValueFlags::MUTABLE;
    }

    Ok(ctx.new_value(flags, storage, ty))
}

/// Collapse a wrapped value to a concrete one.
pub fn make_infer(ctx: &mut Context, wrapped: &Wrapped) -> BuildResult<ExprValue> {
    match wrapped {
        Wrapped::Value(value) => {
            if !value.is_set(ValueFlags::EXPLICIT) {
                if let Some(function) = value.ty.as_function() {
                    // A bare zero-parameter function value auto-invokes.
                    if !function.locked && function.parameters.is_empty() {
                        return modifiers::call_function_value(ctx, value, &MatchInput::default());
                    }
                }
            }

            Ok(value.clone())
        }
        Wrapped::Unresolved(unresolved) => {
            // The first variable in the reference list is the closest in
            // scope; it shadows everything else.
            let variable = unresolved
                .references
                .iter()
                .copied()
                .find(|&nref| ctx.ast(nref).kind() == NodeKind::Variable);

            if let Some(variable) = variable {
                return make_variable_read(ctx, variable);
            }

            let new_node = unresolved
                .references
                .iter()
                .copied()
                .find(|&nref| ctx.ast(nref).kind() == NodeKind::New);

            if let Some(new_node) = new_node {
                let spec = match &ctx.ast(new_node).data {
                    NodeData::New(data) => &data.type_spec,
                    _ => unreachable!("new node carries a new payload"),
                };
                let ty = ctx.builder.resolve_typespec(new_node, spec)?;
                return nouns::make_new(ctx, &ty);
            }

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
                return Err(BuildError::at(
                    unresolved.from.file,
                    unresolved.from.node,
                    "Reference does not implicitly resolve to anything.",
                ));
            }

            let mut input = MatchInput::default();
            if let Some(implicit) = &unresolved.implicit {
                input.parameters.push((**implicit).clone());
            }

            let outcome = matching::call(ctx, &callables, &unresolved.builtins, &input)?;
            matching::unwrap(outcome, unresolved.from)
        }
    }
}

// ----------------------------------------------------------------------
// Nouns
// ----------------------------------------------------------------------

/// Lower a noun-content node into a wrapped value.
pub fn make_noun_content(ctx: &mut Context, node: NodeRef) -> BuildResult<Wrapped> {
    match &ctx.ast(node).data {
        NodeData::Parentheses(data) => {
            let body = at(ctx, data.body);
            Ok(Wrapped::Value(make(ctx, body)?))
        }
        NodeData::Reference(data) => {
            let references = ctx.builder.find_all(node, &data.name);
            let builtins = Builtin::matching(&data.name);

            Ok(Wrapped::Unresolved(Unresolved {
                from: node,
                references,
                builtins,
                implicit: None,
            }))
        }
        NodeData::New(_) => Ok(Wrapped::Unresolved(Unresolved {
            from: node,
            references: vec![node],
            builtins: Vec::new(),
            implicit: None,
        })),
        NodeData::Special(lit) => Ok(Wrapped::Value(nouns::make_special(ctx, *lit)?)),
        NodeData::BoolLit(value) => Ok(Wrapped::Value(nouns::make_bool(ctx, *value)?)),
        NodeData::Number(data) => Ok(Wrapped::Value(nouns::make_number(ctx, data.value)?)),
        NodeData::StringLit(data) => {
            if !data.inserts.is_empty() {
                return Err(BuildError::at(
                    node.file,
                    node.node,
                    "String literals with inserts are not supported here.",
                ));
            }
            Ok(Wrapped::Value(nouns::make_string(ctx, &data.text)?))
        }
        NodeData::ArrayLit(data) => {
            let mut values = Vec::with_capacity(data.elements.len());
            for &element in &data.elements {
                let element = at(ctx, element);
                values.push(make(ctx, element)?);
            }
            Ok(Wrapped::Value(nouns::make_array(ctx, values)?))
        }
        _ => Err(BuildError::at(
            node.file,
            node.node,
            "Unexpected noun in expression.",
        )),
    }
}

// ----------------------------------------------------------------------
// Operations and combinators
// ----------------------------------------------------------------------

pub fn make_unary(
    ctx: &mut Context,
    wrapped: &Wrapped,
    op_node: NodeRef,
    op: UnaryOp,
) -> BuildResult<Wrapped> {
    let result = blame(op_node.file, op_node.node, || match op {
        UnaryOp::Not => {
            let value = make_infer(ctx, wrapped)?;
            operators::make_not(ctx, &value)
        }
        UnaryOp::Negative => {
            let value = make_infer(ctx, wrapped)?;
            operators::make_negative(ctx, &value)
        }
        UnaryOp::Reference => operators::make_reference(ctx, wrapped),
        UnaryOp::Fetch => operators::make_dereference(ctx, wrapped),
    })?;

    Ok(Wrapped::Value(result))
}

pub fn make_operation(
    ctx: &mut Context,
    a: &ExprTree,
    op: kiln_ast::NodeId,
) -> BuildResult<Wrapped> {
    let wrapped = make_result(ctx, a)?;
    let op_ref = at(ctx, op);

    match &ctx.ast(op_ref).data {
        NodeData::Unary(unary) => make_unary(ctx, &wrapped, op_ref, unary.op),
        NodeData::Call(_) => modifiers::make_call(ctx, wrapped, op_ref),
        NodeData::Dot(_) => modifiers::make_dot(ctx, wrapped, op_ref),
        NodeData::Index(_) => modifiers::make_index(ctx, wrapped, op_ref),
        NodeData::Ternary(_) => {
            let value = make_infer(ctx, &wrapped)?;
            modifiers::make_ternary(ctx, value, op_ref)
        }
        NodeData::As(_) => {
            let value = make_infer(ctx, &wrapped)?;
            modifiers::make_as(ctx, value, op_ref)
        }
        _ => Err(BuildError::at(
            op_ref.file,
            op_ref.node,
            "Unexpected expression modifier.",
        )),
    }
}

pub fn make_combinator(
    ctx: &mut Context,
    a: &ExprTree,
    b: &ExprTree,
    op: kiln_ast::NodeId,
) -> BuildResult<Wrapped> {
    let left_wrapped = make_result(ctx, a)?;
    let left = make_infer(ctx, &left_wrapped)?;

    let right_wrapped = make_result(ctx, b)?;
    let right = make_infer(ctx, &right_wrapped)?;

    let op_ref = at(ctx, op);
    let operation = match &ctx.ast(op_ref).data {
        NodeData::Operator(operator) => operator.op,
        _ => {
            return Err(BuildError::at(
                op_ref.file,
                op_ref.node,
                "Combinator operator node expected.",
            ));
        }
    };

    use kiln_ast::BinaryOp;

    let result = blame(op_ref.file, op_ref.node, || match operation {
        BinaryOp::Add => operators::make_add(ctx, &left, &right),
        BinaryOp::Sub => operators::make_sub(ctx, &left, &right),
        BinaryOp::Mul => operators::make_mul(ctx, &left, &right),
        BinaryOp::Div => operators::make_div(ctx, &left, &right),
        BinaryOp::Mod => operators::make_mod(ctx, &left, &right),
        BinaryOp::Equals => operators::make_eq(ctx, &left, &right),
        BinaryOp::NotEquals => operators::make_ne(ctx, &left, &right),
        BinaryOp::Greater => operators::make_gt(ctx, &left, &right),
        BinaryOp::GreaterEqual => operators::make_ge(ctx, &left, &right),
        BinaryOp::Lesser => operators::make_lt(ctx, &left, &right),
        BinaryOp::LesserEqual => operators::make_le(ctx, &left, &right),
        BinaryOp::And => operators::make_and(ctx, &left, &right),
        BinaryOp::Or => operators::make_or(ctx, &left, &right),
        BinaryOp::Fallback => operators::make_fallback(ctx, &left, &right),
    })?;

    Ok(Wrapped::Value(result))
}

/// Lower one tree node to a wrapped value.
pub fn make_result(ctx: &mut Context, tree: &ExprTree) -> BuildResult<Wrapped> {
    match tree {
        ExprTree::Noun(content) => {
            let content = at(ctx, *content);
            make_noun_content(ctx, content)
        }
        ExprTree::Operation { a, op } => make_operation(ctx, a, *op),
        ExprTree::Combinator { a, b, op } => make_combinator(ctx, a, b, *op),
    }
}

/// Lower a full expression node to a value.
///
/// `infer` runs twice: once to collapse an unresolved name, once more so
/// that a function value the first pass produced can still auto-invoke.
pub fn make(ctx: &mut Context, expression: NodeRef) -> BuildResult<ExprValue> {
    let tree = match &ctx.ast(expression).data {
        NodeData::Expression(data) => &data.tree,
        _ => {
            return Err(BuildError::at(
                expression.file,
                expression.node,
                "Expected an expression node.",
            ));
        }
    };

    let wrapped = make_result(ctx, tree)?;
    let value = make_infer(ctx, &wrapped)?;
    make_infer(ctx, &Wrapped::Value(value))
}
