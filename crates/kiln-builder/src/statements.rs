//! Statements, scopes, and the exit-chain protocol.
//!
//! Every scope owns a one-byte exit slot, a destructor chain, and a
//! trailing dispatch block. Leaving the scope stores the exit kind and
//! branches into the chain; the dispatch block switches the stored kind to
//! the destinations the enclosing statement supplied, and forwards
//! anything unmapped to the parent scope's chain (or the function
//! epilogue at the root). Each scoped variable's destructor lives in its
//! own block spliced onto the front of the chain, so later declarations
//! destroy first.

use kiln_ast::{AssignOp, BlockKind, NodeData, NodeKind, StatementOp};
use kiln_ir::Ty;

use crate::accumulator::Accumulator;
use crate::convert::make_convert;
use crate::emit::{Context, ExitInfo};
use crate::error::{blame, BuildError, BuildResult};
use crate::expression;
use crate::lifecycle;
use crate::operators;
use crate::sources::NodeRef;
use crate::typename::Typename;

/// How a scope is being left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExitPoint {
    Regular = 0,
    Return = 1,
    Break = 2,
    Continue = 3,
}

/// Exit-kind to destination mapping for one scope. `None` marks a kind the
/// surrounding statement prohibits; unmapped kinds propagate outward.
pub type Destinations = Vec<(ExitPoint, Option<kiln_ir::BlockId>)>;

/// Leave the innermost scope with the given exit kind. The cursor moves
/// to a fresh unreachable block so trailing statements stay well-formed.
pub fn make_exit(ctx: &mut Context, point: ExitPoint) -> BuildResult<()> {
    if !ctx.has_ir() {
        return Ok(());
    }

    let exit = ctx
        .exit
        .ok_or_else(|| BuildError::new("exit outside of any scope"))?;

    let code = ctx.builder.module.const_int(Ty::Int(8), point as i128);
    ctx.build_store(code, exit.slot);
    ctx.build_br(exit.begin);

    let dead = ctx.append_block("unreachable")?;
    ctx.seek_end(dead)?;

    Ok(())
}

/// Splice a destructor for `storage` onto the front of the current exit
/// chain.
fn register_destroy(
    ctx: &mut Context,
    storage: kiln_ir::Value,
    ty: &Typename,
) -> BuildResult<()> {
    if !ctx.has_ir() {
        return Ok(());
    }

    let func = ctx.frame()?.func;
    let exit = ctx.exit.expect("scope installs exit info");

    let block = ctx.append_block("destroy")?;
    let ty = ty.clone();

    let ((), tail) = ctx.with_cursor(kiln_ir::Cursor::at_end(func, block), |ctx| {
        lifecycle::make_destroy(ctx, storage, &ty)
    })?;

    ctx.builder.module.build_br(&tail, exit.begin);

    if let Some(exit) = &mut ctx.exit {
        exit.begin = block;
    }

    Ok(())
}

// ----------------------------------------------------------------------
// Local variables
// ----------------------------------------------------------------------

fn make_local(ctx: &mut Context, node: NodeRef) -> BuildResult<()> {
    let variable = match &ctx.ast(node).data {
        NodeData::Variable(data) => data,
        _ => unreachable!("local statement is a variable"),
    };
    let name = variable.name.as_str();
    let mutable = variable.mutable;

    let init = match variable.value {
        Some(value) => Some(expression::make(
            ctx,
            NodeRef {
                file: node.file,
                node: value,
            },
        )?),
        None => None,
    };

    let ty = match &variable.type_spec {
        Some(spec) => ctx.builder.resolve_typespec(node, spec)?,
        None => match &init {
            Some(init) => init.ty.clone(),
            None => {
                return Err(BuildError::at(
                    node.file,
                    node.node,
                    format!("Variable {name} must have a type or a value."),
                ));
            }
        },
    };

    let storage = ctx.make_alloca(&ty, name)?;

    match init {
        Some(init) => {
            let converted = make_convert(ctx, &init, &ty, false)?.ok_or_else(|| {
                BuildError::at(
                    node.file,
                    node.node,
                    format!(
                        "Cannot convert type {} to variable {name} of type {ty}.",
                        init.ty
                    ),
                )
            })?;
            let passed = expression::make_pass(ctx, &converted)?;

            if let (Some(storage), Some(value)) = (storage, ctx.get(&passed)?) {
                ctx.build_store(value, storage);
            }
        }
        None => {
            if let Some(storage) = storage {
                lifecycle::make_initialize(ctx, storage, &ty)?;
            }
        }
    }

    if let Some(storage) = storage {
        if lifecycle::needs_destroy(&ty) {
            register_destroy(ctx, storage, &ty)?;
        }
    }

    ctx.cache.insert_variable(crate::cache::VariableBinding {
        node,
        ty,
        storage,
        mutable,
    });

    Ok(())
}

// ----------------------------------------------------------------------
// Assignment
// ----------------------------------------------------------------------

fn make_assign(ctx: &mut Context, node: NodeRef) -> BuildResult<()> {
    let (op, target, value) = match &ctx.ast(node).data {
        NodeData::Assign(data) => (
            data.op,
            NodeRef {
                file: node.file,
                node: data.target,
            },
            NodeRef {
                file: node.file,
                node: data.value,
            },
        ),
        _ => unreachable!("assign statement carries assign payload"),
    };

    let destination = expression::make(ctx, target)?;
    let source_raw = expression::make(ctx, value)?;

    let source = make_convert(ctx, &source_raw, &destination.ty, false)?.ok_or_else(|| {
        BuildError::at(
            node.file,
            node.node,
            format!(
                "Assignment of type {} to {} is not allowed.",
                source_raw.ty, destination.ty
            ),
        )
    })?;

    if !destination.is_reference() || !destination.is_mutable() {
        return Err(BuildError::at(
            node.file,
            node.node,
            "Left side of assign expression must be a mutable variable.",
        ));
    }

    let result = blame(node.file, node.node, || match op {
        AssignOp::Assign => {
            let passed = expression::make_pass(ctx, &source)?;
            ctx.get(&passed)
        }
        AssignOp::Plus => compound(ctx, &destination, &source, operators::make_add),
        AssignOp::Minus => compound(ctx, &destination, &source, operators::make_sub),
        AssignOp::Multiply => compound(ctx, &destination, &source, operators::make_mul),
        AssignOp::Divide => compound(ctx, &destination, &source, operators::make_div),
        AssignOp::Modulo => compound(ctx, &destination, &source, operators::make_mod),
    })?;

    if let (Some(result), Some(slot)) = (result, destination.repr) {
        ctx.build_store(result, slot);
    }

    Ok(())
}

fn compound(
    ctx: &mut Context,
    destination: &crate::value::ExprValue,
    source: &crate::value::ExprValue,
    op: impl Fn(
        &mut Context,
        &crate::value::ExprValue,
        &crate::value::ExprValue,
    ) -> BuildResult<crate::value::ExprValue>,
) -> BuildResult<Option<kiln_ir::Value>> {
    let operation = op(ctx, destination, source)?;
    let passed = expression::make_pass(ctx, &operation)?;
    ctx.get(&passed)
}

// ----------------------------------------------------------------------
// Flow statements
// ----------------------------------------------------------------------

fn make_statement(ctx: &mut Context, node: NodeRef) -> BuildResult<()> {
    let (op, value) = match &ctx.ast(node).data {
        NodeData::Statement(data) => (data.op, data.value),
        _ => unreachable!("statement node carries statement payload"),
    };

    match op {
        StatementOp::Return => {
            let frame = ctx.frame()?.clone();
            let return_type = (*frame.signature.return_type).clone();
            let nothing = Typename::nothing();

            match value {
                None => {
                    if return_type != nothing {
                        return Err(BuildError::at(
                            node.file,
                            node.node,
                            format!(
                                "Method is of type {return_type} but return statement does not return anything."
                            ),
                        ));
                    }
                }
                Some(value) => {
                    if return_type == nothing {
                        return Err(BuildError::at(
                            node.file,
                            node.node,
                            "Method does not have a return type but return statement returns value.",
                        ));
                    }

                    let value = NodeRef {
                        file: node.file,
                        node: value,
                    };

                    let raw = expression::make(ctx, value)?;
                    let converted =
                        make_convert(ctx, &raw, &return_type, false)?.ok_or_else(|| {
                            BuildError::at(
                                node.file,
                                node.node,
                                format!(
                                    "Cannot return {} from a function that returns {return_type}.",
                                    raw.ty
                                ),
                            )
                        })?;

                    let result = expression::make_pass(ctx, &converted)?;

                    if let (Some(result), Some(slot)) = (ctx.get(&result)?, frame.return_slot) {
                        ctx.build_store(result, slot);
                    }
                }
            }

            lifecycle::commit_accumulator(ctx)?;
            make_exit(ctx, ExitPoint::Return)
        }
        StatementOp::Break => make_exit(ctx, ExitPoint::Break),
        StatementOp::Continue => make_exit(ctx, ExitPoint::Continue),
    }
}

fn make_block(ctx: &mut Context, node: NodeRef) -> BuildResult<()> {
    let (kind, body) = match &ctx.ast(node).data {
        NodeData::Block(data) => (
            data.kind,
            NodeRef {
                file: node.file,
                node: data.body,
            },
        ),
        _ => unreachable!("block statement carries block payload"),
    };

    match kind {
        BlockKind::Regular => {
            let next = ctx.append_block("after")?;
            let scope =
                make_scope(ctx, body, &vec![(ExitPoint::Regular, Some(next))])?;

            if let Some(scope) = scope {
                ctx.build_br(scope);
            }
            ctx.seek_end(next)?;
        }
        BlockKind::Exit => {
            let exit = ctx
                .exit
                .ok_or_else(|| BuildError::new("exit block outside of any scope"))?;

            // The body is spliced onto the destructor chain: it runs on
            // every exit path, then falls into the chain as it was.
            let scope = make_scope(
                ctx,
                body,
                &vec![
                    (ExitPoint::Regular, Some(exit.begin)),
                    (ExitPoint::Break, None),
                    (ExitPoint::Return, None),
                    (ExitPoint::Continue, None),
                ],
            )?;

            if let (Some(scope), Some(exit)) = (scope, &mut ctx.exit) {
                exit.begin = scope;
            }
        }
    }

    Ok(())
}

fn make_if(ctx: &mut Context, node: NodeRef) -> BuildResult<()> {
    let next = ctx.append_block("after")?;
    let condition_block = recurse_if(ctx, node, next)?;

    if let Some(condition_block) = condition_block {
        ctx.build_br(condition_block);
    }
    ctx.seek_end(next)?;

    Ok(())
}

fn recurse_if(
    ctx: &mut Context,
    node: NodeRef,
    next: kiln_ir::BlockId,
) -> BuildResult<Option<kiln_ir::BlockId>> {
    let (condition, on_true, on_false) = match &ctx.ast(node).data {
        NodeData::If(data) => (
            NodeRef {
                file: node.file,
                node: data.condition,
            },
            NodeRef {
                file: node.file,
                node: data.on_true,
            },
            data.on_false.map(|n| NodeRef {
                file: node.file,
                node: n,
            }),
        ),
        _ => unreachable!("if statement carries if payload"),
    };

    let false_next = match on_false {
        None => Some(next),
        Some(branch) => match ctx.ast(branch).kind() {
            NodeKind::Code => {
                make_scope(ctx, branch, &vec![(ExitPoint::Regular, Some(next))])?
            }
            NodeKind::If => recurse_if(ctx, branch, next)?,
            kind => {
                return Err(BuildError::at(
                    branch.file,
                    branch.node,
                    format!("Unexpected else branch of kind {kind:?}."),
                ));
            }
        },
    };

    let true_scope = make_scope(ctx, on_true, &vec![(ExitPoint::Regular, Some(next))])?;

    if !ctx.has_ir() {
        return Ok(None);
    }

    let func = ctx.frame()?.func;
    let check = ctx.append_block("check")?;

    let ((), _end) = ctx.with_cursor(kiln_ir::Cursor::at_end(func, check), |ctx| {
        let result = expression::make(ctx, condition)?;
        let converted =
            make_convert(ctx, &result, &Typename::bool_type(), false)?.ok_or_else(|| {
                BuildError::at(
                    node.file,
                    node.node,
                    "Condition for if statement must evaluate to a bool.",
                )
            })?;

        let cond = ctx.get(&converted)?.expect("cursor installed");
        ctx.build_cond_br(
            cond,
            true_scope.expect("scope emitted with cursor"),
            false_next.expect("branch emitted with cursor"),
        );

        Ok(())
    })?;

    Ok(Some(check))
}

fn make_for(ctx: &mut Context, node: NodeRef) -> BuildResult<()> {
    let (condition, body) = match &ctx.ast(node).data {
        NodeData::For(data) => (
            data.condition.map(|n| NodeRef {
                file: node.file,
                node: n,
            }),
            NodeRef {
                file: node.file,
                node: data.body,
            },
        ),
        _ => unreachable!("for statement carries for payload"),
    };

    let func = ctx.frame()?.func;

    match condition {
        None => {
            let jump = ctx.append_block("jump")?;
            let next = ctx.append_block("after")?;

            let scope = make_scope(
                ctx,
                body,
                &vec![
                    (ExitPoint::Break, Some(next)),
                    (ExitPoint::Regular, Some(jump)),
                    (ExitPoint::Continue, Some(jump)),
                ],
            )?;

            if let Some(scope) = scope {
                ctx.build_br(scope);

                let jump_cursor = kiln_ir::Cursor::at_end(func, jump);
                ctx.builder.module.build_br(&jump_cursor, scope);
            }

            ctx.seek_end(next)?;
        }
        Some(condition) => {
            let jump = ctx.append_block("jump")?;
            let next = ctx.append_block("after")?;

            let scope = make_scope(
                ctx,
                body,
                &vec![
                    (ExitPoint::Break, Some(next)),
                    (ExitPoint::Regular, Some(jump)),
                    (ExitPoint::Continue, Some(jump)),
                ],
            )?;

            let ((), _end) = ctx.with_cursor(kiln_ir::Cursor::at_end(func, jump), |ctx| {
                let result = expression::make(ctx, condition)?;
                let converted = make_convert(ctx, &result, &Typename::bool_type(), false)?
                    .ok_or_else(|| {
                        BuildError::at(
                            node.file,
                            node.node,
                            format!(
                                "For node must have bool as expression, got {}.",
                                result.ty
                            ),
                        )
                    })?;

                let cond = ctx.get(&converted)?.expect("cursor installed");
                ctx.build_cond_br(cond, scope.expect("scope emitted"), next);
                Ok(())
            })?;

            ctx.build_br(jump);
            ctx.seek_end(next)?;
        }
    }

    Ok(())
}

fn make_insight(ctx: &mut Context, node: NodeRef) -> BuildResult<()> {
    let value = match &ctx.ast(node).data {
        NodeData::Insight(data) => NodeRef {
            file: node.file,
            node: data.value,
        },
        _ => unreachable!("insight statement carries insight payload"),
    };

    let result = ctx.with_no_ir(|ctx| expression::make(ctx, value))?;

    let origin = ctx.builder.describe_origin(node);
    let report = format!("insight {origin}: {}", result.ty);

    tracing::info!("{report}");
    ctx.builder.insights.push(report);

    Ok(())
}

// ----------------------------------------------------------------------
// Scope
// ----------------------------------------------------------------------

/// Lower one code scope. Returns the scope's opening block (or `None` in
/// analyze-only mode); the caller owns branching into it and wiring the
/// destinations it passed.
pub fn make_scope(
    ctx: &mut Context,
    code: NodeRef,
    destinations: &Destinations,
) -> BuildResult<Option<kiln_ir::BlockId>> {
    let children: Vec<NodeRef> = match &ctx.ast(code).data {
        NodeData::Code(data) => data
            .children
            .iter()
            .map(|&node| NodeRef {
                file: code.file,
                node,
            })
            .collect(),
        _ => {
            return Err(BuildError::at(
                code.file,
                code.node,
                "Expected a code scope.",
            ));
        }
    };

    let with_ir = ctx.has_ir();

    let mut opening = None;
    let parent_exit = ctx.exit;
    let parent_cursor = ctx.ir;

    if with_ir {
        let frame = ctx.frame()?.clone();

        let open = ctx.append_block("scope")?;
        let slot = ctx
            .alloca_entry(Ty::Int(8), "exit_type")
            .expect("cursor installed");
        let chain = ctx.append_block("exit_scope")?;

        opening = Some(open);
        ctx.exit = Some(ExitInfo {
            slot,
            begin: chain,
            end: chain,
        });
        ctx.ir = Some(kiln_ir::Cursor::at_end(frame.func, open));
    }

    let parent_accumulator = std::mem::replace(&mut ctx.accumulator, Accumulator::new());
    ctx.cache.push();

    let mut lower = |ctx: &mut Context| -> BuildResult<()> {
        for child in children {
            let kind = ctx.ast(child).kind();

            let result = blame(child.file, child.node, || match kind {
                NodeKind::Variable => make_local(ctx, child),
                NodeKind::Assign => make_assign(ctx, child),
                NodeKind::Statement => make_statement(ctx, child),
                NodeKind::Block => make_block(ctx, child),
                NodeKind::If => make_if(ctx, child),
                NodeKind::For => make_for(ctx, child),
                NodeKind::Expression => expression::make(ctx, child).map(|_| ()),
                NodeKind::Insight => make_insight(ctx, child),
                kind => Err(BuildError::new(format!(
                    "Unexpected statement of kind {kind:?}."
                ))),
            });
            result?;

            // Flow statements commit on their own, before they leave.
            if kind != NodeKind::Statement {
                lifecycle::commit_accumulator(ctx)?;
            }
        }

        if ctx.has_ir() && !ctx.current_terminated() {
            make_exit(ctx, ExitPoint::Regular)?;
        }

        Ok(())
    };
    let outcome = lower(ctx);

    ctx.cache.pop();
    ctx.accumulator = parent_accumulator;
    let child_exit = ctx.exit;
    ctx.exit = parent_exit;
    ctx.ir = parent_cursor;

    outcome?;

    // Commit: dispatch the stored exit kind.
    if with_ir {
        let frame = ctx.frame()?.clone();
        let child_exit = child_exit.expect("installed above");

        let end_cursor = kiln_ir::Cursor::at_end(frame.func, child_exit.end);
        let mut end_cursor_mut = end_cursor;
        let value =
            ctx.builder
                .module
                .build_load(&mut end_cursor_mut, Ty::Int(8), child_exit.slot);

        // Unmapped kinds propagate: into the parent's chain, or to the
        // function epilogue at the root.
        let pass = match parent_exit {
            Some(parent) => {
                let pass = ctx.builder.module.append_block(frame.func, "pass");
                let mut pass_cursor = kiln_ir::Cursor::at_end(frame.func, pass);
                ctx.builder
                    .module
                    .build_store(&mut pass_cursor, value, parent.slot);
                ctx.builder.module.build_br(&pass_cursor, parent.begin);
                pass
            }
            None => frame.exit,
        };

        let cases: Vec<(i64, kiln_ir::BlockId)> = destinations
            .iter()
            .filter_map(|(point, dest)| dest.map(|dest| (*point as i64, dest)))
            .collect();

        ctx.builder
            .module
            .build_switch(&end_cursor_mut, value, pass, cases);
    }

    Ok(opening)
}
