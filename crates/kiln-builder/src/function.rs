//! Function body lowering and implicit destructors.

use kiln_ast::{NodeData, NodeKind};
use kiln_ir::Ty;

use crate::builder::{Builder, BuilderFunction};
use crate::emit::{Context, FunctionFrame};
use crate::error::{BuildError, BuildResult};
use crate::lifecycle;
use crate::sources::NodeRef;
use crate::statements;
use crate::typename::{FunctionKind, FunctionTypename, ReferenceKind, Typename};

/// Lower a function body: entry and exit blocks, the return slot, the
/// parameter bindings, then the root scope whose exit chain dispatches
/// everything to the epilogue.
pub fn build_body(builder: &mut Builder, info: &BuilderFunction) -> BuildResult<()> {
    let node = info.node;
    let (body, parameters) = match &builder.sources.node(node).data {
        NodeData::Function(f) => (
            f.body.expect("defined functions have bodies"),
            f.parameters.clone(),
        ),
        _ => unreachable!("function info points at a function"),
    };
    let body = NodeRef {
        file: node.file,
        node: body,
    };

    let return_type = (*info.signature.return_type).clone();
    let nothing = Typename::nothing();

    if return_type != nothing && !definitely_returns(builder, body) {
        return Err(BuildError::at(
            node.file,
            node.node,
            format!("Method is of type {return_type} but not every path returns a value."),
        ));
    }

    let func = info.func;
    let entry = builder.module.append_block(func, "entry");
    let exit = builder.module.append_block(func, "exit");

    let mut ctx = Context::new(builder);
    ctx.function = Some(FunctionFrame {
        node: Some(node),
        func,
        entry,
        exit,
        return_slot: None,
        signature: info.signature.clone(),
    });
    ctx.ir = Some(kiln_ir::Cursor::at_end(func, entry));

    let return_slot = if return_type != nothing {
        let ret_ty = ctx.builder.make_ty(&return_type)?;
        ctx.alloca_entry(ret_ty, "result")
    } else {
        None
    };

    if let Some(frame) = &mut ctx.function {
        frame.return_slot = return_slot;
    }

    // Parameters spill into entry-block storage and bind like locals.
    ctx.cache.push();

    for (index, &parameter) in parameters.iter().enumerate() {
        let parameter = NodeRef {
            file: node.file,
            node: parameter,
        };
        let (name, mutable) = match &ctx.ast(parameter).data {
            NodeData::Variable(v) => (v.name.clone(), v.mutable),
            _ => unreachable!("parameters are variables"),
        };

        let (_, ty) = &info.signature.parameters[index];
        let ty = ty.clone();

        let ir_ty = ctx.builder.make_ty(&ty)?;
        let storage = ctx.alloca_entry(ir_ty, &name);

        if let Some(storage) = storage {
            ctx.build_store(kiln_ir::Value::Arg(index as u32), storage);
        }

        ctx.cache.insert_variable(crate::cache::VariableBinding {
            node: parameter,
            ty,
            storage,
            mutable,
        });
    }

    let opening = statements::make_scope(&mut ctx, body, &Vec::new())?;

    // Entry runs its allocas, then falls into the body.
    ctx.build_br(opening.expect("lowering with a cursor yields an opening block"));

    ctx.cache.pop();

    // Epilogue: read the return slot and hand the value to the platform.
    let mut exit_cursor = kiln_ir::Cursor::at_end(func, exit);
    let result = match return_slot {
        Some(slot) => {
            let ret_ty = ctx.builder.make_ty(&return_type)?;
            Some(
                ctx.builder
                    .module
                    .build_load(&mut exit_cursor, ret_ty, slot),
            )
        }
        None => None,
    };

    let ret_ir_ty = ctx.builder.make_ty(&return_type)?;
    let platform = std::mem::replace(&mut ctx.builder.platform, crate::platform::identity());
    platform.tie_return(&mut ctx.builder.module, &exit_cursor, &ret_ir_ty, result);
    ctx.builder.platform = platform;

    Ok(())
}

/// Conservative reachability: does every path through this scope reach a
/// return statement?
fn definitely_returns(builder: &Builder, code: NodeRef) -> bool {
    let children = match &builder.sources.node(code).data {
        NodeData::Code(data) => &data.children,
        _ => return false,
    };

    let Some(&last) = children.last() else {
        return false;
    };
    let last = NodeRef {
        file: code.file,
        node: last,
    };

    match &builder.sources.node(last).data {
        NodeData::Statement(statement) => statement.op == kiln_ast::StatementOp::Return,
        NodeData::If(data) => match data.on_false {
            Some(on_false) => {
                let on_true = NodeRef {
                    file: code.file,
                    node: data.on_true,
                };
                let on_false = NodeRef {
                    file: code.file,
                    node: on_false,
                };

                let false_returns = match builder.sources.node(on_false).kind() {
                    NodeKind::Code => definitely_returns(builder, on_false),
                    NodeKind::If => {
                        // Chained else-if counts as a scope of its own.
                        if_returns(builder, on_false)
                    }
                    _ => false,
                };

                definitely_returns(builder, on_true) && false_returns
            }
            None => false,
        },
        NodeData::For(data) => {
            // An infinite loop without a break can only be left by
            // returning.
            data.condition.is_none()
                && !contains_break(
                    builder,
                    NodeRef {
                        file: code.file,
                        node: data.body,
                    },
                )
        }
        NodeData::Block(data) => {
            data.kind == kiln_ast::BlockKind::Regular
                && definitely_returns(
                    builder,
                    NodeRef {
                        file: code.file,
                        node: data.body,
                    },
                )
        }
        _ => false,
    }
}

fn if_returns(builder: &Builder, node: NodeRef) -> bool {
    match &builder.sources.node(node).data {
        NodeData::If(data) => {
            let on_true = NodeRef {
                file: node.file,
                node: data.on_true,
            };
            let Some(on_false) = data.on_false else {
                return false;
            };
            let on_false = NodeRef {
                file: node.file,
                node: on_false,
            };

            let false_returns = match builder.sources.node(on_false).kind() {
                NodeKind::Code => definitely_returns(builder, on_false),
                NodeKind::If => if_returns(builder, on_false),
                _ => false,
            };

            definitely_returns(builder, on_true) && false_returns
        }
        _ => false,
    }
}

/// Does this scope contain a break statement, outside any nested loop?
fn contains_break(builder: &Builder, code: NodeRef) -> bool {
    let children = match &builder.sources.node(code).data {
        NodeData::Code(data) => &data.children,
        _ => return false,
    };

    children.iter().any(|&child| {
        let child = NodeRef {
            file: code.file,
            node: child,
        };

        match &builder.sources.node(child).data {
            NodeData::Statement(statement) => statement.op == kiln_ast::StatementOp::Break,
            NodeData::If(data) => {
                let on_true = NodeRef {
                    file: code.file,
                    node: data.on_true,
                };
                let true_breaks = contains_break(builder, on_true);
                let false_breaks = data.on_false.is_some_and(|on_false| {
                    contains_break(
                        builder,
                        NodeRef {
                            file: code.file,
                            node: on_false,
                        },
                    )
                });
                true_breaks || false_breaks
            }
            NodeData::Block(data) => contains_break(
                builder,
                NodeRef {
                    file: code.file,
                    node: data.body,
                },
            ),
            // A nested loop swallows its own breaks.
            NodeData::For(_) => false,
            _ => false,
        }
    })
}

/// Build the implicit destructor body for an aggregate: run the user
/// `destroy` overload if one resolves, then destroy fields in reverse
/// declaration order.
pub fn build_destructor_body(
    builder: &mut Builder,
    node: NodeRef,
    func: kiln_ir::FuncId,
) -> BuildResult<()> {
    let info = builder.make_type(node)?;

    let value_ty = Typename::Named(crate::typename::NamedTypename {
        name: info.name.clone(),
        node,
    });
    let parameter_ty = Typename::reference(value_ty, true, ReferenceKind::Regular);

    let signature = FunctionTypename {
        kind: FunctionKind::Pointer,
        parameters: vec![("value".into(), parameter_ty)],
        return_type: Box::new(Typename::nothing()),
        locked: false,
    };

    let hook = builder.find_destroy_hook(node)?;

    let entry = builder.module.append_block(func, "entry");
    let exit = builder.module.append_block(func, "exit");
    let body = builder.module.append_block(func, "body");

    let mut ctx = Context::new(builder);
    ctx.function = Some(FunctionFrame {
        node: None,
        func,
        entry,
        exit,
        return_slot: None,
        signature,
    });
    ctx.ir = Some(kiln_ir::Cursor::at_end(func, body));
    ctx.cache.push();

    let this = kiln_ir::Value::Arg(0);

    if let Some(hook) = hook {
        ctx.build_call(kiln_ir::Value::Func(hook.func), vec![this]);
    }

    for (index, (_, name, field_ty, _)) in info.fields.iter().enumerate().rev() {
        if !lifecycle::needs_destroy(field_ty) {
            continue;
        }

        let field_ptr = ctx
            .build_struct_gep(this, index as u32, name)
            .expect("cursor installed");
        lifecycle::make_destroy(&mut ctx, field_ptr, field_ty)?;
    }

    ctx.build_br(exit);
    ctx.cache.pop();

    let entry_cursor = kiln_ir::Cursor::at_end(func, entry);
    builder.module.build_br(&entry_cursor, body);

    let exit_cursor = kiln_ir::Cursor::at_end(func, exit);
    builder.module.build_ret(&exit_cursor, None);

    Ok(())
}
