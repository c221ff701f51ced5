//! Parameter binding and call resolution.
//!
//! `match_parameters` binds a call's arguments to a candidate's formals
//! (named first, positionals left-to-right) and counts how many bindings
//! need a non-identity conversion. `call` runs the match over every
//! candidate — declared callables and name-matching builtins alike — and
//! takes the one with the fewest implicit conversions; ties are an error
//! unless every tied candidate is external.

use kiln_ast::NodeData;

use crate::convert::make_convert;
use crate::emit::Context;
use crate::error::{BuildError, BuildResult};
use crate::expression;
use crate::sources::NodeRef;
use crate::typename::{ArrayKind, SizeKey, Typename};
use crate::value::{Builtin, ExprValue, ValueFlags};

/// The arguments of one call: positional values plus `index -> name`
/// assignments for named arguments.
#[derive(Debug, Default)]
pub struct MatchInput {
    pub parameters: Vec<ExprValue>,
    pub names: Vec<(usize, String)>,
}

/// The outcome of binding one candidate.
#[derive(Debug)]
pub struct MatchResult {
    pub failed: Option<String>,
    /// Argument value per formal slot, in formal order.
    pub map: Vec<ExprValue>,
    pub num_implicit: usize,
}

#[derive(Debug)]
pub struct CallError {
    pub problem: String,
    pub messages: Vec<String>,
}

#[derive(Debug)]
pub enum CallWrapped {
    Value(ExprValue),
    Error(CallError),
}

/// Bind `input` against `formals`. Conversion checks run in analyze-only
/// mode; no code is emitted here.
pub fn match_parameters(
    ctx: &mut Context,
    formals: &[(String, Typename)],
    input: &MatchInput,
) -> BuildResult<MatchResult> {
    if formals.len() != input.parameters.len() {
        let mut error = format!(
            "Expected {} parameters but got {}.",
            formals.len(),
            input.parameters.len()
        );

        if input.parameters.len() < formals.len() {
            let missing: Vec<&str> = formals[input.parameters.len()..]
                .iter()
                .map(|(name, _)| name.as_str())
                .collect();
            error.push_str(&format!(" Missing {}.", missing.join(", ")));
        } else {
            error.push_str(&format!(
                " Extra argument at index {}.",
                formals.len()
            ));
        }

        return Ok(MatchResult {
            failed: Some(error),
            map: Vec::new(),
            num_implicit: 0,
        });
    }

    let mut map: Vec<Option<ExprValue>> = vec![None; formals.len()];
    let mut taken = vec![false; input.parameters.len()];
    let mut num_implicit = 0usize;

    let fail = |message: String| MatchResult {
        failed: Some(message),
        map: Vec::new(),
        num_implicit: 0,
    };

    let try_move = |ctx: &mut Context,
                        map: &mut Vec<Option<ExprValue>>,
                        taken: &mut Vec<bool>,
                        num_implicit: &mut usize,
                        from: usize,
                        to: usize|
     -> BuildResult<Option<String>> {
        let (name, ty) = &formals[to];
        let value = &input.parameters[from];

        if map[to].is_some() {
            return Ok(Some(format!(
                "Parameter at index {to} with name {name} is passed twice."
            )));
        }

        if *ty != value.ty {
            let converted = ctx.with_no_ir(|ctx| make_convert(ctx, value, ty, false))?;

            if converted.is_none() {
                return Ok(Some(format!(
                    "Cannot convert parameter {from} of type {} to type {ty}.",
                    value.ty
                )));
            }

            *num_implicit += 1;
        }

        taken[from] = true;
        map[to] = Some(value.clone());

        Ok(None)
    };

    for (index, name) in &input.names {
        let Some(position) = formals.iter().position(|(formal, _)| formal == name) else {
            return Ok(fail(format!(
                "Expected parameter named {name}, but none found."
            )));
        };

        if let Some(problem) =
            try_move(ctx, &mut map, &mut taken, &mut num_implicit, *index, position)?
        {
            return Ok(fail(problem));
        }
    }

    let mut from = 0usize;
    let mut to = 0usize;

    while from < taken.len() && to < map.len() {
        while from < taken.len() && taken[from] {
            from += 1;
        }
        while to < map.len() && map[to].is_some() {
            to += 1;
        }

        if from >= taken.len() && to >= map.len() {
            break;
        }

        if let Some(problem) =
            try_move(ctx, &mut map, &mut taken, &mut num_implicit, from, to)?
        {
            return Ok(fail(problem));
        }
    }

    Ok(MatchResult {
        failed: None,
        map: map.into_iter().map(|slot| slot.expect("slot filled")).collect(),
        num_implicit,
    })
}

fn candidate_formals(
    ctx: &mut Context,
    candidate: NodeRef,
) -> BuildResult<Vec<(String, Typename)>> {
    match &ctx.ast(candidate).data {
        NodeData::Function(_) => {
            let signature = ctx.builder.function_signature(candidate)?;
            Ok(signature.parameters)
        }
        NodeData::TypeDecl(_) => {
            let info = ctx.builder.make_type(candidate)?;
            Ok(info
                .fields
                .iter()
                .map(|(_, name, ty, _)| (name.clone(), ty.clone()))
                .collect())
        }
        _ => Err(BuildError::new("Candidate is not callable.")),
    }
}

fn describe_candidate(ctx: &Context, candidate: NodeRef, problem: &str) -> String {
    let origin = ctx.builder.describe_origin(candidate);

    match &ctx.ast(candidate).data {
        NodeData::Function(f) => format!("Function {} {origin} {problem}", f.name),
        NodeData::TypeDecl(t) => format!("Type {} {origin} {problem}", t.name),
        _ => format!("Candidate {origin} {problem}"),
    }
}

fn is_extern(ctx: &Context, candidate: NodeRef) -> bool {
    matches!(
        &ctx.ast(candidate).data,
        NodeData::Function(f) if f.external
    )
}

/// One entry in the candidate pool: a declared callable, or a builtin
/// answering to the same name.
#[derive(Clone, Copy)]
enum Candidate {
    Declared(NodeRef),
    Builtin(Builtin),
}

/// Resolve and emit a call. Declared candidates and name-matching
/// builtins compete in the same pool; the fewest implicit conversions
/// wins.
pub fn call(
    ctx: &mut Context,
    options: &[NodeRef],
    builtins: &[Builtin],
    input: &MatchInput,
) -> BuildResult<CallWrapped> {
    let mut checks: Vec<(Candidate, Option<Vec<(String, Typename)>>, MatchResult)> =
        Vec::with_capacity(options.len() + builtins.len());

    for &candidate in options {
        let formals = candidate_formals(ctx, candidate)?;
        let result = match_parameters(ctx, &formals, input)?;
        checks.push((Candidate::Declared(candidate), Some(formals), result));
    }

    // A builtin binds its receiver exactly or not at all: applicability
    // is probed in analyze-only mode and costs zero conversions.
    for &builtin in builtins {
        let applies = ctx.with_no_ir(|ctx| call_builtin(ctx, builtin, input))?;
        let result = MatchResult {
            failed: applies
                .is_none()
                .then(|| "Receiver does not take this builtin.".to_string()),
            map: Vec::new(),
            num_implicit: 0,
        };
        checks.push((Candidate::Builtin(builtin), None, result));
    }

    let mut best = usize::MAX;
    let mut picks: Vec<usize> = Vec::new();

    for (index, (_, _, result)) in checks.iter().enumerate() {
        if result.failed.is_some() {
            continue;
        }

        if result.num_implicit == best {
            picks.push(index);
        } else if result.num_implicit < best {
            best = result.num_implicit;
            picks.clear();
            picks.push(index);
        }
    }

    if picks.is_empty() {
        let messages = checks
            .iter()
            .map(|(candidate, _, result)| {
                let problem = result.failed.as_deref().unwrap_or("did not match.");
                match candidate {
                    Candidate::Declared(nref) => describe_candidate(ctx, *nref, problem),
                    Candidate::Builtin(builtin) => {
                        format!("Builtin {} {problem}", builtin.name())
                    }
                }
            })
            .collect();

        return Ok(CallWrapped::Error(CallError {
            problem: "No functions match given function parameters.".into(),
            messages,
        }));
    }

    // External declarations may legally repeat; any other tie is
    // ambiguous.
    let all_extern = picks.iter().all(|&i| {
        matches!(checks[i].0, Candidate::Declared(nref) if is_extern(ctx, nref))
    });

    if picks.len() != 1 && !all_extern {
        return Ok(CallWrapped::Error(CallError {
            problem: format!(
                "Multiple functions match the most accurate conversion level, {best}."
            ),
            messages: Vec::new(),
        }));
    }

    let (candidate, formals, result) = &checks[picks[0]];

    tracing::debug!(
        implicit = result.num_implicit,
        candidates = checks.len(),
        "resolved call"
    );

    match candidate {
        Candidate::Builtin(builtin) => {
            let value = call_builtin(ctx, *builtin, input)?
                .ok_or_else(|| BuildError::new("Selected builtin stopped applying."))?;
            Ok(CallWrapped::Value(value))
        }
        Candidate::Declared(candidate) => {
            let candidate = *candidate;
            let formals = formals.as_ref().expect("declared candidates carry formals");

            match ctx.ast(candidate).kind() {
                kiln_ast::NodeKind::Function => {
                    emit_function_call(ctx, candidate, formals, &result.map)
                        .map(CallWrapped::Value)
                }
                kiln_ast::NodeKind::TypeDecl => {
                    emit_constructor(ctx, candidate, formals, &result.map)
                        .map(CallWrapped::Value)
                }
                _ => Err(BuildError::new("Candidate is not callable.")),
            }
        }
    }
}

fn emit_function_call(
    ctx: &mut Context,
    candidate: NodeRef,
    formals: &[(String, Typename)],
    map: &[ExprValue],
) -> BuildResult<ExprValue> {
    let info = ctx.builder.make_function(candidate)?;

    let mut converted = Vec::with_capacity(map.len());
    let mut args = Vec::with_capacity(map.len());

    for ((_, ty), value) in formals.iter().zip(map) {
        let value = make_convert(ctx, value, ty, false)?
            .ok_or_else(|| BuildError::new("Selected candidate stopped converting."))?;
        let value = expression::make_pass(ctx, &value)?;

        if let Some(repr) = ctx.get(&value)? {
            args.push(repr);
        }
        converted.push(value);
    }

    seed_size_cache(ctx, &info.signature.return_type, candidate, &converted)?;

    // The platform owns the actual invocation.
    let repr = if ctx.has_ir() {
        let platform =
            std::mem::replace(&mut ctx.builder.platform, crate::platform::identity());
        let mut cursor = ctx.ir.expect("checked above");
        let value = platform.invoke_function(
            &mut ctx.builder.module,
            &mut cursor,
            kiln_ir::Value::Func(info.func),
            args,
        );
        ctx.ir = Some(cursor);
        ctx.builder.platform = platform;
        Some(value)
    } else {
        None
    };

    Ok(ctx.new_value(
        ValueFlags::TEMPORARY,
        repr,
        (*info.signature.return_type).clone(),
    ))
}

/// When a callable's return type is sized by one of its parameters, the
/// call site learns the size: memoize the bound argument under the size
/// key so later `size` reads re-emit it.
fn seed_size_cache(
    ctx: &mut Context,
    return_type: &Typename,
    candidate: NodeRef,
    converted: &[ExprValue],
) -> BuildResult<()> {
    let parameters: Vec<NodeRef> = match &ctx.ast(candidate).data {
        NodeData::Function(f) => f
            .parameters
            .iter()
            .map(|&node| NodeRef {
                file: candidate.file,
                node,
            })
            .collect(),
        _ => return Ok(()),
    };

    let mut keys = Vec::new();
    collect_size_keys(return_type, &mut keys);

    for key in keys {
        if let SizeKey::Var(variable) = key {
            if let Some(index) = parameters.iter().position(|&p| p == variable) {
                if ctx.cache.depth() > 0 && ctx.cache.find_size(key).is_none() {
                    let bound = make_convert(ctx, &converted[index], &Typename::ulong(), false)?;
                    if let Some(bound) = bound {
                        ctx.cache.insert_size(key, bound);
                    }
                }
            }
        }
    }

    Ok(())
}

fn collect_size_keys(ty: &Typename, out: &mut Vec<SizeKey>) {
    match ty {
        Typename::Array(array) => {
            if let ArrayKind::UnboundedSized(key) = &array.kind {
                out.push(*key);
            }
            collect_size_keys(&array.value, out);
        }
        Typename::Reference(reference) => collect_size_keys(&reference.value, out),
        Typename::Optional(optional) => collect_size_keys(&optional.value, out),
        _ => {}
    }
}

/// Calling a type: stack allocation plus field-wise initialization.
fn emit_constructor(
    ctx: &mut Context,
    candidate: NodeRef,
    formals: &[(String, Typename)],
    map: &[ExprValue],
) -> BuildResult<ExprValue> {
    let info = ctx.builder.make_type(candidate)?;
    let ty = Typename::Named(crate::typename::NamedTypename {
        name: info.name.clone(),
        node: candidate,
    });

    let storage = if ctx.has_ir() {
        let ir_ty = kiln_ir::Ty::Struct(info.struct_id);
        ctx.alloca_entry(ir_ty, &info.name)
    } else {
        None
    };

    for (index, ((name, field_ty), value)) in formals.iter().zip(map).enumerate() {
        let value = make_convert(ctx, value, field_ty, false)?
            .ok_or_else(|| BuildError::new("Selected candidate stopped converting."))?;
        let value = expression::make_pass(ctx, &value)?;

        if let (Some(storage), Some(loaded)) = (storage, ctx.get(&value)?) {
            let field_ptr = ctx
                .build_struct_gep(storage, index as u32, name)
                .expect("cursor installed");
            ctx.build_store(loaded, field_ptr);
        }
    }

    Ok(ctx.new_value(
        ValueFlags::REFERENCE | ValueFlags::TEMPORARY,
        storage,
        ty,
    ))
}

// ----------------------------------------------------------------------
// Array builtins
// ----------------------------------------------------------------------

fn builtin_receiver<'a>(input: &'a MatchInput) -> Option<&'a ExprValue> {
    if input.parameters.len() != 1 {
        return None;
    }

    match input.names.first() {
        None => Some(&input.parameters[0]),
        Some((0, name)) if name == "array" => Some(&input.parameters[0]),
        Some(_) => None,
    }
}

fn call_builtin(
    ctx: &mut Context,
    builtin: Builtin,
    input: &MatchInput,
) -> BuildResult<Option<ExprValue>> {
    let Some(receiver) = builtin_receiver(input).cloned() else {
        return Ok(None);
    };

    match builtin {
        Builtin::ArraySize => builtin_array_size(ctx, &receiver),
        Builtin::ArrayCapacity => builtin_triple_slot(ctx, &receiver, 1, "capacity"),
        Builtin::ArrayData => builtin_array_data(ctx, &receiver),
    }
}

fn builtin_array_size(
    ctx: &mut Context,
    receiver: &ExprValue,
) -> BuildResult<Option<ExprValue>> {
    let real_ty = expression::find_real(&receiver.ty).clone();
    let Some(array) = real_ty.as_array() else {
        return Ok(None);
    };

    match &array.kind {
        ArrayKind::UnboundedSized(key) => {
            let cached = ctx.cache.find_size(*key).cloned().ok_or_else(|| {
                BuildError::new(format!(
                    "Attempting to access size of {} but size has not yet been calculated.",
                    receiver.ty
                ))
            })?;
            Ok(Some(cached))
        }
        ArrayKind::FixedSize(n) => {
            let value =
                crate::nouns::make_number(ctx, kiln_ast::NumberValue::Unsigned(*n))?;
            Ok(Some(value))
        }
        // Unknown extent; leave it to uniform call resolution.
        ArrayKind::Unbounded => Ok(None),
        ArrayKind::VariableSize => builtin_triple_slot(ctx, receiver, 0, "size"),
        ArrayKind::Iterable => Err(BuildError::new(
            "Iterable arrays do not expose a size.",
        )),
    }
}

/// A reference into the growable triple: slot 0 is size, slot 1 capacity.
fn builtin_triple_slot(
    ctx: &mut Context,
    receiver: &ExprValue,
    slot: u32,
    name: &str,
) -> BuildResult<Option<ExprValue>> {
    let real = expression::make_real(ctx, receiver)?;
    let Some(array) = real.ty.as_array() else {
        return Ok(None);
    };

    if array.kind != ArrayKind::VariableSize {
        return Ok(None);
    }

    let repr = match ctx.ref_value(&real)? {
        Some(ptr) => ctx.build_struct_gep(ptr, slot, name),
        None => None,
    };

    let mut flags = ValueFlags::REFERENCE;
    if real.is_mutable() {
        flags |= ValueFlags::MUTABLE;
    }

    Ok(Some(ctx.new_value(flags, repr, Typename::ulong())))
}

fn builtin_array_data(
    ctx: &mut Context,
    receiver: &ExprValue,
) -> BuildResult<Option<ExprValue>> {
    let real = expression::make_real(ctx, receiver)?;
    let Some(array) = real.ty.as_array() else {
        return Ok(None);
    };

    if array.kind != ArrayKind::VariableSize {
        return Ok(None);
    }

    let elem = (*array.value).clone();
    let mutable = real.is_mutable();

    let repr = match ctx.ref_value(&real)? {
        Some(ptr) => ctx.build_struct_gep(ptr, 2, "data"),
        None => None,
    };

    let mut flags = ValueFlags::REFERENCE;
    if mutable {
        flags |= ValueFlags::MUTABLE;
    }

    Ok(Some(ctx.new_value(
        flags,
        repr,
        Typename::reference(elem, mutable, crate::typename::ReferenceKind::Regular),
    )))
}

/// Collapse a call outcome, blaming `node` for errors.
pub fn unwrap(wrapped: CallWrapped, node: NodeRef) -> BuildResult<ExprValue> {
    match wrapped {
        CallWrapped::Value(value) => Ok(value),
        CallWrapped::Error(error) => {
            let mut message = error.messages.join("\n");
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(&error.problem);

            Err(BuildError::at(node.file, node.node, message))
        }
    }
}
