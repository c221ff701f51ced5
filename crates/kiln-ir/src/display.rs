//! Text rendering of modules, used by tests and `--print-ir`.

use std::fmt::Write as _;

use crate::inst::{InstKind, Terminator};
use crate::module::{FuncId, FunctionData, Module};
use crate::types::Ty;
use crate::value::{ConstData, Value};

pub fn render_ty(module: &Module, ty: &Ty) -> String {
    match ty {
        Ty::Void => "void".into(),
        Ty::Int(bits) => format!("i{bits}"),
        Ty::Float => "float".into(),
        Ty::Double => "double".into(),
        Ty::Ptr(inner) => format!("{}*", render_ty(module, inner)),
        Ty::Struct(id) => format!("%{}", module.struct_def(*id).name),
        Ty::Anon(fields) => {
            let inner: Vec<_> = fields.iter().map(|f| render_ty(module, f)).collect();
            format!("{{ {} }}", inner.join(", "))
        }
        Ty::Array(inner, len) => format!("[{} x {}]", len, render_ty(module, inner)),
        Ty::Func(f) => {
            let params: Vec<_> = f.params.iter().map(|p| render_ty(module, p)).collect();
            format!("{} ({})", render_ty(module, &f.ret), params.join(", "))
        }
    }
}

pub fn render_value(module: &Module, value: Value) -> String {
    match value {
        Value::Const(id) => match module.const_data(id) {
            ConstData::Int { value, .. } => format!("{value}"),
            ConstData::Float { bits, .. } => format!("{}", f64::from_bits(*bits)),
            ConstData::Null(_) => "null".into(),
            ConstData::Zero(_) => "zeroinitializer".into(),
            ConstData::Str(text) => format!("{text:?}"),
        },
        Value::Inst(id) => format!("%{}", id.0),
        Value::Arg(index) => format!("%arg{index}"),
        Value::Global(id) => format!("@{}", module.globals[id.0 as usize].name),
        Value::Func(id) => format!("@{}", module.function(id).name),
    }
}

fn render_inst(module: &Module, function: &FunctionData, id: u32) -> String {
    let inst = &function.insts[id as usize];
    let v = |value: Value| render_value(module, value);

    let body = match &inst.kind {
        InstKind::Alloca { ty, name } => format!("alloca {} ; {name}", render_ty(module, ty)),
        InstKind::Load { ty, ptr } => format!("load {}, {}", render_ty(module, ty), v(*ptr)),
        InstKind::Store { value, ptr } => format!("store {}, {}", v(*value), v(*ptr)),
        InstKind::Gep { ptr, indices, name } => {
            let list: Vec<_> = indices.iter().map(|i| v(*i)).collect();
            format!("gep {}, [{}] ; {name}", v(*ptr), list.join(", "))
        }
        InstKind::StructGep { ptr, index, name } => {
            format!("struct-gep {}, {index} ; {name}", v(*ptr))
        }
        InstKind::Call { callee, args } => {
            let list: Vec<_> = args.iter().map(|a| v(*a)).collect();
            format!("call {}({})", v(*callee), list.join(", "))
        }
        InstKind::Binary { op, a, b } => format!("{op:?} {}, {}", v(*a), v(*b)).to_lowercase(),
        InstKind::Cmp { op, a, b } => format!("cmp {op:?} {}, {}", v(*a), v(*b)).to_lowercase(),
        InstKind::Cast { op, value, ty } => {
            format!("{op:?} {} to {}", v(*value), render_ty(module, ty)).to_lowercase()
        }
        InstKind::Not { value } => format!("not {}", v(*value)),
        InstKind::Neg { value } => format!("neg {}", v(*value)),
        InstKind::FNeg { value } => format!("fneg {}", v(*value)),
        InstKind::IsNotNull { value } => format!("is-not-null {}", v(*value)),
    };

    format!("  %{id} = {body}")
}

pub fn render_function(module: &Module, func: FuncId) -> String {
    let function = module.function(func);
    let mut out = String::new();

    let params: Vec<_> = function
        .ty
        .params
        .iter()
        .map(|p| render_ty(module, p))
        .collect();

    if function.external {
        let _ = writeln!(
            out,
            "declare {} @{}({})",
            render_ty(module, &function.ty.ret),
            function.name,
            params.join(", ")
        );
        return out;
    }

    let _ = writeln!(
        out,
        "define {} @{}({}) {{",
        render_ty(module, &function.ty.ret),
        function.name,
        params.join(", ")
    );

    for (index, block) in function.blocks.iter().enumerate() {
        let _ = writeln!(out, "b{index}: ; {}", block.name);

        for inst in &block.insts {
            let _ = writeln!(out, "{}", render_inst(module, function, inst.0));
        }

        match &block.terminator {
            None => {
                let _ = writeln!(out, "  <no terminator>");
            }
            Some(Terminator::Br(dest)) => {
                let _ = writeln!(out, "  br b{}", dest.0);
            }
            Some(Terminator::CondBr {
                cond,
                on_true,
                on_false,
            }) => {
                let _ = writeln!(
                    out,
                    "  cond-br {}, b{}, b{}",
                    render_value(module, *cond),
                    on_true.0,
                    on_false.0
                );
            }
            Some(Terminator::Switch {
                value,
                default,
                cases,
            }) => {
                let rendered: Vec<_> = cases
                    .iter()
                    .map(|(case, dest)| format!("{case} -> b{}", dest.0))
                    .collect();
                let _ = writeln!(
                    out,
                    "  switch {}, default b{} [{}]",
                    render_value(module, *value),
                    default.0,
                    rendered.join(", ")
                );
            }
            Some(Terminator::Ret(value)) => {
                let rendered = value
                    .map(|value| render_value(module, value))
                    .unwrap_or_default();
                let _ = writeln!(out, "  ret {rendered}");
            }
        }
    }

    let _ = writeln!(out, "}}");
    out
}

pub fn render_module(module: &Module) -> String {
    let mut out = String::new();

    for global in &module.globals {
        let kind = if global.constant { "constant" } else { "global" };
        let _ = writeln!(
            out,
            "@{} = {kind} {}",
            global.name,
            render_ty(module, &global.ty)
        );
    }

    for index in 0..module.functions.len() {
        out.push_str(&render_function(module, FuncId(index as u32)));
        out.push('\n');
    }

    out
}
