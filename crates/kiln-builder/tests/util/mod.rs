//! Shared helpers: compile kiln source text in-process and poke at the
//! produced module.
#![allow(dead_code)]

use kiln_builder::{Builder, BuilderOptions, SourceManager};
use kiln_ir::{FuncId, InstKind, Module, Terminator, Value};

pub struct Compiled {
    pub module: Module,
    pub insights: Vec<String>,
}

pub fn try_compile(text: &str) -> Result<Compiled, String> {
    let parsed = kiln_parser::parse(text).map_err(|e| e.message)?;

    let mut sources = SourceManager::new();
    let file = sources.register("test.kiln", "", text, parsed.arena, parsed.root);

    let mut builder =
        Builder::new(&sources, file, BuilderOptions::default()).map_err(|e| e.message)?;
    builder.build().map_err(|e| e.message)?;

    let module = builder.module;
    let insights = builder.insights;

    Ok(Compiled { module, insights })
}

pub fn compile(text: &str) -> Compiled {
    match try_compile(text) {
        Ok(compiled) => compiled,
        Err(message) => panic!("expected program to compile, got: {message}"),
    }
}

pub fn compile_error(text: &str) -> String {
    match try_compile(text) {
        Ok(_) => panic!("expected program to fail verification"),
        Err(message) => message,
    }
}

pub fn function(module: &Module, name: &str) -> FuncId {
    module
        .find_function(name)
        .unwrap_or_else(|| panic!("function {name} not found"))
}

/// Callee names of every call in the function, blocks in creation order.
pub fn calls_in(module: &Module, func: FuncId) -> Vec<String> {
    let data = module.function(func);
    let mut out = Vec::new();

    for block in &data.blocks {
        for &inst in &block.insts {
            if let InstKind::Call { callee, .. } = &data.insts[inst.0 as usize].kind {
                let name = match callee {
                    Value::Func(id) => module.function(*id).name.clone(),
                    other => format!("{other:?}"),
                };
                out.push(name);
            }
        }
    }

    out
}

pub fn count_calls_to(module: &Module, func: FuncId, name: &str) -> usize {
    calls_in(module, func).iter().filter(|n| n == &name).count()
}

pub fn count_switches(module: &Module, func: FuncId) -> usize {
    module
        .function(func)
        .blocks
        .iter()
        .filter(|block| matches!(block.terminator, Some(Terminator::Switch { .. })))
        .count()
}

pub fn has_cond_br(module: &Module, func: FuncId) -> bool {
    module
        .function(func)
        .blocks
        .iter()
        .any(|block| matches!(block.terminator, Some(Terminator::CondBr { .. })))
}
