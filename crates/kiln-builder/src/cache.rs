//! Per-scope caches: variable bindings and memoized array sizes.
//!
//! Frames chain lexically; lookups walk inner to outer. The size cache is
//! what keeps `[T:n]` from re-evaluating `n`: the first evaluation stores
//! the converted value under the size's identity key.

use rustc_hash::FxHashMap;

use crate::sources::NodeRef;
use crate::typename::{SizeKey, Typename};
use crate::value::ExprValue;

/// A local variable's binding: resolved type, storage address, mutability.
#[derive(Clone, Debug)]
pub struct VariableBinding {
    pub node: NodeRef,
    pub ty: Typename,
    pub storage: Option<kiln_ir::Value>,
    pub mutable: bool,
}

#[derive(Debug, Default)]
struct CacheFrame {
    variables: FxHashMap<NodeRef, VariableBinding>,
    sizes: FxHashMap<SizeKey, ExprValue>,
}

/// The scope cache stack for one function lowering.
#[derive(Debug, Default)]
pub struct ScopeCache {
    frames: Vec<CacheFrame>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self) {
        self.frames.push(CacheFrame::default());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn insert_variable(&mut self, binding: VariableBinding) {
        let frame = self.frames.last_mut().expect("no open scope frame");
        frame.variables.insert(binding.node, binding);
    }

    pub fn find_variable(&self, node: NodeRef) -> Option<&VariableBinding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.variables.get(&node))
    }

    pub fn insert_size(&mut self, key: SizeKey, value: ExprValue) {
        let frame = self.frames.last_mut().expect("no open scope frame");
        frame.sizes.insert(key, value);
    }

    pub fn find_size(&self, key: SizeKey) -> Option<&ExprValue> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.sizes.get(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FileId;
    use kiln_ast::NodeId;

    fn nref(n: u32) -> NodeRef {
        NodeRef {
            file: FileId(0),
            node: NodeId(n),
        }
    }

    fn binding(n: u32) -> VariableBinding {
        VariableBinding {
            node: nref(n),
            ty: Typename::ulong(),
            storage: None,
            mutable: false,
        }
    }

    #[test]
    fn lookup_walks_outward() {
        let mut cache = ScopeCache::new();
        cache.push();
        cache.insert_variable(binding(1));
        cache.push();
        cache.insert_variable(binding(2));

        assert!(cache.find_variable(nref(1)).is_some());
        assert!(cache.find_variable(nref(2)).is_some());

        cache.pop();
        assert!(cache.find_variable(nref(2)).is_none());
        assert!(cache.find_variable(nref(1)).is_some());
    }
}
