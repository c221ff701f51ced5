//! Node arena: flat storage, stable indices, parent links.

use kiln_common::Span;
use smallvec::SmallVec;

use crate::nodes::{NodeData, NodeKind};

/// A stable index into an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A single AST node: parent link, source span, payload.
#[derive(Debug)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub span: Span,
    pub data: NodeData,
}

impl Node {
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }
}

/// Flat node storage for one source file.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Allocate a node. The id is stable for the arena's lifetime.
    pub fn alloc(&mut self, parent: Option<NodeId>, span: Span, data: NodeData) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("arena overflow"));
        self.nodes.push(Node { parent, span, data });
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    #[inline]
    pub fn span(&self, id: NodeId) -> Span {
        self.get(id).span
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.get(id).kind()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The declaration-bearing children of a node, in source order.
    ///
    /// This is the set the lexical name search scans at each ancestor:
    /// root declarations, statements of a code scope (variable statements
    /// among them), function parameters, and aggregate fields.
    pub fn scope_children(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
        let mut out = SmallVec::new();

        match &self.get(id).data {
            NodeData::Root(root) => out.extend_from_slice(&root.children),
            NodeData::Code(code) => out.extend_from_slice(&code.children),
            NodeData::Function(function) => out.extend_from_slice(&function.parameters),
            NodeData::TypeDecl(decl) => out.extend_from_slice(&decl.fields),
            _ => {}
        }

        out
    }

    /// Walk parents from `origin`, scanning each ancestor's scope children,
    /// collecting every node `check` accepts. Closest scope first.
    pub fn search_scope(&self, origin: NodeId, check: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut cursor = self.parent(origin);

        while let Some(parent) = cursor {
            for child in self.scope_children(parent) {
                if check(self.get(child)) {
                    result.push(child);
                }
            }

            cursor = self.parent(parent);
        }

        result
    }

    /// Walk parents from `origin` until one satisfies `check`.
    pub fn search_parents(&self, origin: NodeId, check: impl Fn(&Node) -> bool) -> Option<NodeId> {
        let mut cursor = self.parent(origin);

        while let Some(parent) = cursor {
            if check(self.get(parent)) {
                return Some(parent);
            }

            cursor = self.parent(parent);
        }

        None
    }

    /// Iterate all node ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Code, Root, Variable};

    fn variable(name: &str) -> NodeData {
        NodeData::Variable(Variable {
            name: name.into(),
            mutable: false,
            type_spec: None,
            value: None,
            external: false,
        })
    }

    #[test]
    fn search_prefers_closest_scope() {
        let mut arena = Arena::new();
        let root = arena.alloc(None, Span::dummy(), NodeData::Root(Root { children: vec![] }));
        let outer = arena.alloc(Some(root), Span::dummy(), variable("x"));
        let code = arena.alloc(
            Some(root),
            Span::dummy(),
            NodeData::Code(Code { children: vec![] }),
        );
        let inner = arena.alloc(Some(code), Span::dummy(), variable("x"));
        let origin = arena.alloc(Some(code), Span::dummy(), variable("probe"));

        match &mut arena.get_mut(root).data {
            NodeData::Root(r) => r.children = vec![outer, code],
            _ => unreachable!(),
        }
        match &mut arena.get_mut(code).data {
            NodeData::Code(c) => c.children = vec![inner, origin],
            _ => unreachable!(),
        }

        let found = arena.search_scope(origin, |node| {
            matches!(&node.data, NodeData::Variable(v) if v.name == "x")
        });

        assert_eq!(found, vec![inner, outer]);
    }
}
