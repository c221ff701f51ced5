//! Verify errors.
//!
//! Every user-visible failure out of the semantic layer is a message plus
//! the AST node it blames. Engine primitives produce node-less errors
//! freely; [`blame`] pins the nearest enclosing node onto anything that
//! bubbles out without one.

use kiln_ast::NodeId;

use crate::sources::FileId;

/// A semantic error, optionally attached to the node that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    pub node: Option<(FileId, NodeId)>,
    pub message: String,
}

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            node: None,
            message: message.into(),
        }
    }

    pub fn at(file: FileId, node: NodeId, message: impl Into<String>) -> Self {
        Self {
            node: Some((file, node)),
            message: message.into(),
        }
    }

    /// Attach a node unless one is already recorded. The innermost blame
    /// wins, since it is closest to the actual fault.
    pub fn attach(mut self, file: FileId, node: NodeId) -> Self {
        if self.node.is_none() {
            self.node = Some((file, node));
        }
        self
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BuildError {}

pub type BuildResult<T> = Result<T, BuildError>;

/// Run `f`, attaching `node` to any error that escapes without a blame
/// target of its own.
pub fn blame<T>(
    file: FileId,
    node: NodeId,
    f: impl FnOnce() -> BuildResult<T>,
) -> BuildResult<T> {
    f().map_err(|error| error.attach(file, node))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blame_attaches_only_once() {
        let inner = BuildError::at(FileId(0), NodeId(7), "inner");
        let attached = inner.attach(FileId(0), NodeId(9));
        assert_eq!(attached.node, Some((FileId(0), NodeId(7))));

        let bare = BuildError::new("bare").attach(FileId(0), NodeId(9));
        assert_eq!(bare.node, Some((FileId(0), NodeId(9))));
    }
}
