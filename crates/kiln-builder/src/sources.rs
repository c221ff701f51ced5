//! Source manager: owns every parsed file and resolves imports.
//!
//! Front ends register parsed arenas here; the symbol builder borrows nodes
//! by [`NodeRef`] for the whole compilation. Import resolution is by path,
//! relative to the importing file, and transitive dependency sets are
//! computed on demand.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use kiln_ast::{Arena, Node, NodeData, NodeId};
use rustc_hash::FxHashMap;

use crate::error::{BuildError, BuildResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A node in a specific file: the compiler-wide node identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub file: FileId,
    pub node: NodeId,
}

/// One registered source file.
pub struct SourceFile {
    pub path: PathBuf,
    /// Front-end kind: empty for kiln sources, `"c"` for header imports.
    pub kind: String,
    pub text: String,
    pub arena: Arena,
    pub root: NodeId,
    /// `(path, kind)` pairs gathered from the file's import nodes.
    pub imports: Vec<(String, String)>,
}

/// The result a front end hands back for one file.
pub struct ParsedFile {
    pub arena: Arena,
    pub root: NodeId,
}

/// A pluggable front end: text in, arena out.
pub type Frontend<'a> = &'a dyn Fn(&Path, &str) -> BuildResult<ParsedFile>;

#[derive(Default)]
pub struct SourceManager {
    files: Vec<SourceFile>,
    by_path: FxHashMap<PathBuf, FileId>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-parsed file (tests, generated declarations).
    pub fn register(
        &mut self,
        path: impl Into<PathBuf>,
        kind: impl Into<String>,
        text: impl Into<String>,
        arena: Arena,
        root: NodeId,
    ) -> FileId {
        let path = path.into();
        let imports = collect_imports(&arena, root);

        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            path: path.clone(),
            kind: kind.into(),
            text: text.into(),
            arena,
            root,
            imports,
        });
        self.by_path.insert(path, id);
        id
    }

    /// Load a file from disk through the given front end, reusing the
    /// registration if the path was seen before.
    pub fn load(&mut self, path: &Path, frontend: Frontend) -> BuildResult<FileId> {
        let canonical = path.to_path_buf();

        if let Some(&id) = self.by_path.get(&canonical) {
            return Ok(id);
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| BuildError::new(format!("Cannot find file under path {}: {e}.", path.display())))?;

        let parsed = frontend(path, &text)?;

        tracing::debug!(path = %path.display(), nodes = parsed.arena.len(), "loaded source file");

        Ok(self.register(canonical, "", text, parsed.arena, parsed.root))
    }

    /// Resolve every import of `file` (and theirs, transitively), loading
    /// new files through the front end. Returns the dependency set in
    /// discovery order, excluding `file` itself.
    pub fn resolve(&mut self, file: FileId, frontend: Frontend) -> BuildResult<Vec<FileId>> {
        let mut visited: IndexSet<FileId> = IndexSet::new();
        let mut queue = vec![file];

        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }

            let parent = self.file(current).path.parent().map(Path::to_path_buf);
            let imports = self.file(current).imports.clone();

            for (path, _kind) in imports {
                let mut full = PathBuf::from(&path);
                if full.is_relative() {
                    if let Some(base) = &parent {
                        full = base.join(full);
                    }
                }

                let dep = match self.by_path.get(&full) {
                    Some(&id) => id,
                    None => self.load(&full, frontend)?,
                };
                queue.push(dep);
            }
        }

        visited.shift_remove(&file);
        Ok(visited.into_iter().collect())
    }

    /// Dependency set when everything is already registered; missing
    /// imports are an error.
    pub fn resolve_registered(&self, file: FileId) -> BuildResult<Vec<FileId>> {
        let mut visited: IndexSet<FileId> = IndexSet::new();
        let mut queue = vec![file];

        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }

            let parent = self.file(current).path.parent().map(Path::to_path_buf);

            for (path, _kind) in &self.file(current).imports {
                let mut full = PathBuf::from(path);
                if full.is_relative() {
                    if let Some(base) = &parent {
                        full = base.join(full);
                    }
                }

                match self.by_path.get(&full) {
                    Some(&id) => queue.push(id),
                    None => {
                        return Err(BuildError::new(format!(
                            "Cannot find file under path {}.",
                            full.display()
                        )));
                    }
                }
            }
        }

        visited.shift_remove(&file);
        Ok(visited.into_iter().collect())
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn arena(&self, id: FileId) -> &Arena {
        &self.files[id.0 as usize].arena
    }

    pub fn node(&self, nref: NodeRef) -> &Node {
        self.arena(nref.file).get(nref.node)
    }

    pub fn root(&self, id: FileId) -> NodeRef {
        NodeRef {
            file: id,
            node: self.files[id.0 as usize].root,
        }
    }

    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        (0..self.files.len()).map(|i| FileId(i as u32))
    }
}

fn collect_imports(arena: &Arena, root: NodeId) -> Vec<(String, String)> {
    let mut imports = Vec::new();

    if let NodeData::Root(data) = &arena.get(root).data {
        for &child in &data.children {
            if let NodeData::Import(import) = &arena.get(child).data {
                imports.push((import.path.clone(), import.kind.clone()));
            }
        }
    }

    imports
}
