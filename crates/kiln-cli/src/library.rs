//! Library documents: one YAML file describing an external C library.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LibraryDocument {
    pub language: String,
    pub includes: Vec<PathBuf>,
    pub libraries: Vec<PathBuf>,
    pub dynamic_libraries: Vec<PathBuf>,
    /// Passed verbatim to the header translator.
    pub arguments: Vec<String>,
}

impl LibraryDocument {
    /// Parse a document, resolving relative paths against `root`.
    pub fn parse(text: &str, root: &Path) -> anyhow::Result<Self> {
        let mut doc: LibraryDocument =
            serde_yaml::from_str(text).context("Cannot parse library document.")?;

        if doc.language != "c" {
            bail!("Library document language must be c, got {}.", doc.language);
        }

        let absolutize = |paths: &mut Vec<PathBuf>| {
            for path in paths {
                if path.is_relative() {
                    *path = root.join(&path);
                }
            }
        };

        absolutize(&mut doc.includes);
        absolutize(&mut doc.libraries);
        absolutize(&mut doc.dynamic_libraries);

        Ok(doc)
    }

    /// Locate `header` under the document's include paths.
    pub fn match_header(&self, header: &str) -> Option<PathBuf> {
        self.includes
            .iter()
            .map(|include| include.join(header))
            .find(|candidate| candidate.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_absolutizes() {
        let doc = LibraryDocument::parse(
            "language: c\nincludes: [include]\nlibraries: [lib/libz.a]\narguments: [\"-D_GNU_SOURCE\"]\n",
            Path::new("/pkg"),
        )
        .expect("parses");

        assert_eq!(doc.includes, vec![PathBuf::from("/pkg/include")]);
        assert_eq!(doc.libraries, vec![PathBuf::from("/pkg/lib/libz.a")]);
        assert_eq!(doc.arguments, vec!["-D_GNU_SOURCE".to_string()]);
    }

    #[test]
    fn rejects_non_c_languages() {
        let error = LibraryDocument::parse("language: fortran\n", Path::new("/"));
        assert!(error.is_err());
    }

    #[test]
    fn match_header_walks_includes() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("include")).expect("mkdir");
        std::fs::write(dir.path().join("include/z.h"), "").expect("writes");

        let doc = LibraryDocument::parse("language: c\nincludes: [include]\n", dir.path())
            .expect("parses");

        assert!(doc.match_header("z.h").is_some());
        assert!(doc.match_header("missing.h").is_none());
    }
}
