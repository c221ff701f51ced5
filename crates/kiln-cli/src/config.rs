//! The project file (`project.yaml`).

use std::path::Path;

use anyhow::Context;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Library,
    Executable,
    Interface,
}

/// Compiler-facing options nested inside a target.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompilerOptions {
    pub triple: String,
    pub print_ir: bool,
}

/// Options a target contributes to the build: header search paths,
/// libraries to link, raw linker flags, nested compiler options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TargetOptions {
    pub includes: Vec<String>,
    pub libraries: Vec<String>,
    pub linker_options: Vec<String>,
    pub options: CompilerOptions,
}

/// One `import:` entry: a local file, a package URL, or a cmake project.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ImportEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmake: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<TargetOptions>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProjectConfig {
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub name: String,
    pub files: IndexSet<String>,
    pub output_directory: String,
    pub packages_directory: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub import: Vec<ImportEntry>,
    #[serde(flatten)]
    pub options: TargetOptions,
}

impl ProjectConfig {
    pub const DEFAULT_PATH: &'static str = "project.yaml";

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read project file {}.", path.display()))?;

        let mut config: ProjectConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("Cannot parse project file {}.", path.display()))?;

        if config.output_directory.is_empty() {
            config.output_directory = "build".into();
        }
        if config.packages_directory.is_empty() {
            config.packages_directory = "build".into();
        }

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_yaml::to_string(self).context("Cannot serialize project file.")?;
        std::fs::write(path, text)
            .with_context(|| format!("Cannot write project file {}.", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_project_file() {
        let text = "\
type: executable
name: demo
files:
  - src/main.kiln
  - src/util.kiln
output-directory: out
packages-directory: deps
import:
  - url: https://example.com/pkg.git
    targets: [core]
    build-arguments: [\"-O2\"]
libraries:
  - m
linker-options:
  - \"-dead_strip\"
options:
  triple: x86_64-unknown-linux-gnu
  print-ir: true
";

        let config: ProjectConfig = serde_yaml::from_str(text).expect("parses");

        assert_eq!(config.target_type, TargetType::Executable);
        assert_eq!(config.name, "demo");
        assert_eq!(config.files.len(), 2);
        assert_eq!(config.output_directory, "out");
        assert_eq!(config.import.len(), 1);
        assert_eq!(
            config.import[0].url.as_deref(),
            Some("https://example.com/pkg.git")
        );
        assert_eq!(config.options.libraries, vec!["m".to_string()]);
        assert!(config.options.options.print_ir);
        assert_eq!(config.options.options.triple, "x86_64-unknown-linux-gnu");
    }

    #[test]
    fn round_trips_through_yaml() {
        let mut config = ProjectConfig {
            target_type: TargetType::Library,
            name: "thing".into(),
            ..Default::default()
        };
        config.files.insert("a.kiln".into());
        config.output_directory = "build".into();
        config.packages_directory = "build".into();

        let text = serde_yaml::to_string(&config).expect("serializes");
        let back: ProjectConfig = serde_yaml::from_str(&text).expect("parses");
        assert_eq!(config, back);
    }

    #[test]
    fn defaults_fill_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("project.yaml");
        std::fs::write(&path, "name: tiny\nfiles: [main.kiln]\n").expect("writes");

        let config = ProjectConfig::load(&path).expect("loads");
        assert_eq!(config.output_directory, "build");
        assert_eq!(config.packages_directory, "build");
        assert_eq!(config.target_type, TargetType::Library);
    }
}
