//! Lock files: installed packages and platform build parameters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Maps a package URL to the configuration fragments its installation
/// produced. Keyed off the downloaded config, so a reinstall is a no-op.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLockFile {
    #[serde(default)]
    pub packages_installed: BTreeMap<String, Vec<String>>,
}

impl PackageLockFile {
    pub fn path_in(parent: &Path) -> PathBuf {
        parent.join("package-lock.yaml")
    }

    pub fn load(parent: &Path) -> anyhow::Result<Self> {
        let path = Self::path_in(parent);

        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read lock file {}.", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Cannot parse lock file {}.", path.display()))
    }

    pub fn save(&self, parent: &Path) -> anyhow::Result<()> {
        let path = Self::path_in(parent);
        let text = serde_yaml::to_string(self).context("Cannot serialize lock file.")?;
        std::fs::write(&path, text)
            .with_context(|| format!("Cannot write lock file {}.", path.display()))?;
        Ok(())
    }
}

/// Opaque build-to-build platform parameters (sysroots and the like).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLockFile {
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl BuildLockFile {
    pub fn path_in(parent: &Path) -> PathBuf {
        parent.join("build-lock.yaml")
    }

    pub fn load(parent: &Path) -> anyhow::Result<Self> {
        let path = Self::path_in(parent);

        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read build lock {}.", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Cannot parse build lock {}.", path.display()))
    }

    pub fn save(&self, parent: &Path) -> anyhow::Result<()> {
        let path = Self::path_in(parent);
        let text = serde_yaml::to_string(self).context("Cannot serialize build lock.")?;
        std::fs::write(&path, text)
            .with_context(|| format!("Cannot write build lock {}.", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_lock_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut lock = PackageLockFile::default();
        lock.packages_installed.insert(
            "https://example.com/pkg.git".into(),
            vec!["deps/pkg/pkg.yaml".into()],
        );
        lock.save(dir.path()).expect("saves");

        let back = PackageLockFile::load(dir.path()).expect("loads");
        assert_eq!(lock, back);
    }

    #[test]
    fn missing_lock_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lock = PackageLockFile::load(dir.path()).expect("loads");
        assert!(lock.packages_installed.is_empty());
    }

    #[test]
    fn build_lock_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut lock = BuildLockFile::default();
        lock.parameters
            .insert("macos-sysroot".into(), "/opt/sysroot".into());
        lock.save(dir.path()).expect("saves");

        let back = BuildLockFile::load(dir.path()).expect("loads");
        assert_eq!(back.parameters["macos-sysroot"], "/opt/sysroot");
    }
}
