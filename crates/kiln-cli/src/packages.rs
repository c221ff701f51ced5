//! Package installation.
//!
//! Packages arrive as git URLs or local files. Installation clones into
//! the packages directory, discovers the package's configuration
//! fragments, and records them in the lock file; a URL already present in
//! the lock is served from it without touching the network.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};

use crate::lock::PackageLockFile;
use crate::log;

pub struct PackageManager {
    pub root: PathBuf,
    pub packages_directory: PathBuf,
    pub lock: PackageLockFile,
}

impl PackageManager {
    pub fn new(root: impl Into<PathBuf>, packages_directory: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        let packages_directory = packages_directory.into();

        std::fs::create_dir_all(&packages_directory).with_context(|| {
            format!(
                "Cannot create packages directory {}.",
                packages_directory.display()
            )
        })?;

        let lock = PackageLockFile::load(&root)?;

        Ok(Self {
            root,
            packages_directory,
            lock,
        })
    }

    fn package_name(url: &str) -> String {
        url.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .trim_end_matches(".git")
            .to_string()
    }

    /// Install a package by URL, reusing the lock when possible. Returns
    /// the configuration fragments the package contributes.
    pub fn install(&mut self, url: &str, arguments: &[String]) -> anyhow::Result<Vec<String>> {
        if let Some(fragments) = self.lock.packages_installed.get(url) {
            log::step("packages", &format!("{url} already installed"));
            return Ok(fragments.clone());
        }

        let fragments = self.download(url, arguments)?;

        self.lock
            .packages_installed
            .insert(url.to_string(), fragments.clone());
        self.lock.save(&self.root)?;

        Ok(fragments)
    }

    /// Fetch and prepare a package unconditionally.
    pub fn download(&mut self, url: &str, arguments: &[String]) -> anyhow::Result<Vec<String>> {
        let name = Self::package_name(url);
        let destination = self.packages_directory.join(&name);

        if destination.exists() {
            log::step("packages", &format!("reusing checkout for {name}"));
        } else if url.starts_with("http://") || url.starts_with("https://") || url.ends_with(".git")
        {
            let args: Vec<String> = ["clone", "--depth", "1", url]
                .into_iter()
                .map(String::from)
                .chain(std::iter::once(destination.display().to_string()))
                .collect();

            log::command("packages", "git", &args);

            let status = Command::new("git")
                .args(&args)
                .status()
                .context("Cannot launch git; is it installed?")?;

            if !status.success() {
                log::failure("packages", &format!("git clone failed for {url}"));
                bail!("Package clone failed for {url}.");
            }
        } else {
            // Local path import: copy nothing, reference in place.
            let source = Path::new(url);
            if !source.exists() {
                bail!("Cannot find package under path {url}.");
            }
        }

        let _ = arguments;
        self.discover_fragments(&destination, &name)
    }

    /// The YAML fragments a checkout contributes: its own library
    /// documents, or a generated one naming its project file.
    fn discover_fragments(&self, checkout: &Path, name: &str) -> anyhow::Result<Vec<String>> {
        let mut fragments = Vec::new();

        let library_doc = checkout.join(format!("{name}.yaml"));
        if library_doc.exists() {
            fragments.push(library_doc.display().to_string());
        }

        let project = checkout.join("project.yaml");
        if project.exists() {
            fragments.push(project.display().to_string());
        }

        if fragments.is_empty() {
            log::warning(
                "packages",
                &format!("{name} contains no configuration fragments"),
            );
        }

        Ok(fragments)
    }

    /// Drop a package from the lock file. The checkout stays on disk
    /// until `clean`.
    pub fn remove(&mut self, url: &str) -> anyhow::Result<bool> {
        let removed = self.lock.packages_installed.remove(url).is_some();
        if removed {
            self.lock.save(&self.root)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names_strip_git_suffix() {
        assert_eq!(
            PackageManager::package_name("https://example.com/some/pkg.git"),
            "pkg"
        );
        assert_eq!(
            PackageManager::package_name("https://example.com/other/"),
            "other"
        );
    }

    #[test]
    fn install_is_idempotent_via_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let packages = dir.path().join("deps");

        let mut manager = PackageManager::new(dir.path(), &packages).expect("creates");
        manager.lock.packages_installed.insert(
            "https://example.com/cached.git".into(),
            vec!["deps/cached/cached.yaml".into()],
        );

        let fragments = manager
            .install("https://example.com/cached.git", &[])
            .expect("served from lock");
        assert_eq!(fragments, vec!["deps/cached/cached.yaml".to_string()]);
    }

    #[test]
    fn local_fragments_are_discovered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let packages = dir.path().join("deps");
        let checkout = packages.join("local");
        std::fs::create_dir_all(&checkout).expect("mkdir");
        std::fs::write(checkout.join("project.yaml"), "name: local\n").expect("writes");

        let manager = PackageManager::new(dir.path(), &packages).expect("creates");
        let fragments = manager
            .discover_fragments(&checkout, "local")
            .expect("discovers");

        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].ends_with("project.yaml"));
    }

    #[test]
    fn remove_updates_the_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let packages = dir.path().join("deps");

        let mut manager = PackageManager::new(dir.path(), &packages).expect("creates");
        manager
            .lock
            .packages_installed
            .insert("https://example.com/x.git".into(), vec![]);

        assert!(manager.remove("https://example.com/x.git").expect("removes"));
        assert!(!manager.remove("https://example.com/x.git").expect("noop"));

        let reloaded = PackageLockFile::load(dir.path()).expect("loads");
        assert!(reloaded.packages_installed.is_empty());
    }
}
