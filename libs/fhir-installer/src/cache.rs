//! Local cache layout.
//!
//! One directory per installed package, named `{name}#{version}`, holding
//! the extracted archive. Resources live in the nested `package/` folder
//! next to the manifest and the generated index. Entries are only ever
//! created whole: downloads are staged elsewhere and moved in with a single
//! rename.

use crate::reference::PackageIdentifier;
use fpi_package::{INDEX_FILENAME, MANIFEST_FILENAME};
use std::fs;
use std::path::{Path, PathBuf};

/// Path arithmetic for the shared package cache.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging area for in-flight downloads and extractions. Lives inside
    /// the cache root so the final rename never crosses a filesystem.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(".fpi-staging")
    }

    /// Directory of one package's cache entry.
    pub fn package_dir(&self, package: &PackageIdentifier) -> PathBuf {
        self.root.join(package.directory_name())
    }

    /// The `package/` folder holding the entry's extracted resources.
    pub fn content_dir(&self, package: &PackageIdentifier) -> PathBuf {
        self.package_dir(package).join("package")
    }

    /// Path of the entry's manifest.
    pub fn manifest_path(&self, package: &PackageIdentifier) -> PathBuf {
        self.content_dir(package).join(MANIFEST_FILENAME)
    }

    /// Path of the entry's generated index.
    pub fn index_path(&self, package: &PackageIdentifier) -> PathBuf {
        self.content_dir(package).join(INDEX_FILENAME)
    }

    /// Whether an entry for this exact package version exists.
    pub fn is_installed(&self, package: &PackageIdentifier) -> bool {
        self.package_dir(package).is_dir()
    }

    /// Installed versions of a package, in directory order.
    pub fn installed_versions(&self, name: &str) -> Vec<String> {
        let mut versions = Vec::new();
        let Ok(entries) = fs::read_dir(&self.root) else {
            return versions;
        };

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(dir_name) = file_name.to_str() else {
                continue;
            };
            if let Some((entry_name, version)) = dir_name.split_once('#') {
                if entry_name == name && !version.is_empty() {
                    versions.push(version.to_string());
                }
            }
        }

        versions
    }
}
