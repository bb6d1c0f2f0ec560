#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use fpi_installer::{
    Error, FhirPackageInstaller, InstallerConfig, Logger, PackageRegistry, Result,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Logger capturing everything for assertions.
#[derive(Default)]
pub struct RecordingLogger {
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }
    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// In-memory registry standing in for the network.
///
/// Every call is recorded so tests can assert on traffic, or on its absence.
#[derive(Default)]
pub struct MockRegistry {
    latest: HashMap<String, String>,
    tarballs: HashMap<(String, String), Vec<u8>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest(mut self, name: &str, version: &str) -> Self {
        self.latest.insert(name.to_string(), version.to_string());
        self
    }

    /// Publish a package tarball with the given dependencies and one
    /// resource file.
    pub fn with_package(mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> Self {
        let bytes = package_tarball(
            name,
            version,
            deps,
            &[(
                &format!("StructureDefinition-{name}.json"),
                json!({
                    "resourceType": "StructureDefinition",
                    "id": name,
                    "url": format!("http://example.org/StructureDefinition/{name}"),
                    "version": version,
                    "kind": "resource"
                }),
            )],
        );
        self.tarballs
            .insert((name.to_string(), version.to_string()), bytes);
        self
    }

    /// Publish a tarball with explicit resource files.
    pub fn with_tarball(mut self, name: &str, version: &str, bytes: Vec<u8>) -> Self {
        self.tarballs
            .insert((name.to_string(), version.to_string()), bytes);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn download_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with("download "))
            .count()
    }

    pub fn latest_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with("latest "))
            .count()
    }
}

#[async_trait]
impl PackageRegistry for MockRegistry {
    async fn latest_version(&self, package_name: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("latest {package_name}"));
        self.latest.get(package_name).cloned().ok_or_else(|| {
            Error::Registry(fpi_registry_client::Error::Registry(format!(
                "No versions found for package {package_name}"
            )))
        })
    }

    async fn download_tarball(
        &self,
        package_name: &str,
        version: &str,
        dest: &Path,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("download {package_name}@{version}"));
        let bytes = self
            .tarballs
            .get(&(package_name.to_string(), version.to_string()))
            .ok_or_else(|| {
                Error::Registry(fpi_registry_client::Error::HttpStatus {
                    status: 404,
                    url: format!("mock://{package_name}/{version}"),
                })
            })?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, bytes)?;
        Ok(())
    }
}

/// Build a package tarball in memory.
pub fn package_tarball(
    name: &str,
    version: &str,
    deps: &[(&str, &str)],
    resources: &[(&str, Value)],
) -> Vec<u8> {
    let dependencies: serde_json::Map<String, Value> = deps
        .iter()
        .map(|(dep, v)| (dep.to_string(), Value::from(*v)))
        .collect();
    let manifest = json!({
        "name": name,
        "version": version,
        "dependencies": dependencies
    });

    let mut entries: Vec<(String, Vec<u8>)> = vec![(
        "package/package.json".to_string(),
        manifest.to_string().into_bytes(),
    )];
    for (filename, content) in resources {
        entries.push((
            format!("package/{filename}"),
            content.to_string().into_bytes(),
        ));
    }

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in &entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, Cursor::new(data.clone()))
            .expect("appends tar entry");
    }
    builder
        .into_inner()
        .expect("finishes tar stream")
        .finish()
        .expect("finishes gzip stream")
}

/// Everything a facade test needs: a temp cache, the installer wired to a
/// mock registry, and the captured log.
pub struct Harness {
    pub cache_dir: tempfile::TempDir,
    pub installer: FhirPackageInstaller,
    pub registry: std::sync::Arc<MockRegistry>,
    pub logger: std::sync::Arc<RecordingLogger>,
}

impl Harness {
    pub fn new(registry: MockRegistry) -> Self {
        Self::with_config_tweak(registry, |_| {})
    }

    pub fn with_config_tweak(
        registry: MockRegistry,
        tweak: impl FnOnce(&mut InstallerConfig),
    ) -> Self {
        let cache_dir = tempfile::tempdir().expect("creates temp cache");
        let mut config = InstallerConfig {
            cache_path: cache_dir.path().to_path_buf(),
            ..InstallerConfig::default()
        };
        tweak(&mut config);

        let registry = std::sync::Arc::new(registry);
        let logger = std::sync::Arc::new(RecordingLogger::default());
        let installer = FhirPackageInstaller::with_registry(
            config,
            std::sync::Arc::clone(&registry) as _,
            std::sync::Arc::clone(&logger) as _,
        );

        Self {
            cache_dir,
            installer,
            registry,
            logger,
        }
    }

    /// Path of an entry inside the temp cache.
    pub fn entry_path(&self, name: &str, version: &str) -> PathBuf {
        self.cache_dir.path().join(format!("{name}#{version}"))
    }
}
