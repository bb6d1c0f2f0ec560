//! The package installer facade.
//!
//! Ties reference parsing, the registry client, the shared cache and index
//! generation together behind the operations the CLI exposes.

use crate::cache::CacheLayout;
use crate::config::InstallerConfig;
use crate::error::{Error, Result};
use crate::index::build_package_index;
use crate::reference::{is_version_alias, parse_reference, PackageIdentifier};
use crate::registry::PackageRegistry;
use fpi_package::{PackageIndex, PackageManifest, MANIFEST_FILENAME};
use fpi_registry_client::{Logger, RegistryClient, TracingLogger};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

/// Options for [`FhirPackageInstaller::download_package`].
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Directory the tarball or extracted package lands in. Defaults to the
    /// current directory.
    pub destination: Option<PathBuf>,
    /// Replace the target if it already exists.
    pub overwrite: bool,
    /// Extract the archive instead of keeping the `.tgz`.
    pub extract: bool,
}

/// Options for [`FhirPackageInstaller::install_local_package`].
#[derive(Debug, Clone, Default)]
pub struct LocalInstallOptions {
    /// Identity to register the package under instead of the one in its
    /// manifest, as a `name@version` reference.
    pub package_id: Option<String>,
    /// Replace an existing cache entry of the same identity.
    pub override_existing: bool,
    /// Also install the package's declared dependencies from the registry.
    pub install_dependencies: bool,
}

/// Acquires FHIR implementation guide packages into the shared local cache.
pub struct FhirPackageInstaller {
    config: InstallerConfig,
    cache: CacheLayout,
    registry: Arc<dyn PackageRegistry>,
    logger: Arc<dyn Logger>,
}

impl FhirPackageInstaller {
    /// Create an installer backed by the real registry client.
    pub fn new(config: InstallerConfig) -> Result<Self> {
        let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
        let client = RegistryClient::with_logger(config.registry_url.clone(), Arc::clone(&logger))?;
        Ok(Self::with_registry(config, Arc::new(client), logger))
    }

    /// Create an installer over an explicit registry implementation.
    pub fn with_registry(
        config: InstallerConfig,
        registry: Arc<dyn PackageRegistry>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let cache = CacheLayout::new(config.cache_path.clone());
        Self {
            config,
            cache,
            registry,
            logger,
        }
    }

    /// Root directory of the local package cache.
    pub fn cache_path(&self) -> &Path {
        self.cache.root()
    }

    /// Cache directory of a reference, resolved against installed versions
    /// only. Never touches the network: an unpinned reference picks the
    /// highest installed version or fails with [`Error::NotInstalled`].
    pub fn package_dir_path(&self, reference: &str) -> Result<PathBuf> {
        let package = self.resolve_installed(reference)?;
        Ok(self.cache.package_dir(&package))
    }

    /// Whether a reference is present in the cache. Never touches the
    /// network: an unpinned reference counts as installed when any version
    /// of the package is.
    pub fn is_installed(&self, reference: &str) -> Result<bool> {
        let parsed = parse_reference(reference)?;
        Ok(match parsed.version {
            Some(version) if !is_version_alias(&version) => self
                .cache
                .is_installed(&PackageIdentifier::new(parsed.name, version)),
            _ => !self.cache.installed_versions(&parsed.name).is_empty(),
        })
    }

    /// Normalize a reference into an exact package identity.
    ///
    /// Version-pinned references resolve without network access; unpinned
    /// ones (and the `latest`/`current` aliases) ask the registry for the
    /// latest published version.
    pub async fn resolve_reference(&self, reference: &str) -> Result<PackageIdentifier> {
        let parsed = parse_reference(reference)?;
        match parsed.version {
            Some(version) if !is_version_alias(&version) => {
                Ok(PackageIdentifier::new(parsed.name, version))
            }
            _ => {
                let latest = self.registry.latest_version(&parsed.name).await?;
                Ok(PackageIdentifier::new(parsed.name, latest))
            }
        }
    }

    /// Manifest of a package, fetching it into the cache first if needed.
    pub async fn manifest(&self, reference: &str) -> Result<PackageManifest> {
        let package = self.resolve_for_read(reference).await?;
        self.ensure_cached(&package).await?;
        self.read_manifest(&package)
    }

    /// Declared dependency map of an exact package version, fetching the
    /// package into the cache first if needed.
    pub async fn dependencies(
        &self,
        package: &PackageIdentifier,
    ) -> Result<BTreeMap<String, String>> {
        self.ensure_cached(package).await?;
        Ok(self.read_manifest(package)?.dependencies)
    }

    /// Package index of a reference, generating and persisting it when
    /// missing. Repeated calls return the identical document.
    pub async fn package_index(&self, reference: &str) -> Result<PackageIndex> {
        let package = self.resolve_for_read(reference).await?;
        self.ensure_cached(&package).await?;
        self.ensure_index(&package)?;
        Ok(fpi_package::parse_json(&fs::read(
            self.cache.index_path(&package),
        )?)?)
    }

    /// Install a package and its declared dependencies into the cache.
    ///
    /// Already-installed entries are not fetched again, but their dependency
    /// chains are still walked so missing links and indexes get repaired.
    /// Cyclic dependency declarations terminate: each exact package version
    /// is visited once.
    pub async fn install(&self, reference: &str) -> Result<()> {
        let mut visited = HashSet::new();
        self.install_tree(reference.to_string(), &mut visited).await
    }

    fn install_tree<'a>(
        &'a self,
        reference: String,
        visited: &'a mut HashSet<PackageIdentifier>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let package = self.resolve_reference(&reference).await?;
            if !visited.insert(package.clone()) {
                return Ok(());
            }

            self.ensure_cached(&package).await?;

            let manifest = self.read_manifest(&package)?;
            for (dep_name, dep_version) in &manifest.dependencies {
                if self.config.skip_examples && self.config.is_examples_package(dep_name) {
                    self.logger
                        .info(&format!("Skipping examples package {dep_name}"));
                    continue;
                }
                self.install_tree(format!("{dep_name}@{dep_version}"), visited)
                    .await?;
            }

            self.ensure_index(&package)?;
            Ok(())
        })
    }

    /// Download a package archive to a destination outside the cache.
    ///
    /// Without `extract` the tarball is saved as `{name}-{version}.tgz`;
    /// with it, the archive is unpacked into a `{name}#{version}` directory.
    /// An existing target fails the operation before the download starts
    /// unless `overwrite` is set.
    pub async fn download_package(&self, reference: &str, options: &DownloadOptions) -> Result<()> {
        let package = self.resolve_reference(reference).await?;
        let dest_dir = options
            .destination
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let target = if options.extract {
            dest_dir.join(package.directory_name())
        } else {
            dest_dir.join(format!("{}-{}.tgz", package.id, package.version))
        };

        if target.exists() && !options.overwrite {
            return Err(Error::DestinationExists(target).prethrow(self.logger.as_ref()));
        }

        if options.extract {
            let tarball_path =
                dest_dir.join(format!("{}-{}.tgz.download", package.id, package.version));
            self.registry
                .download_tarball(&package.id, &package.version, &tarball_path)
                .await?;
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            // The temp tarball goes away even when extraction fails.
            let extracted = extract_archive(&tarball_path, &target);
            let _ = fs::remove_file(&tarball_path);
            extracted?;
        } else {
            self.registry
                .download_tarball(&package.id, &package.version, &target)
                .await?;
        }

        self.logger
            .info(&format!("Downloaded {package} to {}", target.display()));
        Ok(())
    }

    /// Install a package from a local tarball or directory.
    ///
    /// The identity comes from the source's manifest unless overridden via
    /// [`LocalInstallOptions::package_id`]. An entry already present under
    /// that identity is left untouched unless `override_existing` is set.
    pub async fn install_local_package(
        &self,
        source: &Path,
        options: &LocalInstallOptions,
    ) -> Result<()> {
        let manifest = if source.is_dir() {
            fpi_package::manifest_from_dir(source)?
        } else {
            fpi_package::manifest_from_tar_gz(fs::File::open(source)?)?
        };
        manifest.validate()?;
        let package = self.local_identity(&manifest, options.package_id.as_deref())?;

        if self.cache.is_installed(&package) && !options.override_existing {
            self.logger
                .info(&format!("{package} is already installed, leaving it in place"));
        } else {
            self.ingest_local(source, &package)?;
            self.logger
                .info(&format!("Installed {package} from {}", source.display()));
        }

        self.ensure_index(&package)?;

        if options.install_dependencies {
            let manifest = self.read_manifest(&package)?;
            let mut visited = HashSet::new();
            visited.insert(package.clone());
            for (dep_name, dep_version) in &manifest.dependencies {
                if self.config.skip_examples && self.config.is_examples_package(dep_name) {
                    self.logger
                        .info(&format!("Skipping examples package {dep_name}"));
                    continue;
                }
                self.install_tree(format!("{dep_name}@{dep_version}"), &mut visited)
                    .await?;
            }
        }

        Ok(())
    }

    /// Resolve a reference against the cache only: unpinned references pick
    /// the highest installed version.
    fn resolve_installed(&self, reference: &str) -> Result<PackageIdentifier> {
        let parsed = parse_reference(reference)?;
        match parsed.version {
            Some(version) if !is_version_alias(&version) => {
                Ok(PackageIdentifier::new(parsed.name, version))
            }
            _ => {
                let versions = self.cache.installed_versions(&parsed.name);
                let latest = fpi_package::latest_version(versions.iter().map(String::as_str))
                    .ok_or_else(|| Error::NotInstalled(parsed.name.clone()))?
                    .to_string();
                Ok(PackageIdentifier::new(parsed.name, latest))
            }
        }
    }

    /// Resolve for read paths: prefer what is installed, fall back to the
    /// registry when the reference names nothing in the cache.
    async fn resolve_for_read(&self, reference: &str) -> Result<PackageIdentifier> {
        match self.resolve_installed(reference) {
            Ok(package) => Ok(package),
            Err(Error::NotInstalled(_)) => self.resolve_reference(reference).await,
            Err(err) => Err(err),
        }
    }

    /// Fetch and extract a package when its cache entry is absent.
    ///
    /// The archive is staged inside the cache and moved into place with one
    /// rename, so a failed download never leaves a half-populated entry.
    async fn ensure_cached(&self, package: &PackageIdentifier) -> Result<()> {
        if self.cache.is_installed(package) {
            return Ok(());
        }

        let staging_root = self.cache.staging_dir();
        let tarball_path = staging_root.join(format!("{}.tgz", package.directory_name()));
        let staged_entry = staging_root.join(package.directory_name());

        self.logger.info(&format!("Downloading {package}"));
        self.registry
            .download_tarball(&package.id, &package.version, &tarball_path)
            .await
            .map_err(|e| e.prethrow(self.logger.as_ref()))?;

        if staged_entry.exists() {
            fs::remove_dir_all(&staged_entry)?;
        }
        extract_archive(&tarball_path, &staged_entry)?;
        let _ = fs::remove_file(&tarball_path);

        if !staged_entry.join("package").join(MANIFEST_FILENAME).is_file() {
            let err = Error::Package(fpi_package::PackageError::MissingFile(format!(
                "package/package.json in archive for {package}"
            )));
            return Err(err.prethrow(self.logger.as_ref()));
        }

        fs::create_dir_all(self.cache.root())?;
        fs::rename(&staged_entry, self.cache.package_dir(package))?;
        self.logger.info(&format!(
            "Installed {package} into {}",
            self.cache.package_dir(package).display()
        ));
        Ok(())
    }

    /// Generate and persist the index for a cache entry when missing.
    fn ensure_index(&self, package: &PackageIdentifier) -> Result<()> {
        let index_path = self.cache.index_path(package);
        if index_path.is_file() {
            return Ok(());
        }
        let index = build_package_index(&self.cache.content_dir(package), self.logger.as_ref())?;
        fs::write(&index_path, serde_json::to_vec_pretty(&index)?)?;
        Ok(())
    }

    fn read_manifest(&self, package: &PackageIdentifier) -> Result<PackageManifest> {
        let path = self.cache.manifest_path(package);
        if !path.is_file() {
            return Err(Error::NotInstalled(package.to_string()));
        }
        Ok(fpi_package::parse_json(&fs::read(path)?)?)
    }

    /// Identity a local package is registered under: an explicit override
    /// wins, its version falling back to the manifest's.
    fn local_identity(
        &self,
        manifest: &PackageManifest,
        package_id: Option<&str>,
    ) -> Result<PackageIdentifier> {
        match package_id {
            None => Ok(PackageIdentifier::new(
                manifest.name.clone(),
                manifest.version.clone(),
            )),
            Some(reference) => {
                let parsed = parse_reference(reference)?;
                let version = match parsed.version {
                    Some(v) if !is_version_alias(&v) => v,
                    _ => manifest.version.clone(),
                };
                Ok(PackageIdentifier::new(parsed.name, version))
            }
        }
    }

    /// Copy or extract a local source into the cache entry for `package`.
    fn ingest_local(&self, source: &Path, package: &PackageIdentifier) -> Result<()> {
        let staged_entry = self.cache.staging_dir().join(package.directory_name());
        if staged_entry.exists() {
            fs::remove_dir_all(&staged_entry)?;
        }

        if source.is_dir() {
            if source.join("package").join(MANIFEST_FILENAME).is_file() {
                copy_dir_recursive(source, &staged_entry)?;
            } else {
                // A bare package folder: nest it the way archives do.
                copy_dir_recursive(source, &staged_entry.join("package"))?;
            }
        } else {
            extract_archive(source, &staged_entry)?;
        }

        if !staged_entry.join("package").join(MANIFEST_FILENAME).is_file() {
            return Err(Error::Package(fpi_package::PackageError::MissingFile(
                format!("package/package.json in {}", source.display()),
            )));
        }

        let entry_dir = self.cache.package_dir(package);
        if entry_dir.exists() {
            fs::remove_dir_all(&entry_dir)?;
        }
        fs::create_dir_all(self.cache.root())?;
        fs::rename(&staged_entry, &entry_dir)?;
        Ok(())
    }
}

fn extract_archive(tarball_path: &Path, target: &Path) -> Result<()> {
    let tarball = fs::File::open(tarball_path)?;
    Ok(fpi_package::extract_tar_gz(tarball, target)?)
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
