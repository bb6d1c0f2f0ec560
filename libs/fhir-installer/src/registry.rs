//! Registry access seam for the installer.

use crate::error::Result;
use async_trait::async_trait;
use fpi_registry_client::RegistryClient;
use std::path::Path;

/// The registry operations the installer depends on.
///
/// Production code plugs in [`RegistryClient`]; tests substitute their own
/// implementation to observe and control network traffic.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Latest published version of a package.
    async fn latest_version(&self, package_name: &str) -> Result<String>;

    /// Download the tarball for an exact package version into `dest`.
    async fn download_tarball(&self, package_name: &str, version: &str, dest: &Path)
        -> Result<()>;
}

#[async_trait]
impl PackageRegistry for RegistryClient {
    async fn latest_version(&self, package_name: &str) -> Result<String> {
        Ok(RegistryClient::latest_version(self, package_name).await?)
    }

    async fn download_tarball(
        &self,
        package_name: &str,
        version: &str,
        dest: &Path,
    ) -> Result<()> {
        Ok(RegistryClient::download_tarball(self, package_name, version, dest).await?)
    }
}
