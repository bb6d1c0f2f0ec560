//! Error types for the installer.

use fpi_registry_client::Logger;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Installer errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid package reference: {0}")]
    InvalidReference(String),

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Package {0} is not installed")]
    NotInstalled(String),

    #[error("Registry error: {0}")]
    Registry(#[from] fpi_registry_client::Error),

    #[error("Package error: {0}")]
    Package(#[from] fpi_package::PackageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Report the error through `logger` before handing it back for raising.
    ///
    /// Emits the rendered message followed by the full error structure. Plain
    /// construction plus `?` is the silent path; this variant is for failure
    /// sites whose error would otherwise never reach the configured output
    /// channel.
    pub fn prethrow(self, logger: &dyn Logger) -> Self {
        logger.error(&self.to_string());
        logger.error(&format!("{self:#?}"));
        self
    }
}
