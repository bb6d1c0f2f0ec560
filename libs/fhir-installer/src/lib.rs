//! FHIR Package Installer
//!
//! Acquisition and local caching of FHIR implementation guide packages:
//! reference parsing, registry downloads with bounded retry, recursive
//! dependency installation into the shared `~/.fhir/packages` cache, and
//! per-entry resource index generation.
//!
//! # Examples
//!
//! ## Install a package with its dependencies
//!
//! ```rust,no_run
//! use fpi_installer::{FhirPackageInstaller, InstallerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let installer = FhirPackageInstaller::new(InstallerConfig::default())?;
//! installer.install("hl7.fhir.us.core@6.1.0").await?;
//! let index = installer.package_index("hl7.fhir.us.core@6.1.0").await?;
//! println!("{} resource files", index.files.len());
//! # Ok(())
//! # }
//! ```
//!
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod installer;
pub mod reference;
pub mod registry;

// Re-export main types (default)
pub use cache::CacheLayout;
pub use config::{default_cache_path, InstallerConfig, DEFAULT_EXAMPLES_PACKAGES};
pub use error::{Error, Result};
pub use index::build_package_index;
pub use installer::{DownloadOptions, FhirPackageInstaller, LocalInstallOptions};
pub use reference::{is_version_alias, parse_reference, PackageIdentifier, PackageReference};
pub use registry::PackageRegistry;

// Re-export the logging seam for embedders
pub use fpi_registry_client::{Logger, TracingLogger};
