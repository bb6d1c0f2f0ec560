//! FHIR Package Registry Client
//!
//! Async client for npm-style FHIR package registries: JSON and byte-stream
//! fetching with bounded retry on transient network failures, plus the
//! package endpoints (metadata, version listing, tarball download).
//!
//! # Examples
//!
//! ## Resolve and download a package
//!
//! ```rust,no_run
//! use fpi_registry_client::RegistryClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RegistryClient::new()?;
//! let latest = client.latest_version("hl7.fhir.us.core").await?;
//! client
//!     .download_tarball("hl7.fhir.us.core", &latest, "us-core.tgz".as_ref())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
pub mod client;
pub mod error;
pub mod logger;
pub mod retry;

// Re-export main types (default)
pub use client::{RegistryClient, DEFAULT_REGISTRY_URL};
pub use error::{Error, FailureKind, Result};
pub use logger::{Logger, TracingLogger};
pub use retry::{with_retries, RetryPolicy};
