//! Installer configuration.

use fpi_registry_client::DEFAULT_REGISTRY_URL;
use std::path::PathBuf;

/// Core example packages, skipped during dependency installation when
/// `skip_examples` is set. Matched by exact name.
pub const DEFAULT_EXAMPLES_PACKAGES: &[&str] = &[
    "hl7.fhir.r2.examples",
    "hl7.fhir.r2b.examples",
    "hl7.fhir.r3.examples",
    "hl7.fhir.r4.examples",
    "hl7.fhir.r4b.examples",
    "hl7.fhir.r5.examples",
    "hl7.fhir.r6.examples",
];

/// Configuration for one installer instance.
///
/// Every instance carries its own settings; there is no process-global
/// state, so two installers with different registries or caches can coexist.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Base URL of the package registry.
    pub registry_url: String,
    /// Root directory of the local package cache.
    pub cache_path: PathBuf,
    /// Skip example packages when walking dependency chains.
    pub skip_examples: bool,
    /// Exact package names treated as example packages.
    pub examples_packages: Vec<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            cache_path: default_cache_path(),
            skip_examples: false,
            examples_packages: DEFAULT_EXAMPLES_PACKAGES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl InstallerConfig {
    /// Whether a dependency name is on the examples skip list.
    pub fn is_examples_package(&self, name: &str) -> bool {
        self.examples_packages.iter().any(|entry| entry == name)
    }
}

/// The FHIR package cache shared with other FHIR tooling
/// (`~/.fhir/packages`).
pub fn default_cache_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".fhir").join("packages"))
        .unwrap_or_else(|| PathBuf::from(".fhir/packages"))
}
