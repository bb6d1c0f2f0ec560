//! FHIR package registry API client.

use crate::error::{Error, Result};
use crate::logger::{Logger, TracingLogger};
use crate::retry::{with_retries, RetryPolicy};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Default registry serving published FHIR implementation guide packages.
pub const DEFAULT_REGISTRY_URL: &str = "https://packages.fhir.org";

/// Client for an npm-style FHIR package registry.
///
/// All request paths go through the bounded retry wrapper: transient
/// transport failures are reattempted, everything else fails fast.
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    logger: Arc<dyn Logger>,
}

impl RegistryClient {
    /// Create a client for the default registry.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_REGISTRY_URL.to_string())
    }

    /// Create a client for a custom registry URL.
    pub fn with_base_url(base_url: String) -> Result<Self> {
        Self::with_logger(base_url, Arc::new(TracingLogger))
    }

    /// Create a client with an explicit logger for retry notices.
    pub fn with_logger(base_url: String, logger: Arc<dyn Logger>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::Client)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            logger,
        })
    }

    /// Replace the default retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a URL and parse the accumulated body as JSON.
    ///
    /// The body is parsed regardless of status code: npm-style registries
    /// answer errors with JSON documents, and callers inspect the content.
    pub async fn fetch_json(&self, url: &str) -> Result<Value> {
        let bytes = with_retries(&self.retry, self.logger.as_ref(), || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::network(url, e))?;
            response.bytes().await.map_err(|e| Error::network(url, e))
        })
        .await?;

        serde_json::from_slice(&bytes).map_err(|source| Error::Parse {
            url: url.to_string(),
            source,
        })
    }

    /// Open a byte stream for a URL. Anything but status 200 is an error,
    /// including redirects that were not followed.
    pub async fn fetch_stream(&self, url: &str) -> Result<reqwest::Response> {
        with_retries(&self.retry, self.logger.as_ref(), || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::network(url, e))?;

            let status = response.status().as_u16();
            if status != 200 {
                return Err(Error::HttpStatus {
                    status,
                    url: url.to_string(),
                });
            }
            Ok(response)
        })
        .await
    }

    /// Stream a URL into a file, creating parent directories as needed.
    ///
    /// Retry applies to opening the stream only; a connection that dies
    /// mid-download is not resumed.
    pub async fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self.fetch_stream(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response.chunk().await.map_err(|e| Error::network(url, e))? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Full registry metadata document for a package.
    pub async fn package_metadata(&self, package_name: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, package_name);
        self.fetch_json(&url).await
    }

    /// All published versions of a package.
    pub async fn package_versions(&self, package_name: &str) -> Result<Vec<String>> {
        let metadata = self.package_metadata(package_name).await?;

        let versions = metadata
            .get("versions")
            .and_then(|v| v.as_object())
            .map(|obj| obj.keys().cloned().collect::<Vec<String>>())
            .ok_or_else(|| {
                Error::Registry(format!(
                    "Invalid package metadata for {}: missing or invalid 'versions' field",
                    package_name
                ))
            })?;

        Ok(versions)
    }

    /// Latest published version of a package.
    pub async fn latest_version(&self, package_name: &str) -> Result<String> {
        let metadata = self.package_metadata(package_name).await?;
        latest_from_metadata(package_name, &metadata)
    }

    /// Download the tarball for an exact package version into `dest`.
    pub async fn download_tarball(
        &self,
        package_name: &str,
        version: &str,
        dest: &Path,
    ) -> Result<()> {
        let url = format!("{}/{}/{}", self.base_url, package_name, version);
        self.download_file(&url, dest).await
    }
}

/// Resolve the latest version out of a registry metadata document.
///
/// `dist-tags.latest` wins when the registry publishes it; otherwise the
/// highest version key is chosen, preferring unlabelled releases.
fn latest_from_metadata(package_name: &str, metadata: &Value) -> Result<String> {
    if let Some(latest) = metadata
        .pointer("/dist-tags/latest")
        .and_then(Value::as_str)
    {
        return Ok(latest.to_string());
    }

    metadata
        .get("versions")
        .and_then(|v| v.as_object())
        .and_then(|obj| fpi_package::latest_version(obj.keys().map(String::as_str)))
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Registry(format!(
                "No versions found for package {} in registry metadata",
                package_name
            ))
        })
}
