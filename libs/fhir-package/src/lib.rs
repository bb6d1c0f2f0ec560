//! Canonical models for the FHIR NPM package format.
//!
//! Provides serde-friendly representations of `package.json` manifests and
//! generated package index files, the index-entry extractor, version ordering
//! helpers, and tarball utilities for reading and unpacking package archives.

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use thiserror::Error;

pub type PackageName = String;
pub type Version = String;

/// Manifest filename inside a package's `package/` folder.
pub const MANIFEST_FILENAME: &str = "package.json";

/// Filename of the generated package index.
pub const INDEX_FILENAME: &str = ".fpi.index.json";

/// Index filename shipped by package publishers. Never trusted, always
/// regenerated under [`INDEX_FILENAME`].
pub const PUBLISHED_INDEX_FILENAME: &str = ".index.json";

/// Schema version written into generated index files.
pub const INDEX_VERSION: u8 = 2;

/// Parse a version into its base and optional label (e.g. "1.2.3-ballot" → ("1.2.3", Some("ballot"))).
pub fn parse_version(version: &str) -> (&str, Option<&str>) {
    match version.split_once('-') {
        Some((base, label)) => (base, Some(label)),
        None => (version, None),
    }
}

/// Compare versions numerically if both start with digits, otherwise lexicographically. Labels ignored.
pub fn compare_versions(v1: &str, v2: &str) -> std::cmp::Ordering {
    let (base1, _) = parse_version(v1);
    let (base2, _) = parse_version(v2);

    let is_numeric = |s: &str| s.chars().next().is_some_and(|c| c.is_ascii_digit());

    if is_numeric(base1) && is_numeric(base2) {
        compare_numeric_versions(base1, base2)
    } else {
        base1.cmp(base2)
    }
}

fn compare_numeric_versions(v1: &str, v2: &str) -> std::cmp::Ordering {
    let parts1: Vec<u32> = v1.split('.').filter_map(|p| p.parse().ok()).collect();
    let parts2: Vec<u32> = v2.split('.').filter_map(|p| p.parse().ok()).collect();

    let max_len = parts1.len().max(parts2.len());
    for i in 0..max_len {
        let p1 = parts1.get(i).copied().unwrap_or(0);
        let p2 = parts2.get(i).copied().unwrap_or(0);
        match p1.cmp(&p2) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }

    std::cmp::Ordering::Equal
}

/// Pick the highest version from an iterator, preferring unlabelled releases.
///
/// A labelled version (e.g. "5.0.0-ballot") is only selected when no
/// unlabelled version exists at all.
pub fn latest_version<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best_release: Option<&str> = None;
    let mut best_labelled: Option<&str> = None;

    for version in versions {
        let slot = if parse_version(version).1.is_none() {
            &mut best_release
        } else {
            &mut best_labelled
        };
        match slot {
            Some(current) if compare_versions(version, current) != std::cmp::Ordering::Greater => {}
            _ => *slot = Some(version),
        }
    }

    best_release.or(best_labelled)
}

/// FHIR NPM package manifest (`package/package.json`).
///
/// Only the fields the installer interprets are modelled; everything else a
/// publisher puts in the manifest (title, description, canonical, ...) is
/// preserved verbatim in `extra` and survives round trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: PackageName,
    pub version: Version,
    #[serde(default)]
    pub dependencies: BTreeMap<PackageName, Version>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl PackageManifest {
    /// Check the fields required to address a cache entry.
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.name.is_empty() {
            return Err(PackageError::ValidationError(
                "Package name required".into(),
            ));
        }
        if self.version.is_empty() {
            return Err(PackageError::ValidationError(
                "Package version required".into(),
            ));
        }
        Ok(())
    }
}

/// Generated package index (`.fpi.index.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIndex {
    #[serde(rename = "index-version")]
    pub index_version: u8,
    pub files: Vec<FileInPackageIndex>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// File entry in a package index.
///
/// Every attribute except the filename is optional: an attribute is present
/// when the source resource carried it as a plain JSON string and absent in
/// every other case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInPackageIndex {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Derive the index entry for a single resource file.
///
/// Total over any JSON document: attributes that are missing or not plain
/// strings (arrays, objects, numbers, booleans, null) are simply left absent
/// rather than coerced or rejected.
pub fn extract_resource_index_entry(filename: &str, content: &Value) -> FileInPackageIndex {
    let attr = |name: &str| {
        content
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    FileInPackageIndex {
        filename: filename.to_string(),
        resource_type: attr("resourceType"),
        id: attr("id"),
        url: attr("url"),
        name: attr("name"),
        version: attr("version"),
        kind: attr("kind"),
        r#type: attr("type"),
        supplements: attr("supplements"),
        content: attr("content"),
        base_definition: attr("baseDefinition"),
        derivation: attr("derivation"),
        date: attr("date"),
    }
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
    #[error("Missing file: {0}")]
    MissingFile(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type PackageResult<T> = Result<T, PackageError>;

/// Unpack a gzipped package tarball into `dest`.
///
/// `dest` is created if needed; entries land under it using the paths stored
/// in the archive (`package/...` for conforming packages).
pub fn extract_tar_gz<R: Read>(reader: R, dest: &Path) -> PackageResult<()> {
    fs::create_dir_all(dest)?;
    let mut archive = Archive::new(GzDecoder::new(reader));
    archive.unpack(dest)?;
    Ok(())
}

/// Read the manifest out of a package tarball without unpacking it.
pub fn manifest_from_tar_gz<R: Read>(reader: R) -> PackageResult<PackageManifest> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let manifest_path = Path::new("package").join(MANIFEST_FILENAME);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw_path = entry.path()?.into_owned();
        let path = raw_path.strip_prefix(".").unwrap_or(&raw_path);
        if path == manifest_path {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            return parse_json(&contents);
        }
    }

    Err(PackageError::MissingFile(
        manifest_path.to_string_lossy().into(),
    ))
}

/// Read the manifest from an extracted package directory.
///
/// Accepts either a package root (containing `package/`) or the `package/`
/// folder itself.
pub fn manifest_from_dir(dir: &Path) -> PackageResult<PackageManifest> {
    let candidates = [
        dir.join("package").join(MANIFEST_FILENAME),
        dir.join(MANIFEST_FILENAME),
    ];

    for path in &candidates {
        if path.is_file() {
            return parse_json(&fs::read(path)?);
        }
    }

    Err(PackageError::MissingFile(
        candidates[0].to_string_lossy().into(),
    ))
}

/// Parse JSON bytes, tolerating a UTF-8 BOM and stray control characters.
///
/// Published packages occasionally ship manifests with a BOM or embedded
/// control bytes that strict JSON parsers reject.
pub fn parse_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> PackageResult<T> {
    let cleaned = clean_bytes(bytes)?;
    Ok(serde_json::from_str(&cleaned)?)
}

fn clean_bytes(bytes: &[u8]) -> PackageResult<String> {
    let bytes = if bytes.len() >= 3 && &bytes[..3] == b"\xEF\xBB\xBF" {
        &bytes[3..]
    } else {
        bytes
    };

    let content = String::from_utf8(bytes.to_vec())
        .map_err(|e| PackageError::InvalidStructure(format!("Invalid UTF-8: {}", e)))?;

    Ok(content
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\x7F'))
        .collect::<String>()
        .trim()
        .to_string())
}
