//! Package reference parsing and normalization.

use crate::error::{Error, Result};
use fpi_package::{PackageName, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully resolved package identity: registry name plus an exact version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentifier {
    pub id: PackageName,
    pub version: Version,
}

impl PackageIdentifier {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    /// Directory name of this package's cache entry.
    pub fn directory_name(&self) -> String {
        format!("{}#{}", self.id, self.version)
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.version)
    }
}

/// A package reference as supplied by a user: a name with an optional
/// version segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub name: PackageName,
    pub version: Option<Version>,
}

/// Aliases meaning "whatever the registry currently publishes as latest".
pub fn is_version_alias(version: &str) -> bool {
    matches!(version, "latest" | "current")
}

/// Parse `name`, `name@version` or `name#version`.
///
/// Both separators are accepted and equivalent. Surrounding whitespace is
/// trimmed, and an empty version segment (`name@`) counts as no version.
pub fn parse_reference(reference: &str) -> Result<PackageReference> {
    let trimmed = reference.trim();
    let (name, version) = match trimmed.split_once(['@', '#']) {
        Some((name, version)) => (name, Some(version)),
        None => (trimmed, None),
    };

    if !is_valid_package_name(name) {
        return Err(Error::InvalidReference(reference.to_string()));
    }

    let version = match version {
        None | Some("") => None,
        Some(v) => {
            if !is_valid_version_segment(v) {
                return Err(Error::InvalidReference(reference.to_string()));
            }
            Some(v.to_string())
        }
    };

    Ok(PackageReference {
        name: name.to_string(),
        version,
    })
}

/// Package names: alphanumerics, dots, hyphens and underscores, starting
/// alphanumeric. Keeps path separators and other surprises out of cache
/// directory names.
fn is_valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

/// Version segments share the name alphabet. Range syntax like `1.2.x`
/// passes through untouched; whether it resolves is the registry's call.
fn is_valid_version_segment(version: &str) -> bool {
    !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
