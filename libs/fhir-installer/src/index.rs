//! Package index generation.

use crate::error::Result;
use fpi_package::{
    extract_resource_index_entry, PackageIndex, INDEX_FILENAME, INDEX_VERSION, MANIFEST_FILENAME,
    PUBLISHED_INDEX_FILENAME,
};
use fpi_registry_client::Logger;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Build the index document for an extracted `package/` folder.
///
/// Scans the folder's immediate `.json` files, skipping the manifest and
/// index files. Files that fail to parse are reported through `logger` and
/// skipped; files without a string `resourceType` are not resources and are
/// left out. Entries are sorted by filename, so regenerating the index for
/// unchanged content yields an identical document.
pub fn build_package_index(content_dir: &Path, logger: &dyn Logger) -> Result<PackageIndex> {
    let mut files = Vec::new();

    for entry in fs::read_dir(content_dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension() != Some("json".as_ref()) {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if filename == MANIFEST_FILENAME
            || filename == INDEX_FILENAME
            || filename == PUBLISHED_INDEX_FILENAME
        {
            continue;
        }

        let content: Value = match fpi_package::parse_json(&fs::read(&path)?) {
            Ok(value) => value,
            Err(err) => {
                logger.warn(&format!("Skipping {filename}: {err}"));
                continue;
            }
        };

        let entry = extract_resource_index_entry(filename, &content);
        if entry.resource_type.is_none() {
            continue;
        }
        files.push(entry);
    }

    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(PackageIndex {
        index_version: INDEX_VERSION,
        files,
        extra: Map::new(),
    })
}
