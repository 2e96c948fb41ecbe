// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared helpers used by every kind family: directory scanning, JSON
//! read/write, id extraction and the resolve-then-hash pipeline that turns
//! a raw properties file into a hashed [`Artifact`].

use std::path::{Path, PathBuf};

use apimctl_core::{Artifact, content_hash, resolve_refs};
use serde_json::Value;

use crate::error::KindError;

/// Lists `*.json` files directly inside `dir`, sorted by filename, or an
/// empty vec if `dir` does not exist.
pub fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>, KindError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|source| KindError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Lists immediate subdirectories of `dir`, sorted by name, or an empty
/// vec if `dir` does not exist.
pub fn list_subdirs(dir: &Path) -> Result<Vec<PathBuf>, KindError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|source| KindError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    paths.sort();
    Ok(paths)
}

pub fn read_json(path: &Path) -> Result<Value, KindError> {
    let content = std::fs::read_to_string(path).map_err(|source| KindError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| KindError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_json(path: &Path, value: &Value) -> Result<(), KindError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| KindError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = serde_json::to_string_pretty(value).unwrap_or_default();
    std::fs::write(path, text).map_err(|source| KindError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Extracts the trailing path segment from a full resource id path, e.g.
/// `"/gateways/gw-1/"` -> `"gw-1"`. Control-plane resources often carry
/// their fully qualified resource path as `id`; artifact identity within
/// this tool is always just the final segment.
pub fn extract_id_from_path(id_path: &str) -> String {
    id_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(id_path)
        .to_string()
}

/// Resolves `$ref-`/`$refs-` indirection in `properties` relative to
/// `base_dir`, then computes the artifact's content hash over the
/// resolved properties.
pub fn resolve_and_hash(properties: Value, base_dir: &Path) -> Result<(Value, String), KindError> {
    let resolved = resolve_refs(&properties, base_dir);
    let hash = content_hash(&resolved).map_err(|source| KindError::Json {
        path: base_dir.to_path_buf(),
        source,
    })?;
    Ok((resolved, hash))
}

/// Builds a scalar artifact: resolve refs, hash, and wrap in [`Artifact`].
pub fn scalar_artifact(kind: &'static str, id: impl Into<String>, properties: Value, base_dir: &Path) -> Result<Artifact, KindError> {
    let (resolved, hash) = resolve_and_hash(properties, base_dir)?;
    Ok(Artifact::new(kind, id, resolved, hash))
}

/// Sanitizes a path segment by replacing path separators with underscores,
/// the same rule the display-name-prefixed directory naming uses.
pub fn sanitize_segment(segment: &str) -> String {
    segment.replace(['/', '\\'], "_")
}

/// Finds a resource's directory under `base` by exact name match or by
/// `_<id>` suffix match, preserving both lookup strategies so directories
/// written before the display-name-prefix convention (or after it) are
/// both found. Used by every kind whose parent directory may carry a
/// `<displayName>_<id>` name, chiefly `api`.
pub fn find_dir_by_id_or_suffix(base: &Path, id: &str) -> Option<PathBuf> {
    if !base.is_dir() {
        return None;
    }
    let suffix = format!("_{id}");
    let mut entries: Vec<PathBuf> = std::fs::read_dir(base)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();
    entries
        .iter()
        .find(|p| p.file_name().is_some_and(|n| n == id))
        .or_else(|| {
            entries
                .iter()
                .find(|p| p.file_name().is_some_and(|n| n.to_string_lossy().ends_with(&suffix)))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trailing_segment() {
        assert_eq!(extract_id_from_path("/gateways/gw-1"), "gw-1");
        assert_eq!(extract_id_from_path("/gateways/gw-1/"), "gw-1");
        assert_eq!(extract_id_from_path("gw-1"), "gw-1");
    }

    #[test]
    fn sanitizes_separators() {
        assert_eq!(sanitize_segment("a/b\\c"), "a_b_c");
    }
}
