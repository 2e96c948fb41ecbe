// SPDX-License-Identifier: MIT OR Apache-2.0
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serializes `value` to its canonical JSON form: object keys in
/// lexicographic order, no insignificant whitespace, UTF-8.
///
/// `serde_json::Map` is `BTreeMap`-backed whenever the `preserve_order`
/// feature is not enabled, so round-tripping through `serde_json::Value`
/// sorts every nested object for free; we never need to walk the tree
/// ourselves to reorder keys.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    serde_json::to_string(&v)
}

/// Hex-encodes the SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Computes an artifact's content hash: `"sha256:" + hex(sha256(canonical_json(value)))`.
///
/// Callers pass whatever "hashable view" applies to the artifact kind —
/// for most kinds that is just the artifact's `properties` object, but for
/// composite kinds (e.g. `api`) it is a synthesized wrapper object that
/// also folds in sibling fields such as `spec`/`operations`. `content_hash`
/// itself is kind-agnostic: it is the caller's job to build the right
/// input value, not this function's job to special-case kinds.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = canonical_json(value)?;
    Ok(format!("sha256:{}", sha256_hex(json.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_stable_under_key_reordering() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn hash_is_stable_under_nested_key_reordering() {
        let a = json!({"outer": {"z": 1, "a": {"y": 2, "x": 3}}});
        let b = json!({"outer": {"a": {"x": 3, "y": 2}, "z": 1}});
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn hash_differs_on_value_change() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn hash_has_expected_prefix_and_length() {
        let h = content_hash(&json!({})).unwrap();
        assert!(h.starts_with("sha256:"));
        assert_eq!(h.len(), "sha256:".len() + 64);
    }

    #[test]
    fn canonical_json_has_no_insignificant_whitespace() {
        let s = canonical_json(&json!({"a": 1, "b": [1, 2, 3]})).unwrap();
        assert!(!s.contains(' '));
    }
}
