// SPDX-License-Identifier: MIT OR Apache-2.0
use serde_json::{Map, Value};
use std::path::Path;

const REF_PREFIX: &str = "$ref-";
const REFS_PREFIX: &str = "$refs-";

/// Resolves `$ref-<name>` and `$refs-<name>` sibling-file indirection in a
/// property bag, relative to `base_dir`.
///
/// `$ref-description: "description.md"` becomes `description: "<raw file
/// contents>"`. `$refs-spec: "spec.json"` becomes `spec: <parsed JSON>`. A
/// reference whose target file does not exist is left exactly as written,
/// under the un-prefixed key, as the literal path string: the resolver
/// never fails or logs on a missing reference, it silently passes the
/// reference path through. This matches the original tool's behavior and
/// is preserved rather than "fixed" because existing deployments may rely
/// on it.
///
/// Recurses into nested objects and into objects found inside arrays; any
/// other value is left untouched.
pub fn resolve_refs(value: &Value, base_dir: &Path) -> Value {
    match value {
        Value::Object(map) => Value::Object(resolve_object(map, base_dir)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_refs(v, base_dir)).collect())
        }
        other => other.clone(),
    }
}

fn resolve_object(map: &Map<String, Value>, base_dir: &Path) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        if let Some(target) = key.strip_prefix(REFS_PREFIX) {
            out.insert(target.to_string(), resolve_ref(value, base_dir, true));
        } else if let Some(target) = key.strip_prefix(REF_PREFIX) {
            out.insert(target.to_string(), resolve_ref(value, base_dir, false));
        } else {
            out.insert(key.clone(), resolve_refs(value, base_dir));
        }
    }
    out
}

fn resolve_ref(pointer: &Value, base_dir: &Path, as_json: bool) -> Value {
    let Some(rel_path) = pointer.as_str() else {
        return pointer.clone();
    };
    let path = base_dir.join(rel_path);
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return pointer.clone();
    };
    if as_json {
        serde_json::from_str(&contents).unwrap_or_else(|_| pointer.clone())
    } else {
        Value::String(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn resolves_raw_ref_to_file_contents() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("description.md"), "hello world").unwrap();
        let props = json!({"$ref-description": "description.md"});
        let resolved = resolve_refs(&props, dir.path());
        assert_eq!(resolved["description"], json!("hello world"));
        assert!(resolved.get("$ref-description").is_none());
    }

    #[test]
    fn resolves_json_refs_to_parsed_value() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("spec.json"), r#"{"openapi":"3.0.0"}"#).unwrap();
        let props = json!({"$refs-spec": "spec.json"});
        let resolved = resolve_refs(&props, dir.path());
        assert_eq!(resolved["spec"], json!({"openapi": "3.0.0"}));
    }

    #[test]
    fn missing_reference_passes_through_as_literal_path() {
        let dir = tempdir().unwrap();
        let props = json!({"$ref-description": "missing.md"});
        let resolved = resolve_refs(&props, dir.path());
        assert_eq!(resolved["description"], json!("missing.md"));
    }

    #[test]
    fn recurses_into_nested_objects_and_arrays() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("d.txt"), "nested").unwrap();
        let props = json!({
            "outer": {"$ref-description": "d.txt"},
            "list": [{"$ref-description": "d.txt"}],
        });
        let resolved = resolve_refs(&props, dir.path());
        assert_eq!(resolved["outer"]["description"], json!("nested"));
        assert_eq!(resolved["list"][0]["description"], json!("nested"));
    }
}
