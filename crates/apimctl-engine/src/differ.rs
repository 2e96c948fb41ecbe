// SPDX-License-Identifier: MIT OR Apache-2.0
//! Set-diff between the local (desired) artifact set and the persisted
//! state, producing one [`Change`] per key in their union.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use apimctl_core::Artifact;

/// What a [`Change`] asks the applier to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Create,
    Update,
    Delete,
    Noop,
}

/// One reconciliation decision for a single artifact key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub action: Action,
    pub key: String,
    pub kind: String,
    pub id: String,
    pub display_name: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Artifact>,
}

fn display_name(artifact: &Artifact) -> String {
    artifact
        .properties
        .get("displayName")
        .or_else(|| artifact.properties.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| artifact.id.clone())
}

/// Diffs `local` against `state`, iterating the union of both key sets in
/// lexicographic order so the resulting sequence is deterministic
/// regardless of map iteration order.
pub fn diff(local: &BTreeMap<String, Artifact>, state: &BTreeMap<String, Artifact>) -> Vec<Change> {
    let mut keys: Vec<&String> = local.keys().chain(state.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .map(|key| match (local.get(key), state.get(key)) {
            (Some(new), None) => Change {
                action: Action::Create,
                key: key.clone(),
                kind: new.kind.clone(),
                id: new.id.clone(),
                display_name: display_name(new),
                detail: String::new(),
                old: None,
                new: Some(new.clone()),
            },
            (None, Some(old)) => Change {
                action: Action::Delete,
                key: key.clone(),
                kind: old.kind.clone(),
                id: old.id.clone(),
                display_name: display_name(old),
                detail: String::new(),
                old: Some(old.clone()),
                new: None,
            },
            (Some(new), Some(old)) if new.hash == old.hash => Change {
                action: Action::Noop,
                key: key.clone(),
                kind: new.kind.clone(),
                id: new.id.clone(),
                display_name: display_name(new),
                detail: String::new(),
                old: Some(old.clone()),
                new: Some(new.clone()),
            },
            (Some(new), Some(old)) => Change {
                action: Action::Update,
                key: key.clone(),
                kind: new.kind.clone(),
                id: new.id.clone(),
                display_name: display_name(new),
                detail: update_detail(old, new),
                old: Some(old.clone()),
                new: Some(new.clone()),
            },
            (None, None) => unreachable!("key came from the union of both maps"),
        })
        .collect()
}

enum PropertyChange {
    Added(String),
    Removed(String),
    Scalar(String, Value, Value),
    Changed(String),
}

impl PropertyChange {
    fn render(&self) -> String {
        match self {
            PropertyChange::Added(k) => format!("added {k}"),
            PropertyChange::Removed(k) => format!("removed {k}"),
            PropertyChange::Scalar(k, old, new) => {
                format!("{k} {}→{}", render_scalar(old), render_scalar(new))
            }
            PropertyChange::Changed(k) => format!("changed {k}"),
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

fn as_object(value: &Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    }
}

/// Summarizes up to three differing top-level property keys between `old`
/// and `new`, plus the composite `spec`/`operations` siblings for the
/// `api` kind, truncating with `"..."` when more than three differ.
fn update_detail(old: &Artifact, new: &Artifact) -> String {
    let old_props = as_object(&old.properties);
    let new_props = as_object(&new.properties);

    let mut keys: Vec<&String> = old_props.keys().chain(new_props.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut changes = Vec::new();
    for key in keys {
        match (old_props.get(key), new_props.get(key)) {
            (Some(o), Some(n)) if o == n => continue,
            (Some(_), None) => changes.push(PropertyChange::Removed(key.clone())),
            (None, Some(_)) => changes.push(PropertyChange::Added(key.clone())),
            (Some(Value::Object(_)), Some(_)) | (Some(_), Some(Value::Object(_))) => {
                changes.push(PropertyChange::Changed(key.clone()))
            }
            (Some(Value::Array(_)), Some(_)) | (Some(_), Some(Value::Array(_))) => {
                changes.push(PropertyChange::Changed(key.clone()))
            }
            (Some(o), Some(n)) => changes.push(PropertyChange::Scalar(key.clone(), o.clone(), n.clone())),
            (None, None) => {}
        }
    }

    if old.spec != new.spec {
        changes.push(PropertyChange::Changed("spec".to_string()));
    }
    if old.operations != new.operations {
        changes.push(PropertyChange::Changed("operations".to_string()));
    }

    let truncated = changes.len() > 3;
    let rendered: Vec<String> = changes.iter().take(3).map(PropertyChange::render).collect();
    let mut detail = rendered.join(", ");
    if truncated {
        detail.push_str(", ...");
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(kind: &str, id: &str, props: Value, hash: &str) -> Artifact {
        Artifact::new(kind, id, props, hash.to_string())
    }

    #[test]
    fn local_only_key_is_create() {
        let mut local = BTreeMap::new();
        local.insert("named_value/k1".to_string(), artifact("named_value", "k1", json!({}), "sha256:a"));
        let state = BTreeMap::new();
        let changes = diff(&local, &state);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, Action::Create);
        assert!(changes[0].old.is_none());
    }

    #[test]
    fn state_only_key_is_delete() {
        let local = BTreeMap::new();
        let mut state = BTreeMap::new();
        state.insert("named_value/k1".to_string(), artifact("named_value", "k1", json!({}), "sha256:a"));
        let changes = diff(&local, &state);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, Action::Delete);
        assert!(changes[0].new.is_none());
    }

    #[test]
    fn equal_hash_is_noop() {
        let mut local = BTreeMap::new();
        local.insert("tag/t1".to_string(), artifact("tag", "t1", json!({"name": "t1"}), "sha256:a"));
        let mut state = BTreeMap::new();
        state.insert("tag/t1".to_string(), artifact("tag", "t1", json!({"name": "t1"}), "sha256:a"));
        let changes = diff(&local, &state);
        assert_eq!(changes[0].action, Action::Noop);
    }

    #[test]
    fn differing_hash_is_update_with_scalar_detail() {
        let mut local = BTreeMap::new();
        local.insert(
            "backend/b1".to_string(),
            artifact("backend", "b1", json!({"path": "/v2"}), "sha256:b"),
        );
        let mut state = BTreeMap::new();
        state.insert(
            "backend/b1".to_string(),
            artifact("backend", "b1", json!({"path": "/v1"}), "sha256:a"),
        );
        let changes = diff(&local, &state);
        assert_eq!(changes[0].action, Action::Update);
        assert_eq!(changes[0].detail, "path '/v1'→'/v2'");
    }

    #[test]
    fn diff_is_complete_over_key_union() {
        let mut local = BTreeMap::new();
        local.insert("tag/t1".to_string(), artifact("tag", "t1", json!({}), "sha256:a"));
        let mut state = BTreeMap::new();
        state.insert("tag/t2".to_string(), artifact("tag", "t2", json!({}), "sha256:b"));
        let changes = diff(&local, &state);
        let keys: std::collections::BTreeSet<_> = changes.iter().map(|c| c.key.clone()).collect();
        assert_eq!(keys, ["tag/t1".to_string(), "tag/t2".to_string()].into_iter().collect());
    }

    #[test]
    fn detail_truncates_past_three_differences() {
        let mut local = BTreeMap::new();
        local.insert(
            "product/p1".to_string(),
            artifact("product", "p1", json!({"a": 1, "b": 2, "c": 3, "d": 4}), "sha256:b"),
        );
        let mut state = BTreeMap::new();
        state.insert(
            "product/p1".to_string(),
            artifact("product", "p1", json!({"a": 0, "b": 0, "c": 0, "d": 0}), "sha256:a"),
        );
        let changes = diff(&local, &state);
        assert!(changes[0].detail.ends_with(", ..."));
    }

    #[test]
    fn api_composite_change_in_operations_reports_as_changed_operations() {
        let mut new = artifact("api", "echo", json!({"displayName": "Echo"}), "sha256:b");
        new.operations = Some(std::collections::BTreeMap::from([("get".to_string(), json!({"value": "new"}))]));
        let mut old = artifact("api", "echo", json!({"displayName": "Echo"}), "sha256:a");
        old.operations = Some(std::collections::BTreeMap::from([("get".to_string(), json!({"value": "old"}))]));

        let mut local = BTreeMap::new();
        local.insert("api/echo".to_string(), new);
        let mut state = BTreeMap::new();
        state.insert("api/echo".to_string(), old);

        let changes = diff(&local, &state);
        assert_eq!(changes[0].detail, "changed operations");
    }
}
