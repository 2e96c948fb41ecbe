// SPDX-License-Identifier: MIT OR Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current state-file schema version.
pub const STATE_VERSION: u32 = 1;

/// A single desired or reconciled resource.
///
/// `properties` is an open-ended JSON object: every kind has its own
/// property shape and none of them are modeled as Rust structs, since the
/// control plane's resource schemas are numerous, change independently of
/// this crate, and are never validated beyond what the control plane
/// itself rejects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Registry key, e.g. `"api"`, `"product_group"`.
    pub kind: String,
    /// Resource id local to its kind (not globally unique across kinds).
    pub id: String,
    /// `"{kind}:{id}"`, globally unique within one state file.
    pub key: String,
    /// Open-ended property bag.
    pub properties: Value,
    /// `"sha256:" + 64 hex chars`, computed over this artifact's hashable view.
    pub hash: String,

    /// `api`-only: the OpenAPI/WSDL/WADL/GraphQL document, when present locally.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spec: Option<Value>,
    /// `api`-only: operation id to operation-properties map.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operations: Option<BTreeMap<String, Value>>,
}

impl Artifact {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, properties: Value, hash: String) -> Self {
        let kind = kind.into();
        let id = id.into();
        let key = format!("{kind}:{id}");
        Self {
            kind,
            id,
            key,
            properties,
            hash,
            spec: None,
            operations: None,
        }
    }
}

/// Persisted reconciliation memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub version: u32,
    pub subscription_id: String,
    pub resource_group: String,
    #[serde(rename = "apim_service")]
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_applied: Option<String>,
    /// Keyed by [`Artifact::key`].
    pub artifacts: BTreeMap<String, Artifact>,
}

/// Builds a fresh, empty state for a newly-initialized deployment target.
pub fn empty_state(
    subscription_id: impl Into<String>,
    resource_group: impl Into<String>,
    service_name: impl Into<String>,
) -> State {
    State {
        version: STATE_VERSION,
        subscription_id: subscription_id.into(),
        resource_group: resource_group.into(),
        service_name: service_name.into(),
        last_applied: None,
        artifacts: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_key_combines_kind_and_id() {
        let a = Artifact::new("api", "echo-api", json!({}), "sha256:x".into());
        assert_eq!(a.key, "api:echo-api");
    }

    #[test]
    fn empty_state_carries_version_and_coordinates() {
        let s = empty_state("sub", "rg", "svc");
        assert_eq!(s.version, STATE_VERSION);
        assert_eq!(s.subscription_id, "sub");
        assert!(s.artifacts.is_empty());
        assert!(s.last_applied.is_none());
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let a = Artifact::new("gateway", "g1", json!({"description": "d"}), "sha256:abc".into());
        let s = serde_json::to_string(&a).unwrap();
        let back: Artifact = serde_json::from_str(&s).unwrap();
        assert_eq!(a, back);
    }
}
