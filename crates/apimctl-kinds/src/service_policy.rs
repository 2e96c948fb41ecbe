// SPDX-License-Identifier: MIT OR Apache-2.0
//! `service_policy`: the single global policy document attached to the
//! gateway service itself rather than to any resource under it. There is
//! at most one artifact of this kind, always with id `"policy"`.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};

use apimctl_core::{Artifact, content_hash};
use apimctl_transport::ApimClient;

use crate::error::KindError;
use crate::kind::Kind;

const GLOBAL_ID: &str = "policy";

pub struct ServicePolicyKind;

#[async_trait]
impl Kind for ServicePolicyKind {
    fn name(&self) -> &'static str {
        "service_policy"
    }

    async fn read_local(&self, source_dir: &Path) -> Result<Vec<Artifact>, KindError> {
        for candidate in [source_dir.join("policy/policy.xml"), source_dir.join("policy.xml")] {
            if !candidate.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&candidate).map_err(|source| KindError::Io {
                path: candidate.clone(),
                source,
            })?;
            let properties = json!({ "format": "rawxml", "value": content });
            let hash = content_hash(&properties).map_err(|source| KindError::Json {
                path: candidate,
                source,
            })?;
            return Ok(vec![Artifact::new("service_policy", GLOBAL_ID, properties, hash)]);
        }
        Ok(Vec::new())
    }

    async fn read_live(&self, client: &ApimClient) -> Result<Vec<Artifact>, KindError> {
        let Some(data) = client.get("/policies/policy").await? else {
            return Ok(Vec::new());
        };
        let properties = data.get("properties").cloned().unwrap_or(json!({}));
        let hash = content_hash(&properties).map_err(|source| KindError::Json {
            path: "<live>".into(),
            source,
        })?;
        Ok(vec![Artifact::new("service_policy", GLOBAL_ID, properties, hash)])
    }

    fn write_local(&self, output_dir: &Path, artifacts: &[Artifact]) -> Result<(), KindError> {
        let Some(artifact) = artifacts.first() else { return Ok(()) };
        let policy_dir = output_dir.join("policy");
        std::fs::create_dir_all(&policy_dir).map_err(|source| KindError::Io {
            path: policy_dir.clone(),
            source,
        })?;
        let content = artifact.properties.get("value").and_then(Value::as_str).unwrap_or_default();
        let path = policy_dir.join("policy.xml");
        std::fs::write(&path, content).map_err(|source| KindError::Io { path, source })
    }

    fn to_rest_payload(&self, artifact: &Artifact) -> Value {
        json!({ "properties": artifact.properties })
    }

    fn resource_path(&self, _id: &str) -> String {
        "/policies/policy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn prefers_policy_subdirectory_over_flat_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("policy")).unwrap();
        std::fs::write(dir.path().join("policy/policy.xml"), "<nested/>").unwrap();
        std::fs::write(dir.path().join("policy.xml"), "<flat/>").unwrap();

        let kind = ServicePolicyKind;
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].properties["value"], json!("<nested/>"));
    }

    #[tokio::test]
    async fn falls_back_to_flat_file_when_no_subdirectory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("policy.xml"), "<flat/>").unwrap();

        let kind = ServicePolicyKind;
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts[0].properties["value"], json!("<flat/>"));
    }

    #[tokio::test]
    async fn absent_policy_yields_no_artifacts() {
        let dir = tempdir().unwrap();
        let kind = ServicePolicyKind;
        assert!(kind.read_local(dir.path()).await.unwrap().is_empty());
    }
}
