// SPDX-License-Identifier: MIT OR Apache-2.0
//! The two kinds nested two levels deep under an API: `api_operation_policy`
//! (a `policy.xml` per operation) and `api_diagnostic` (a JSON properties
//! file per diagnostic, under `apis/<api>/diagnostics/`). Both carry a
//! composite `"<apiId>/<childId>"` id and both locate their parent API
//! directory by exact name or `<displayName>_<id>` suffix, since they are
//! written after the `api` kind itself has already chosen that directory
//! name.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use apimctl_core::{Artifact, content_hash, resolve_refs};
use apimctl_transport::ApimClient;

use crate::error::KindError;
use crate::kind::Kind;
use crate::support::{extract_id_from_path, find_dir_by_id_or_suffix, list_json_files, list_subdirs, read_json, write_json};

const INFO_FILENAMES: [&str; 2] = ["apiInformation.json", "configuration.json"];

fn api_id_for_dir(api_dir: &Path, dir_name: &str) -> Result<Option<String>, KindError> {
    let Some(info_path) = INFO_FILENAMES.iter().map(|n| api_dir.join(n)).find(|p| p.is_file()) else {
        return Ok(None);
    };
    let info = read_json(&info_path)?;
    Ok(Some(
        info.get("id")
            .and_then(Value::as_str)
            .map(extract_id_from_path)
            .unwrap_or_else(|| dir_name.to_string()),
    ))
}

pub struct ApiOperationPolicyKind;

#[async_trait]
impl Kind for ApiOperationPolicyKind {
    fn name(&self) -> &'static str {
        "api_operation_policy"
    }

    async fn read_local(&self, source_dir: &Path) -> Result<Vec<Artifact>, KindError> {
        let base = source_dir.join("apis");
        let mut artifacts = Vec::new();

        for api_dir in list_subdirs(&base)? {
            let dir_name = api_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let Some(api_id) = api_id_for_dir(&api_dir, &dir_name)? else { continue };

            let mut policies: BTreeMap<String, String> = BTreeMap::new();

            let new_format_dir = api_dir.join("operations");
            if new_format_dir.is_dir() {
                for op_dir in list_subdirs(&new_format_dir)? {
                    let policy_path = op_dir.join("policy.xml");
                    if !policy_path.is_file() {
                        continue;
                    }
                    let op_id = op_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    let content = std::fs::read_to_string(&policy_path).map_err(|source| KindError::Io {
                        path: policy_path,
                        source,
                    })?;
                    policies.insert(op_id, content);
                }
            }

            for op_dir in list_subdirs(&api_dir)? {
                let op_id = op_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                if op_id == "operations" || op_id == "diagnostics" || policies.contains_key(&op_id) {
                    continue;
                }
                let policy_path = op_dir.join("policy.xml");
                if !policy_path.is_file() {
                    continue;
                }
                let content = std::fs::read_to_string(&policy_path).map_err(|source| KindError::Io {
                    path: policy_path,
                    source,
                })?;
                policies.insert(op_id, content);
            }

            for (op_id, content) in policies {
                let properties = json!({ "format": "rawxml", "value": content });
                let hash = content_hash(&properties).map_err(|source| KindError::Json {
                    path: api_dir.clone(),
                    source,
                })?;
                artifacts.push(Artifact::new("api_operation_policy", format!("{api_id}/{op_id}"), properties, hash));
            }
        }

        artifacts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(artifacts)
    }

    async fn read_live(&self, client: &ApimClient) -> Result<Vec<Artifact>, KindError> {
        let apis = client.list("/apis").await?;
        let mut artifacts = Vec::new();
        for api in apis {
            let Some(api_id) = api.get("name").and_then(Value::as_str) else { continue };
            let ops = match client.list(&format!("/apis/{api_id}/operations")).await {
                Ok(ops) => ops,
                Err(e) => {
                    tracing::warn!(api_id, error = %e, "skipping operation policies after list failure");
                    continue;
                }
            };
            for op in ops {
                let Some(op_id) = op.get("name").and_then(Value::as_str) else { continue };
                let data = client
                    .get(&format!("/apis/{api_id}/operations/{op_id}/policies/policy"))
                    .await?;
                let Some(data) = data else { continue };
                let properties = data.get("properties").cloned().unwrap_or(json!({}));
                let hash = content_hash(&properties).map_err(|source| KindError::Json {
                    path: "<live>".into(),
                    source,
                })?;
                artifacts.push(Artifact::new("api_operation_policy", format!("{api_id}/{op_id}"), properties, hash));
            }
        }
        Ok(artifacts)
    }

    fn write_local(&self, output_dir: &Path, artifacts: &[Artifact]) -> Result<(), KindError> {
        let base = output_dir.join("apis");
        for artifact in artifacts {
            let (api_id, op_id) = artifact.id.split_once('/').unwrap_or((&artifact.id, ""));
            let api_dir = find_dir_by_id_or_suffix(&base, api_id).unwrap_or_else(|| base.join(api_id));
            let op_dir = api_dir.join(op_id);
            std::fs::create_dir_all(&op_dir).map_err(|source| KindError::Io {
                path: op_dir.clone(),
                source,
            })?;
            let content = artifact.properties.get("value").and_then(Value::as_str).unwrap_or_default();
            let path = op_dir.join("policy.xml");
            std::fs::write(&path, content).map_err(|source| KindError::Io { path, source })?;
        }
        Ok(())
    }

    fn to_rest_payload(&self, artifact: &Artifact) -> Value {
        json!({ "properties": artifact.properties })
    }

    fn resource_path(&self, id: &str) -> String {
        let (api_id, op_id) = id.split_once('/').unwrap_or((id, ""));
        format!("/apis/{api_id}/operations/{op_id}/policies/policy")
    }
}

pub struct ApiDiagnosticKind;

#[async_trait]
impl Kind for ApiDiagnosticKind {
    fn name(&self) -> &'static str {
        "api_diagnostic"
    }

    async fn read_local(&self, source_dir: &Path) -> Result<Vec<Artifact>, KindError> {
        let base = source_dir.join("apis");
        let mut artifacts = Vec::new();

        for api_dir in list_subdirs(&base)? {
            let dir_name = api_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let Some(api_id) = api_id_for_dir(&api_dir, &dir_name)? else { continue };

            let diag_dir = api_dir.join("diagnostics");
            if !diag_dir.is_dir() {
                continue;
            }
            for path in list_json_files(&diag_dir)? {
                let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                let raw = read_json(&path)?;
                let properties = resolve_refs(&raw, &diag_dir);
                let diag_id = properties
                    .get("id")
                    .and_then(Value::as_str)
                    .map(extract_id_from_path)
                    .unwrap_or_else(|| filename.trim_end_matches(".json").to_string());
                let hash = content_hash(&properties).map_err(|source| KindError::Json { path, source })?;
                artifacts.push(Artifact::new("api_diagnostic", format!("{api_id}/{diag_id}"), properties, hash));
            }
        }

        artifacts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(artifacts)
    }

    async fn read_live(&self, client: &ApimClient) -> Result<Vec<Artifact>, KindError> {
        let apis = client.list("/apis").await?;
        let mut artifacts = Vec::new();
        for api in apis {
            let Some(api_id) = api.get("name").and_then(Value::as_str) else { continue };
            let diags = match client.list(&format!("/apis/{api_id}/diagnostics")).await {
                Ok(diags) => diags,
                Err(e) => {
                    tracing::warn!(api_id, error = %e, "skipping diagnostics after list failure");
                    continue;
                }
            };
            for diag in diags {
                let Some(diag_id) = diag.get("name").and_then(Value::as_str) else { continue };
                let properties = diag.get("properties").cloned().unwrap_or(json!({}));
                let hash = content_hash(&properties).map_err(|source| KindError::Json {
                    path: "<live>".into(),
                    source,
                })?;
                artifacts.push(Artifact::new("api_diagnostic", format!("{api_id}/{diag_id}"), properties, hash));
            }
        }
        Ok(artifacts)
    }

    fn write_local(&self, output_dir: &Path, artifacts: &[Artifact]) -> Result<(), KindError> {
        let base = output_dir.join("apis");
        for artifact in artifacts {
            let (api_id, diag_id) = artifact.id.split_once('/').unwrap_or((&artifact.id, ""));
            let api_dir = find_dir_by_id_or_suffix(&base, api_id).unwrap_or_else(|| base.join(api_id));
            let diag_dir = api_dir.join("diagnostics");
            let mut props = match &artifact.properties {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            props.insert("id".to_string(), json!(format!("/apis/{api_id}/diagnostics/{diag_id}")));
            write_json(&diag_dir.join(format!("{diag_id}.json")), &Value::Object(props))?;
        }
        Ok(())
    }

    fn to_rest_payload(&self, artifact: &Artifact) -> Value {
        let mut props = match &artifact.properties {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        props.remove("id");
        json!({ "properties": Value::Object(props) })
    }

    fn resource_path(&self, id: &str) -> String {
        let (api_id, diag_id) = id.split_once('/').unwrap_or((id, ""));
        format!("/apis/{api_id}/diagnostics/{diag_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn operation_policy_reads_old_format_directly_under_api_dir() {
        let dir = tempdir().unwrap();
        let api_dir = dir.path().join("apis/echo-api");
        std::fs::create_dir_all(api_dir.join("get-echo")).unwrap();
        std::fs::write(api_dir.join("apiInformation.json"), r#"{"id":"/apis/echo-api"}"#).unwrap();
        std::fs::write(api_dir.join("get-echo/policy.xml"), "<p/>").unwrap();

        let kind = ApiOperationPolicyKind;
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "echo-api/get-echo");
    }

    #[tokio::test]
    async fn operation_policy_reads_new_format_under_operations_dir() {
        let dir = tempdir().unwrap();
        let api_dir = dir.path().join("apis/echo-api");
        std::fs::create_dir_all(api_dir.join("operations/get-echo")).unwrap();
        std::fs::write(api_dir.join("apiInformation.json"), r#"{"id":"/apis/echo-api"}"#).unwrap();
        std::fs::write(api_dir.join("operations/get-echo/policy.xml"), "<p/>").unwrap();

        let kind = ApiOperationPolicyKind;
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "echo-api/get-echo");
    }

    #[tokio::test]
    async fn diagnostic_reads_nested_json_files() {
        let dir = tempdir().unwrap();
        let api_dir = dir.path().join("apis/echo-api");
        std::fs::create_dir_all(api_dir.join("diagnostics")).unwrap();
        std::fs::write(api_dir.join("apiInformation.json"), r#"{"id":"/apis/echo-api"}"#).unwrap();
        std::fs::write(api_dir.join("diagnostics/applicationinsights.json"), r#"{"loggerId":"/loggers/ai"}"#).unwrap();

        let kind = ApiDiagnosticKind;
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "echo-api/applicationinsights");
    }

    #[test]
    fn diagnostic_resource_path_splits_ids() {
        let kind = ApiDiagnosticKind;
        assert_eq!(kind.resource_path("echo-api/applicationinsights"), "/apis/echo-api/diagnostics/applicationinsights");
    }
}
