// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `api` kind: the one composite, atomic artifact in the registry. An
//! API's identity folds together its own properties, its specification
//! document (if one is attached) and its operations, so a change to any of
//! the three produces a different content hash even though only the
//! properties live in [`Artifact::properties`].

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use apimctl_core::{Artifact, content_hash, resolve_refs};
use apimctl_transport::ApimClient;

use crate::error::KindError;
use crate::kind::Kind;
use crate::support::{extract_id_from_path, list_subdirs, read_json, sanitize_segment, write_json};

const INFO_FILENAMES: [&str; 2] = ["apiInformation.json", "configuration.json"];
const SPEC_FILENAMES: [&str; 6] = [
    "specification.json",
    "specification.yaml",
    "specification.yml",
    "specification.wsdl",
    "specification.wadl",
    "specification.graphql",
];
const RESERVED_OPERATION_FILES: [&str; 3] = ["apiInformation.json", "configuration.json", "tags.json"];

pub struct ApiKind;

#[derive(Debug, Clone)]
struct SpecDocument {
    format: String,
    content: String,
    path: String,
}

impl SpecDocument {
    fn as_value(&self) -> Value {
        json!({
            "format": self.format,
            "content": self.content,
            "path": self.path,
        })
    }
}

fn find_spec_file(api_dir: &Path) -> Option<std::path::PathBuf> {
    SPEC_FILENAMES
        .iter()
        .map(|name| api_dir.join(name))
        .find(|p| p.is_file())
}

/// Detects an attached spec document's wire format by extension, sniffing
/// the swagger/openapi version out of JSON or YAML content when the
/// extension alone does not say.
fn detect_spec_format(path: &Path) -> Result<SpecDocument, KindError> {
    let content = std::fs::read_to_string(path).map_err(|source| KindError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let path_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let format = match ext.as_str() {
        "wsdl" => "wsdl".to_string(),
        "wadl" => "wadl".to_string(),
        "graphql" => "graphql".to_string(),
        "yaml" | "yml" => {
            let is_v2 = serde_yaml::from_str::<Value>(&content)
                .ok()
                .and_then(|v| v.get("swagger").and_then(Value::as_str).map(|s| s.starts_with('2')))
                .unwrap_or(false);
            if is_v2 { "swagger-link-json".to_string() } else { "openapi".to_string() }
        }
        _ => {
            let is_v2 = serde_json::from_str::<Value>(&content)
                .ok()
                .and_then(|v| v.get("swagger").and_then(Value::as_str).map(|s| s.starts_with('2')))
                .unwrap_or(false);
            if is_v2 { "swagger-json".to_string() } else { "openapi+json".to_string() }
        }
    };

    Ok(SpecDocument { format, content, path: path_name })
}

/// Reads an API's operations, preferring the new `operations/<opId>/`
/// directory form (where per-operation properties live on the control
/// plane, not locally) and falling back to the old form of one JSON file
/// per operation sitting directly in the API directory.
fn read_operations(api_dir: &Path, api_id: &str) -> Result<BTreeMap<String, Value>, KindError> {
    let new_format_dir = api_dir.join("operations");
    if new_format_dir.is_dir() {
        let mut ops = BTreeMap::new();
        for subdir in list_subdirs(&new_format_dir)? {
            let op_id = subdir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ops.insert(op_id.clone(), json!({ "id": format!("/apis/{api_id}/operations/{op_id}") }));
        }
        return Ok(ops);
    }

    let mut ops = BTreeMap::new();
    if !api_dir.is_dir() {
        return Ok(ops);
    }
    let mut entries: Vec<std::path::PathBuf> = std::fs::read_dir(api_dir)
        .map_err(|source| KindError::Io { path: api_dir.to_path_buf(), source })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
        .collect();
    entries.sort();

    for path in entries {
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if RESERVED_OPERATION_FILES.contains(&filename.as_str()) || filename.starts_with("specification.") {
            continue;
        }
        let raw = read_json(&path)?;
        let Value::Object(_) = &raw else { continue };
        let resolved = resolve_refs(&raw, api_dir);
        let op_id = resolved
            .get("id")
            .and_then(Value::as_str)
            .map(extract_id_from_path)
            .unwrap_or_else(|| filename.trim_end_matches(".json").to_string());
        ops.insert(op_id, resolved);
    }
    Ok(ops)
}

fn composite_hash(props: &Value, spec: &Option<SpecDocument>, operations: &BTreeMap<String, Value>) -> Result<String, KindError> {
    let composite = json!({
        "apiInfo": props,
        "spec": spec.as_ref().map(SpecDocument::as_value),
        "operations": operations,
    });
    content_hash(&composite).map_err(|source| KindError::Json { path: "<api composite>".into(), source })
}

#[async_trait]
impl Kind for ApiKind {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn read_local(&self, source_dir: &Path) -> Result<Vec<Artifact>, KindError> {
        let base = source_dir.join("apis");
        let mut artifacts = Vec::new();

        for api_dir in list_subdirs(&base)? {
            let info_path = INFO_FILENAMES
                .iter()
                .map(|name| api_dir.join(name))
                .find(|p| p.is_file());
            let Some(info_path) = info_path else { continue };

            let raw_props = read_json(&info_path)?;
            let props = resolve_refs(&raw_props, &api_dir);
            let dir_name = api_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let api_id = props
                .get("id")
                .and_then(Value::as_str)
                .map(extract_id_from_path)
                .unwrap_or_else(|| dir_name.clone());

            let spec = match find_spec_file(&api_dir) {
                Some(path) => Some(detect_spec_format(&path)?),
                None => None,
            };
            let operations = read_operations(&api_dir, &api_id)?;
            let hash = composite_hash(&props, &spec, &operations)?;

            let mut artifact = Artifact::new("api", api_id, props, hash);
            artifact.spec = spec.as_ref().map(SpecDocument::as_value);
            artifact.operations = Some(operations);
            artifacts.push(artifact);
        }

        artifacts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(artifacts)
    }

    async fn read_live(&self, client: &ApimClient) -> Result<Vec<Artifact>, KindError> {
        let items = client.list("/apis").await?;
        let mut artifacts = Vec::with_capacity(items.len());
        for item in items {
            let api_id = item.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let props = item.get("properties").cloned().unwrap_or(json!({}));

            let operations = match client.list(&format!("/apis/{api_id}/operations")).await {
                Ok(ops) => ops
                    .into_iter()
                    .filter_map(|op| {
                        let op_id = op.get("name").and_then(Value::as_str)?.to_string();
                        let op_props = op.get("properties").cloned().unwrap_or(json!({}));
                        Some((op_id, op_props))
                    })
                    .collect(),
                Err(e) => {
                    tracing::warn!(api_id, error = %e, "skipping operations after list failure");
                    BTreeMap::new()
                }
            };

            let hash = composite_hash(&props, &None, &operations)?;
            let mut artifact = Artifact::new("api", api_id, props, hash);
            artifact.operations = Some(operations);
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }

    fn write_local(&self, output_dir: &Path, artifacts: &[Artifact]) -> Result<(), KindError> {
        let base = output_dir.join("apis");
        for artifact in artifacts {
            let mut props = match &artifact.properties {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            let display = props
                .get("displayName")
                .and_then(Value::as_str)
                .unwrap_or(&artifact.id)
                .to_string();
            let dir_name = if display != artifact.id {
                format!("{display}_{}", artifact.id)
            } else {
                artifact.id.clone()
            };
            let dir_name = sanitize_segment(&dir_name);
            let api_dir = base.join(&dir_name);

            props.insert("id".to_string(), json!(format!("/apis/{}", artifact.id)));
            write_json(&api_dir.join("apiInformation.json"), &Value::Object(props))?;

            if let Some(operations) = &artifact.operations {
                for (op_id, op_props) in operations {
                    let mut out = match op_props {
                        Value::Object(map) => map.clone(),
                        _ => Map::new(),
                    };
                    out.insert("id".to_string(), json!(format!("/apis/{}/operations/{op_id}", artifact.id)));
                    write_json(&api_dir.join(format!("{op_id}.json")), &Value::Object(out))?;
                }
            }
        }
        Ok(())
    }

    fn to_rest_payload(&self, artifact: &Artifact) -> Value {
        let mut props = match &artifact.properties {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        props.remove("id");

        if let Some(spec) = &artifact.spec {
            if let (Some(format), Some(content)) = (
                spec.get("format").and_then(Value::as_str),
                spec.get("content").and_then(Value::as_str),
            ) {
                props.insert("format".to_string(), json!(format));
                props.insert("value".to_string(), json!(content));
            }
        }

        json!({ "properties": Value::Object(props) })
    }

    fn resource_path(&self, id: &str) -> String {
        format!("/apis/{id}")
    }

    fn to_operation_payloads(&self, artifact: &Artifact) -> Vec<(String, Value)> {
        let Some(operations) = &artifact.operations else {
            return Vec::new();
        };
        operations
            .iter()
            .map(|(op_id, op_props)| {
                let mut props = match op_props {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };
                props.remove("id");
                (op_id.clone(), json!({ "properties": Value::Object(props) }))
            })
            .collect()
    }
}
