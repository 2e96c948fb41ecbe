// SPDX-License-Identifier: MIT OR Apache-2.0
//! The parent-attached raw-XML policy kinds: `api_policy` and
//! `product_policy`. Both are a single `policy.xml` sitting next to a
//! parent resource's own properties file, with properties reduced to
//! `{"format": "rawxml", "value": <content>}` — there is no sibling
//! metadata file of their own.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};

use apimctl_core::{Artifact, content_hash};
use apimctl_transport::ApimClient;

use crate::error::KindError;
use crate::kind::Kind;
use crate::support::{extract_id_from_path, find_dir_by_id_or_suffix, list_subdirs, read_json};

pub struct PolicyXmlSpec {
    pub name: &'static str,
    /// Local subdirectory and REST collection segment the parent lives
    /// under, e.g. `"apis"`.
    pub parent_segment: &'static str,
    /// Candidate filenames for the parent's own properties file, tried in
    /// order. `api` accepts both `apiInformation.json` and the legacy
    /// `configuration.json`; `product` only ever wrote one name.
    pub parent_info_filenames: &'static [&'static str],
    /// REST path segment appended after the parent id, e.g.
    /// `"policies/policy"`.
    pub rest_suffix: &'static str,
    /// When locating an existing parent directory to write into, also
    /// match a `<displayName>_<id>` suffix. `api`'s directories may carry
    /// a display-name prefix; `product`'s never do.
    pub parent_dir_by_suffix: bool,
}

pub struct PolicyXmlKind(pub PolicyXmlSpec);

fn parent_info_path(dir: &Path, candidates: &[&'static str]) -> Option<std::path::PathBuf> {
    candidates.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}

#[async_trait]
impl Kind for PolicyXmlKind {
    fn name(&self) -> &'static str {
        self.0.name
    }

    async fn read_local(&self, source_dir: &Path) -> Result<Vec<Artifact>, KindError> {
        let spec = &self.0;
        let base = source_dir.join(spec.parent_segment);
        let mut artifacts = Vec::new();

        for parent_dir in list_subdirs(&base)? {
            let Some(info_path) = parent_info_path(&parent_dir, spec.parent_info_filenames) else {
                continue;
            };
            let info = read_json(&info_path)?;
            let dir_name = parent_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let parent_id = info
                .get("id")
                .and_then(Value::as_str)
                .map(extract_id_from_path)
                .unwrap_or(dir_name);

            let policy_path = parent_dir.join("policy.xml");
            if !policy_path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&policy_path).map_err(|source| KindError::Io {
                path: policy_path.clone(),
                source,
            })?;
            let properties = json!({ "format": "rawxml", "value": content });
            let hash = content_hash(&properties).map_err(|source| KindError::Json {
                path: policy_path,
                source,
            })?;
            artifacts.push(Artifact::new(spec.name, parent_id, properties, hash));
        }

        artifacts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(artifacts)
    }

    async fn read_live(&self, client: &ApimClient) -> Result<Vec<Artifact>, KindError> {
        let spec = &self.0;
        let parents = client.list(&format!("/{}", spec.parent_segment)).await?;
        let mut artifacts = Vec::new();
        for parent in parents {
            let Some(parent_id) = parent.get("name").and_then(Value::as_str) else {
                continue;
            };
            let data = client.get(&format!("/{}/{parent_id}/{}", spec.parent_segment, spec.rest_suffix)).await?;
            let Some(data) = data else { continue };
            let properties = data.get("properties").cloned().unwrap_or(json!({}));
            let hash = content_hash(&properties).map_err(|source| KindError::Json {
                path: "<live>".into(),
                source,
            })?;
            artifacts.push(Artifact::new(spec.name, parent_id.to_string(), properties, hash));
        }
        Ok(artifacts)
    }

    fn write_local(&self, output_dir: &Path, artifacts: &[Artifact]) -> Result<(), KindError> {
        let spec = &self.0;
        let base = output_dir.join(spec.parent_segment);
        for artifact in artifacts {
            let parent_dir = if spec.parent_dir_by_suffix {
                find_dir_by_id_or_suffix(&base, &artifact.id).unwrap_or_else(|| base.join(&artifact.id))
            } else {
                base.join(&artifact.id)
            };
            std::fs::create_dir_all(&parent_dir).map_err(|source| KindError::Io {
                path: parent_dir.clone(),
                source,
            })?;
            let content = artifact.properties.get("value").and_then(Value::as_str).unwrap_or_default();
            let path = parent_dir.join("policy.xml");
            std::fs::write(&path, content).map_err(|source| KindError::Io { path, source })?;
        }
        Ok(())
    }

    fn to_rest_payload(&self, artifact: &Artifact) -> Value {
        json!({ "properties": artifact.properties })
    }

    fn resource_path(&self, id: &str) -> String {
        format!("/{}/{id}/{}", self.0.parent_segment, self.0.rest_suffix)
    }
}
