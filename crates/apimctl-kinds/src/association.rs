// SPDX-License-Identifier: MIT OR Apache-2.0
//! The pure association-edge kind family: `product_api`, `product_group`,
//! `product_tag`, `gateway_api` and `api_tag` each link a parent resource
//! to a child by id alone, with no properties of their own beyond the two
//! ids. All five share one on-disk shape (a JSON array of child ids
//! sitting next to the parent's own directory) and one REST shape (a
//! bodyless or near-bodyless `PUT` at a nested collection path), so one
//! generic [`AssociationKind`] drives all of them, configured by
//! [`AssociationSpec`].

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};

use apimctl_core::{Artifact, content_hash};
use apimctl_transport::ApimClient;

use crate::error::KindError;
use crate::kind::Kind;
use crate::support::{find_dir_by_id_or_suffix, read_json};

pub struct AssociationSpec {
    pub name: &'static str,
    /// Local subdirectory and REST segment the parent lives under, e.g.
    /// `"products"`.
    pub parent_segment: &'static str,
    /// Candidate filenames for the parent's own properties file inside its
    /// directory, tried in order and used to resolve the parent's
    /// canonical id. `api_tag`'s parent accepts both the current
    /// `apiInformation.json` and the legacy `configuration.json`;
    /// `gateway_api` falls back to the directory name itself when none
    /// match.
    pub parent_info_filenames: &'static [&'static str],
    /// REST/local segment the children live under, e.g. `"apis"`.
    pub child_segment: &'static str,
    /// Filename of the sidecar array of child ids, e.g. `"apis.json"`.
    pub sidecar_filename: &'static str,
    /// Key the parent's own properties file may carry the same ids under
    /// inline, as a legacy alternative to the sidecar file, e.g. `"apis"`.
    pub inline_field: &'static str,
    /// Key name for the parent id in the synthesized association properties.
    pub parent_field: &'static str,
    /// Key name for the child id in the synthesized association properties.
    pub child_field: &'static str,
    /// When locating an existing parent directory to write the sidecar
    /// into, also match a `<displayName>_<id>` suffix, not just the exact
    /// id. `api_tag`'s parent is `api`, whose directories may carry a
    /// display-name prefix.
    pub parent_dir_by_suffix: bool,
    /// When true, a parent directory missing its info file is skipped
    /// entirely rather than falling back to the directory name as the
    /// parent id. Every association but `gateway_api` requires the info
    /// file; `gateway_api` accepts the bare directory name.
    pub require_parent_info: bool,
    /// The REST body sent on create. Every association but `gateway_api`
    /// creates with an empty body; `gateway_api` requires a provisioning
    /// state.
    pub rest_payload: fn() -> Value,
}

pub struct AssociationKind(pub AssociationSpec);

fn child_id_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => value
            .get("id")
            .and_then(Value::as_str)
            .map(crate::support::extract_id_from_path),
        _ => None,
    }
}

impl AssociationKind {
    fn parent_dir(&self, base: &Path, parent_id: &str) -> Option<std::path::PathBuf> {
        if self.0.parent_dir_by_suffix {
            find_dir_by_id_or_suffix(base, parent_id)
        } else {
            let dir = base.join(parent_id);
            dir.is_dir().then_some(dir)
        }
    }
}

#[async_trait]
impl Kind for AssociationKind {
    fn name(&self) -> &'static str {
        self.0.name
    }

    async fn read_local(&self, source_dir: &Path) -> Result<Vec<Artifact>, KindError> {
        let spec = &self.0;
        let base = source_dir.join(spec.parent_segment);
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<std::path::PathBuf> = std::fs::read_dir(&base)
            .map_err(|source| KindError::Io { path: base.clone(), source })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        entries.sort();

        let mut artifacts = Vec::new();
        for parent_dir in entries {
            let dir_name = parent_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let info_path = spec
                .parent_info_filenames
                .iter()
                .map(|name| parent_dir.join(name))
                .find(|p| p.is_file());
            let parent_info = match info_path {
                Some(path) => Some(read_json(&path)?),
                None => None,
            };
            if parent_info.is_none() && spec.require_parent_info {
                continue;
            }
            // Parents without an info file still contribute their
            // associations under the directory name alone, matching
            // `gateway_api`'s fallback to the gateway directory's own name.
            let parent_id = match &parent_info {
                Some(info) => info
                    .get("id")
                    .and_then(Value::as_str)
                    .map(crate::support::extract_id_from_path)
                    .unwrap_or_else(|| dir_name.clone()),
                None => dir_name.clone(),
            };

            let sidecar_path = parent_dir.join(spec.sidecar_filename);
            let child_ids: Vec<String> = if sidecar_path.is_file() {
                let raw = read_json(&sidecar_path)?;
                raw.as_array()
                    .map(|a| a.iter().filter_map(child_id_from).collect())
                    .unwrap_or_default()
            } else if let Some(info) = &parent_info {
                match info.get(spec.inline_field).and_then(Value::as_array) {
                    Some(a) => a.iter().filter_map(child_id_from).collect(),
                    None => continue,
                }
            } else {
                continue;
            };

            for child_id in child_ids {
                let properties = json!({
                    spec.parent_field: parent_id,
                    spec.child_field: child_id,
                });
                let hash = content_hash(&properties).map_err(|source| KindError::Json {
                    path: sidecar_path.clone(),
                    source,
                })?;
                artifacts.push(Artifact::new(spec.name, format!("{parent_id}/{child_id}"), properties, hash));
            }
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
            let children = match client
                .list(&format!("/{}/{parent_id}/{}", spec.parent_segment, spec.child_segment))
                .await
            {
                Ok(children) => children,
                Err(e) => {
                    tracing::warn!(parent_id, error = %e, "skipping association children after list failure");
                    continue;
                }
            };
            for child in children {
                let Some(child_id) = child.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let properties = json!({
                    spec.parent_field: parent_id,
                    spec.child_field: child_id,
                });
                let hash = content_hash(&properties).map_err(|source| KindError::Json {
                    path: "<live>".into(),
                    source,
                })?;
                artifacts.push(Artifact::new(spec.name, format!("{parent_id}/{child_id}"), properties, hash));
            }
        }
        Ok(artifacts)
    }

    fn write_local(&self, output_dir: &Path, artifacts: &[Artifact]) -> Result<(), KindError> {
        let spec = &self.0;
        let base = output_dir.join(spec.parent_segment);

        let mut by_parent: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for artifact in artifacts {
            let parent_id = artifact
                .properties
                .get(spec.parent_field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let child_id = artifact
                .properties
                .get(spec.child_field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            by_parent.entry(parent_id).or_default().push(child_id);
        }

        for (parent_id, mut child_ids) in by_parent {
            child_ids.sort();
            let parent_dir = self.parent_dir(&base, &parent_id).unwrap_or_else(|| base.join(&parent_id));
            std::fs::create_dir_all(&parent_dir).map_err(|source| KindError::Io {
                path: parent_dir.clone(),
                source,
            })?;
            let sidecar_path = parent_dir.join(spec.sidecar_filename);
            let text = serde_json::to_string_pretty(&child_ids).unwrap_or_default();
            std::fs::write(&sidecar_path, text).map_err(|source| KindError::Io {
                path: sidecar_path,
                source,
            })?;
        }
        Ok(())
    }

    fn to_rest_payload(&self, _artifact: &Artifact) -> Value {
        (self.0.rest_payload)()
    }

    fn resource_path(&self, id: &str) -> String {
        let spec = &self.0;
        let (parent_id, child_id) = id.split_once('/').unwrap_or((id, ""));
        format!("/{}/{parent_id}/{}/{child_id}", spec.parent_segment, spec.child_segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn empty_payload() -> Value {
        json!({})
    }

    fn product_api_spec() -> AssociationSpec {
        AssociationSpec {
            name: "product_api",
            parent_segment: "products",
            parent_info_filenames: &["productInformation.json"],
            child_segment: "apis",
            sidecar_filename: "apis.json",
            inline_field: "apis",
            parent_field: "productId",
            child_field: "apiId",
            parent_dir_by_suffix: false,
            require_parent_info: true,
            rest_payload: empty_payload,
        }
    }

    #[tokio::test]
    async fn reads_sidecar_file_associations() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("products/p1")).unwrap();
        std::fs::write(
            dir.path().join("products/p1/productInformation.json"),
            r#"{"id":"/products/p1","displayName":"P"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("products/p1/apis.json"), r#"["a1","a2"]"#).unwrap();

        let kind = AssociationKind(product_api_spec());
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].id, "p1/a1");
        assert_eq!(artifacts[0].properties["productId"], json!("p1"));
        assert_eq!(artifacts[1].id, "p1/a2");
    }

    #[tokio::test]
    async fn reads_inline_field_when_sidecar_missing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("products/p1")).unwrap();
        std::fs::write(
            dir.path().join("products/p1/productInformation.json"),
            r#"{"id":"/products/p1","apis":["a1"]}"#,
        )
        .unwrap();

        let kind = AssociationKind(product_api_spec());
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "p1/a1");
    }

    #[test]
    fn write_local_groups_children_under_parent() {
        let dir = tempdir().unwrap();
        let kind = AssociationKind(product_api_spec());
        let artifacts = vec![
            Artifact::new("product_api", "p1/a2", json!({"productId":"p1","apiId":"a2"}), "sha256:x".into()),
            Artifact::new("product_api", "p1/a1", json!({"productId":"p1","apiId":"a1"}), "sha256:y".into()),
        ];
        kind.write_local(dir.path(), &artifacts).unwrap();
        let written = std::fs::read_to_string(dir.path().join("products/p1/apis.json")).unwrap();
        let ids: Vec<String> = serde_json::from_str(&written).unwrap();
        assert_eq!(ids, vec!["a1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn resource_path_splits_parent_and_child() {
        let kind = AssociationKind(product_api_spec());
        assert_eq!(kind.resource_path("p1/a1"), "/products/p1/apis/a1");
    }
}
