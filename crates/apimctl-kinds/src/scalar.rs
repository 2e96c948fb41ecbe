// SPDX-License-Identifier: MIT OR Apache-2.0
//! The scalar-file kind family: one flat JSON properties file per
//! resource, the shape shared by `named_values`, `tags`, `version_sets`,
//! `backends`, `loggers`, `diagnostics`, `subscriptions` and `groups`.
//! `gateways` reuses this family with `info_filename` set, adding support
//! for the older `gateways/<id>/gatewayInformation.json` directory form
//! alongside the flat `gateways/<id>.json` form.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use apimctl_core::{Artifact, content_hash};
use apimctl_transport::ApimClient;

use crate::error::KindError;
use crate::kind::Kind;
use crate::support::{list_json_files, list_subdirs, read_json, resolve_and_hash, write_json};

pub struct ScalarKind {
    name: &'static str,
    /// REST collection segment and local subdirectory name, e.g. `"gateways"`.
    segment: &'static str,
    /// When set, a directory `<segment>/<id>/<info_filename>` is also read,
    /// in addition to the flat `<segment>/<id>.json` form.
    info_filename: Option<&'static str>,
    /// When false, the flat `<segment>/<id>.json` form is not scanned at
    /// all; `subscription` never had one.
    flat_read: bool,
    /// When true, `write_local` always emits the directory form (requires
    /// `info_filename`) rather than the flat form, even though both forms
    /// are still accepted on read. `product` and `policy_fragment` deploy
    /// this way; `gateway` does not.
    directory_write: bool,
    /// Extra properties keys, beyond `id`, stripped from the REST payload.
    /// `product` drops `groups`/`apis`, the cross-reference edges that
    /// the association kinds own.
    strip_payload_fields: &'static [&'static str],
    /// A properties key whose string value is written to its own sidecar
    /// file inside the resource directory on write, replaced by a
    /// `$ref-<field>` pointer. `policy_fragment` externalizes `policy` to
    /// `policy.xml`. Only takes effect when `directory_write` is set.
    externalize_field: Option<(&'static str, &'static str)>,
}

impl ScalarKind {
    pub const fn new(name: &'static str, segment: &'static str) -> Self {
        Self {
            name,
            segment,
            info_filename: None,
            flat_read: true,
            directory_write: false,
            strip_payload_fields: &[],
            externalize_field: None,
        }
    }

    pub const fn with_info_file(mut self, info_filename: &'static str) -> Self {
        self.info_filename = Some(info_filename);
        self
    }

    pub const fn directory_only(mut self) -> Self {
        self.flat_read = false;
        self.directory_write = true;
        self
    }

    pub const fn write_as_directory(mut self) -> Self {
        self.directory_write = true;
        self
    }

    pub const fn strip_payload_fields(mut self, fields: &'static [&'static str]) -> Self {
        self.strip_payload_fields = fields;
        self
    }

    pub const fn externalize_field(mut self, field: &'static str, filename: &'static str) -> Self {
        self.externalize_field = Some((field, filename));
        self
    }
}

#[async_trait]
impl Kind for ScalarKind {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn read_local(&self, source_dir: &Path) -> Result<Vec<Artifact>, KindError> {
        let dir = source_dir.join(self.segment);
        let mut artifacts = Vec::new();

        if self.flat_read {
            for path in list_json_files(&dir)? {
                let id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let props = read_json(&path)?;
                let (resolved, hash) = resolve_and_hash(props, &dir)?;
                artifacts.push(Artifact::new(self.name, id, resolved, hash));
            }
        }

        if let Some(info_filename) = self.info_filename {
            for subdir in list_subdirs(&dir)? {
                let info_path = subdir.join(info_filename);
                if !info_path.is_file() {
                    continue;
                }
                let id = subdir
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let props = read_json(&info_path)?;
                let (resolved, hash) = resolve_and_hash(props, &subdir)?;
                artifacts.push(Artifact::new(self.name, id, resolved, hash));
            }
        }

        artifacts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(artifacts)
    }

    async fn read_live(&self, client: &ApimClient) -> Result<Vec<Artifact>, KindError> {
        let items = client.list(&format!("/{}", self.segment)).await?;
        let mut artifacts = Vec::with_capacity(items.len());
        for item in items {
            let id = item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let props = item.get("properties").cloned().unwrap_or(json!({}));
            let hash = content_hash(&props).map_err(|source| KindError::Json {
                path: "<live>".into(),
                source,
            })?;
            artifacts.push(Artifact::new(self.name, id, props, hash));
        }
        Ok(artifacts)
    }

    fn write_local(&self, output_dir: &Path, artifacts: &[Artifact]) -> Result<(), KindError> {
        let dir = output_dir.join(self.segment);
        for artifact in artifacts {
            let mut props = as_object(&artifact.properties);
            props.insert(
                "id".to_string(),
                json!(format!("/{}/{}", self.segment, artifact.id)),
            );

            if self.directory_write {
                let info_filename = self.info_filename.unwrap_or("information.json");
                let resource_dir = dir.join(&artifact.id);
                if let Some((field, filename)) = self.externalize_field {
                    if let Some(content) = props.remove(field).and_then(|v| v.as_str().map(str::to_string)) {
                        std::fs::create_dir_all(&resource_dir).map_err(|source| KindError::Io {
                            path: resource_dir.clone(),
                            source,
                        })?;
                        std::fs::write(resource_dir.join(filename), content).map_err(|source| KindError::Io {
                            path: resource_dir.join(filename),
                            source,
                        })?;
                        props.insert(format!("$ref-{field}"), json!(filename));
                    }
                }
                write_json(&resource_dir.join(info_filename), &Value::Object(props))?;
            } else {
                write_json(&dir.join(format!("{}.json", artifact.id)), &Value::Object(props))?;
            }
        }
        Ok(())
    }

    fn to_rest_payload(&self, artifact: &Artifact) -> Value {
        let mut props = as_object(&artifact.properties);
        props.remove("id");
        for field in self.strip_payload_fields {
            props.remove(*field);
        }
        json!({ "properties": Value::Object(props) })
    }

    fn resource_path(&self, id: &str) -> String {
        format!("/{}/{id}", self.segment)
    }
}

pub fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_flat_json_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("backends")).unwrap();
        std::fs::write(
            dir.path().join("backends/b1.json"),
            r#"{"url":"https://example.com"}"#,
        )
        .unwrap();
        let kind = ScalarKind::new("backend", "backends");
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "b1");
    }

    #[tokio::test]
    async fn reads_directory_form_when_info_file_present() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("gateways/gw-1")).unwrap();
        std::fs::write(
            dir.path().join("gateways/gw-1/gatewayInformation.json"),
            r#"{"description":"d"}"#,
        )
        .unwrap();
        let kind = ScalarKind::new("gateway", "gateways").with_info_file("gatewayInformation.json");
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "gw-1");
    }

    #[test]
    fn payload_strips_id() {
        let kind = ScalarKind::new("backend", "backends");
        let artifact = Artifact::new(
            "backend",
            "b1",
            json!({"id": "/backends/b1", "url": "x"}),
            "sha256:x".into(),
        );
        let payload = kind.to_rest_payload(&artifact);
        assert!(payload["properties"].get("id").is_none());
        assert_eq!(payload["properties"]["url"], json!("x"));
    }

    #[test]
    fn payload_strips_extra_fields() {
        let kind = ScalarKind::new("product", "products").strip_payload_fields(&["groups", "apis"]);
        let artifact = Artifact::new(
            "product",
            "p1",
            json!({"id": "/products/p1", "displayName": "P", "groups": ["g1"], "apis": ["a1"]}),
            "sha256:x".into(),
        );
        let payload = kind.to_rest_payload(&artifact);
        assert!(payload["properties"].get("groups").is_none());
        assert!(payload["properties"].get("apis").is_none());
        assert_eq!(payload["properties"]["displayName"], json!("P"));
    }

    #[tokio::test]
    async fn directory_only_kind_ignores_flat_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("subscriptions")).unwrap();
        std::fs::write(dir.path().join("subscriptions/stray.json"), r#"{"x":1}"#).unwrap();
        std::fs::create_dir_all(dir.path().join("subscriptions/sub-1")).unwrap();
        std::fs::write(
            dir.path().join("subscriptions/sub-1/subscriptionInformation.json"),
            r#"{"state":"active"}"#,
        )
        .unwrap();
        let kind = ScalarKind::new("subscription", "subscriptions")
            .with_info_file("subscriptionInformation.json")
            .directory_only();
        let artifacts = kind.read_local(dir.path()).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "sub-1");
    }

    #[test]
    fn directory_write_externalizes_policy_field() {
        let dir = tempdir().unwrap();
        let kind = ScalarKind::new("policy_fragment", "policyFragments")
            .with_info_file("policyFragmentInformation.json")
            .write_as_directory()
            .externalize_field("policy", "policy.xml");
        let artifact = Artifact::new(
            "policy_fragment",
            "pf-1",
            json!({"description": "d", "policy": "<fragment />"}),
            "sha256:x".into(),
        );
        kind.write_local(dir.path(), std::slice::from_ref(&artifact)).unwrap();

        let policy_path = dir.path().join("policyFragments/pf-1/policy.xml");
        assert_eq!(std::fs::read_to_string(policy_path).unwrap(), "<fragment />");

        let info: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("policyFragments/pf-1/policyFragmentInformation.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(info["$ref-policy"], json!("policy.xml"));
        assert!(info.get("policy").is_none());
    }
}
