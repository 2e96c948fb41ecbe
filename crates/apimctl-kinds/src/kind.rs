// SPDX-License-Identifier: MIT OR Apache-2.0
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use apimctl_core::Artifact;
use apimctl_transport::ApimClient;

use crate::error::KindError;

/// The one interface every one of the 22 resource kinds implements. A
/// `Kind` knows how to read its artifacts from a local directory tree, how
/// to read the equivalent artifacts from the live control plane, how to
/// write artifacts back to disk, and how to translate one artifact into a
/// REST request body and path.
#[async_trait]
pub trait Kind: Send + Sync {
    /// Registry key, e.g. `"api"`, `"product_group"`.
    fn name(&self) -> &'static str;

    /// Reads every local artifact of this kind under `source_dir`.
    async fn read_local(&self, source_dir: &Path) -> Result<Vec<Artifact>, KindError>;

    /// Reads every live artifact of this kind from the control plane.
    async fn read_live(&self, client: &ApimClient) -> Result<Vec<Artifact>, KindError>;

    /// Writes `artifacts` back under `output_dir`, replacing whatever this
    /// kind previously wrote there.
    fn write_local(&self, output_dir: &Path, artifacts: &[Artifact]) -> Result<(), KindError>;

    /// Builds the REST request body used to create or update `artifact`.
    fn to_rest_payload(&self, artifact: &Artifact) -> Value;

    /// Builds the REST path for `id`, relative to the service base URL.
    fn resource_path(&self, id: &str) -> String;

    /// `api`-only: per-operation REST payloads, keyed by operation id.
    /// Every other kind has no operations and returns an empty vec.
    fn to_operation_payloads(&self, _artifact: &Artifact) -> Vec<(String, Value)> {
        Vec::new()
    }
}
