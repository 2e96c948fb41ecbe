// SPDX-License-Identifier: MIT OR Apache-2.0
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::StateBackend;
use crate::blob::BlobStateBackend;
use crate::error::StateError;
use crate::local::LocalStateBackend;

/// Resolved configuration for picking a state backend, independent of how
/// the caller obtained the values (CLI flags or environment variables).
#[derive(Debug, Clone, Default)]
pub struct BackendArgs {
    pub backend: Option<String>,
    pub state_file: Option<PathBuf>,
    pub storage_account: Option<String>,
    /// A pre-issued Shared Access Signature query string (with or without
    /// the leading `?`); this backend never negotiates storage credentials
    /// of its own. See `crate::blob` for why a SAS token rather than an
    /// account key.
    pub storage_sas_token: Option<String>,
    pub container: Option<String>,
    pub blob: Option<String>,
}

const DEFAULT_STATE_FILE: &str = "apimctl.state.json";

/// Builds a [`StateBackend`] from resolved arguments, following the same
/// `local`/`azure` selection and required-field checks as the original
/// tool's `get_backend`.
pub fn build_backend(args: &BackendArgs) -> Result<Arc<dyn StateBackend>, StateError> {
    let kind = args.backend.as_deref().unwrap_or("local");
    match kind {
        "local" => {
            let path = args
                .state_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));
            Ok(Arc::new(LocalStateBackend::new(path)))
        }
        "azure" => {
            let account = require(&args.storage_account, "storage account")?;
            let container = require(&args.container, "container")?;
            let blob = require(&args.blob, "blob")?;
            let sas_token = require(&args.storage_sas_token, "storage SAS token")?;
            Ok(Arc::new(BlobStateBackend::new(account, container, blob, sas_token)))
        }
        other => Err(StateError::MissingField(format!(
            "unknown state backend '{other}', expected 'local' or 'azure'"
        ))),
    }
}

fn require<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, StateError> {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StateError::MissingField(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_backend_with_default_file() {
        let args = BackendArgs::default();
        let _ = build_backend(&args).unwrap();
    }

    #[test]
    fn azure_backend_requires_all_fields() {
        let args = BackendArgs {
            backend: Some("azure".into()),
            ..Default::default()
        };
        let err = build_backend(&args).unwrap_err();
        assert!(matches!(err, StateError::MissingField(_)));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let args = BackendArgs {
            backend: Some("s3".into()),
            ..Default::default()
        };
        assert!(build_backend(&args).is_err());
    }
}
