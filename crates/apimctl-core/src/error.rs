// SPDX-License-Identifier: MIT OR Apache-2.0
use std::path::PathBuf;

/// Errors raised by the core artifact model, hasher and reference resolver.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to canonicalize value: {0}")]
    Canonicalize(#[from] serde_json::Error),
}
