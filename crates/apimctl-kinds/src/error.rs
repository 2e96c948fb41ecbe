// SPDX-License-Identifier: MIT OR Apache-2.0
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum KindError {
    #[error("io error at {path}: {source}")]
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

    #[error(transparent)]
    Transport(#[from] apimctl_transport::TransportError),
}
