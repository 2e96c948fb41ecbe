// SPDX-License-Identifier: MIT OR Apache-2.0
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Kind(#[from] apimctl_kinds::KindError),

    #[error(transparent)]
    State(#[from] apimctl_state::StateError),

    #[error(transparent)]
    Transport(#[from] apimctl_transport::TransportError),

    #[error("unknown kind '{0}' passed to --only")]
    UnknownKind(String),

    #[error("failed to read plan document {path}: {source}")]
    PlanRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write plan document {path}: {source}")]
    PlanWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan document {path}: {source}")]
    PlanParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
