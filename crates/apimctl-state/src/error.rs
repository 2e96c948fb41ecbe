// SPDX-License-Identifier: MIT OR Apache-2.0
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file {path} does not exist; run 'init' first")]
    NotInitialized { path: PathBuf },

    #[error("state file {0} already exists")]
    AlreadyInitialized(PathBuf),

    #[error("failed to acquire lock at {path}: {reason}")]
    LockFailed { path: PathBuf, reason: String },

    #[error("lock at {0} is held by another process")]
    AlreadyLocked(PathBuf),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("blob backend error: {0}")]
    Blob(String),
}
