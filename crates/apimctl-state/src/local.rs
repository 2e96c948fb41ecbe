// SPDX-License-Identifier: MIT OR Apache-2.0
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use apimctl_core::{State, empty_state};

use crate::backend::StateBackend;
use crate::error::StateError;

/// Local-filesystem state backend. State is a single JSON file written
/// atomically via a temp-file-then-rename; the lock is a sidecar file
/// created with `O_EXCL` so two concurrent processes can never both
/// believe they hold it.
pub struct LocalStateBackend {
    path: PathBuf,
}

impl LocalStateBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        let mut p = self.path.clone();
        let name = p
            .file_name()
            .map(|n| format!("{}.lock", n.to_string_lossy()))
            .unwrap_or_else(|| "state.lock".to_string());
        p.set_file_name(name);
        p
    }

    fn lock_identity() -> String {
        format!("pid:{}", std::process::id())
    }
}

#[async_trait]
impl StateBackend for LocalStateBackend {
    async fn init(
        &self,
        subscription_id: &str,
        resource_group: &str,
        service_name: &str,
    ) -> Result<(), StateError> {
        if self.path.exists() {
            return Err(StateError::AlreadyInitialized(self.path.clone()));
        }
        let state = empty_state(subscription_id, resource_group, service_name);
        write_atomic(&self.path, &state)
    }

    async fn read(&self) -> Result<State, StateError> {
        if !self.path.exists() {
            return Err(StateError::NotInitialized {
                path: self.path.clone(),
            });
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StateError::Json {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&self, state: &State) -> Result<(), StateError> {
        write_atomic(&self.path, state)
    }

    async fn lock(&self) -> Result<(), StateError> {
        let lock_path = self.lock_path();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    StateError::AlreadyLocked(lock_path.clone())
                } else {
                    StateError::LockFailed {
                        path: lock_path.clone(),
                        reason: source.to_string(),
                    }
                }
            })?;
        file.write_all(Self::lock_identity().as_bytes())
            .map_err(|source| StateError::Io {
                path: lock_path.clone(),
                source,
            })?;
        debug!(path = %lock_path.display(), "acquired local state lock");
        Ok(())
    }

    async fn unlock(&self) -> Result<(), StateError> {
        let lock_path = self.lock_path();
        match std::fs::remove_file(&lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Io {
                path: lock_path,
                source,
            }),
        }
    }

    async fn force_unlock(&self) -> Result<(), StateError> {
        warn!(path = %self.lock_path().display(), "force-unlocking local state");
        self.unlock().await
    }
}

fn write_atomic(path: &Path, state: &State) -> Result<(), StateError> {
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(&tmp_path, json).map_err(|source| StateError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| StateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let backend = LocalStateBackend::new(dir.path().join("state.json"));
        backend.init("sub", "rg", "svc").await.unwrap();
        let state = backend.read().await.unwrap();
        assert_eq!(state.subscription_id, "sub");
        assert!(state.artifacts.is_empty());
    }

    #[tokio::test]
    async fn init_twice_errors() {
        let dir = tempdir().unwrap();
        let backend = LocalStateBackend::new(dir.path().join("state.json"));
        backend.init("sub", "rg", "svc").await.unwrap();
        let err = backend.init("sub", "rg", "svc").await.unwrap_err();
        assert!(matches!(err, StateError::AlreadyInitialized(_)));
    }

    #[tokio::test]
    async fn read_before_init_errors() {
        let dir = tempdir().unwrap();
        let backend = LocalStateBackend::new(dir.path().join("state.json"));
        let err = backend.read().await.unwrap_err();
        assert!(matches!(err, StateError::NotInitialized { .. }));
    }

    #[tokio::test]
    async fn lock_then_lock_again_fails() {
        let dir = tempdir().unwrap();
        let backend = LocalStateBackend::new(dir.path().join("state.json"));
        backend.lock().await.unwrap();
        let err = backend.lock().await.unwrap_err();
        assert!(matches!(err, StateError::AlreadyLocked(_)));
        backend.unlock().await.unwrap();
        backend.lock().await.unwrap();
    }

    #[tokio::test]
    async fn unlock_without_lock_is_a_no_op() {
        let dir = tempdir().unwrap();
        let backend = LocalStateBackend::new(dir.path().join("state.json"));
        backend.unlock().await.unwrap();
    }

    #[tokio::test]
    async fn write_is_atomic_and_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let backend = LocalStateBackend::new(&path);
        backend.init("sub", "rg", "svc").await.unwrap();
        let mut state = backend.read().await.unwrap();
        state.last_applied = Some("2026-07-28T00:00:00Z".to_string());
        backend.write(&state).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        let reread = backend.read().await.unwrap();
        assert_eq!(reread.last_applied, state.last_applied);
    }
}
