// SPDX-License-Identifier: MIT OR Apache-2.0
//! Azure Blob Storage state backend, implemented directly against the Blob
//! REST API over `reqwest` — the same HTTP client the transport crate uses
//! for the management API — rather than pulling in a dedicated storage
//! SDK. The surface this backend needs (GET/PUT one blob, acquire/renew/
//! release/break a lease) is narrow enough that a second HTTP stack would
//! buy nothing.
//!
//! Authentication is a pre-issued SAS token appended to every request's
//! query string, the same "credential already resolved by the caller"
//! posture [`crate::backend::StateBackend`]'s sibling, the management
//! client's [`apimctl_transport::TokenSource`], takes: this backend never
//! negotiates storage credentials itself.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use apimctl_core::{State, empty_state};

use crate::backend::StateBackend;
use crate::error::StateError;

const BLOB_API_VERSION: &str = "2021-08-06";
/// Lease duration in seconds; the renewer ticks at half of this.
const LEASE_DURATION_SECS: u64 = 60;

/// The HTTP client plus the pieces needed to address one blob, cheap to
/// clone into the background lease-renewal task.
#[derive(Clone)]
struct BlobEndpoint {
    http: reqwest::Client,
    blob_url: String,
    sas_token: String,
}

impl BlobEndpoint {
    fn url(&self, extra_query: &str) -> String {
        if extra_query.is_empty() {
            format!("{}?{}", self.blob_url, self.sas_token)
        } else {
            format!("{}?{extra_query}&{}", self.blob_url, self.sas_token)
        }
    }

    async fn get_blob(&self) -> Result<reqwest::Response, StateError> {
        self.http
            .get(self.url(""))
            .header("x-ms-version", BLOB_API_VERSION)
            .send()
            .await
            .map_err(|e| StateError::Blob(e.to_string()))
    }

    async fn put_blob(&self, body: Vec<u8>, lease_id: Option<&str>) -> Result<reqwest::Response, StateError> {
        let mut req = self
            .http
            .put(self.url(""))
            .header("x-ms-version", BLOB_API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header("content-type", "application/json");
        if let Some(id) = lease_id {
            req = req.header("x-ms-lease-id", id);
        }
        req.body(body).send().await.map_err(|e| StateError::Blob(e.to_string()))
    }

    async fn lease(
        &self,
        action: &str,
        lease_id: Option<&str>,
        duration_secs: Option<u64>,
        break_period_secs: Option<u64>,
    ) -> Result<reqwest::Response, StateError> {
        let mut req = self
            .http
            .request(Method::PUT, self.url("comp=lease"))
            .header("x-ms-version", BLOB_API_VERSION)
            .header("x-ms-lease-action", action);
        if let Some(id) = lease_id {
            req = req.header("x-ms-lease-id", id);
        }
        if let Some(d) = duration_secs {
            req = req.header("x-ms-lease-duration", d.to_string());
        }
        if let Some(p) = break_period_secs {
            req = req.header("x-ms-lease-break-period", p.to_string());
        }
        req.send().await.map_err(|e| StateError::Blob(e.to_string()))
    }
}

/// Locking is implemented with a blob lease: `lock` acquires a 60-second
/// lease and spawns a background task that renews it every 30 seconds for
/// as long as the lock is held; `unlock` signals that task to stop and
/// releases the lease. `force_unlock` breaks the lease outright (break
/// period zero) without needing the original holder's lease id, for
/// recovering from a crashed `apply`.
pub struct BlobStateBackend {
    endpoint: BlobEndpoint,
    renewer: Mutex<Option<LeaseRenewer>>,
}

struct LeaseRenewer {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    lease_id: String,
}

impl BlobStateBackend {
    pub fn new(account: &str, container: &str, blob: &str, sas_token: &str) -> Self {
        let blob_url = format!("https://{account}.blob.core.windows.net/{container}/{blob}");
        Self {
            endpoint: BlobEndpoint {
                http: reqwest::Client::new(),
                blob_url,
                sas_token: sas_token.trim_start_matches('?').to_string(),
            },
            renewer: Mutex::new(None),
        }
    }

    async fn read_value(&self) -> Result<Option<State>, StateError> {
        let resp = self.endpoint.get_blob().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(StateError::Blob(format!("GET blob returned {}", resp.status())));
        }
        let bytes = resp.bytes().await.map_err(|e| StateError::Blob(e.to_string()))?;
        let state = serde_json::from_slice(&bytes).map_err(|source| StateError::Json {
            path: "<blob>".into(),
            source,
        })?;
        Ok(Some(state))
    }

    async fn write_value(&self, state: &State, lease_id: Option<&str>) -> Result<(), StateError> {
        let body = serde_json::to_vec_pretty(state).map_err(|source| StateError::Json {
            path: "<blob>".into(),
            source,
        })?;
        let resp = self.endpoint.put_blob(body, lease_id).await?;
        if !resp.status().is_success() {
            return Err(StateError::Blob(format!("PUT blob returned {}", resp.status())));
        }
        Ok(())
    }

    fn blob_path(&self) -> std::path::PathBuf {
        self.endpoint.blob_url.clone().into()
    }
}

async fn renew_loop(endpoint: BlobEndpoint, lease_id: String, mut stop_rx: oneshot::Receiver<()>) {
    let period = Duration::from_secs(LEASE_DURATION_SECS / 2);
    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                debug!("lease renewer stopping");
                break;
            }
            _ = tokio::time::sleep(period) => {
                match endpoint.lease("renew", Some(&lease_id), None, None).await {
                    Ok(resp) if resp.status().is_success() => {}
                    Ok(resp) => {
                        error!(status = %resp.status(), "failed to renew state lease, giving up renewal loop");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to renew state lease, giving up renewal loop");
                        break;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl StateBackend for BlobStateBackend {
    async fn init(
        &self,
        subscription_id: &str,
        resource_group: &str,
        service_name: &str,
    ) -> Result<(), StateError> {
        if self.read_value().await?.is_some() {
            return Err(StateError::AlreadyInitialized(self.blob_path()));
        }
        let state = empty_state(subscription_id, resource_group, service_name);
        self.write_value(&state, None).await
    }

    async fn read(&self) -> Result<State, StateError> {
        self.read_value()
            .await?
            .ok_or_else(|| StateError::NotInitialized { path: self.blob_path() })
    }

    async fn write(&self, state: &State) -> Result<(), StateError> {
        let guard = self.renewer.lock().await;
        let lease_id = guard.as_ref().map(|r| r.lease_id.clone());
        self.write_value(state, lease_id.as_deref()).await
    }

    async fn lock(&self) -> Result<(), StateError> {
        let resp = self
            .endpoint
            .lease("acquire", None, Some(LEASE_DURATION_SECS), None)
            .await?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(StateError::AlreadyLocked(self.blob_path()));
        }
        if !resp.status().is_success() {
            return Err(StateError::LockFailed {
                path: self.blob_path(),
                reason: format!("acquire-lease returned {}", resp.status()),
            });
        }
        let lease_id = resp
            .headers()
            .get("x-ms-lease-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StateError::LockFailed {
                path: self.blob_path(),
                reason: "acquire-lease response carried no lease id".into(),
            })?
            .to_string();

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(renew_loop(self.endpoint.clone(), lease_id.clone(), stop_rx));
        *self.renewer.lock().await = Some(LeaseRenewer { stop: stop_tx, handle, lease_id });
        debug!(url = %self.endpoint.blob_url, "acquired blob state lease");
        Ok(())
    }

    async fn unlock(&self) -> Result<(), StateError> {
        let Some(renewer) = self.renewer.lock().await.take() else {
            return Ok(());
        };
        let _ = renewer.stop.send(());
        let _ = renewer.handle.await;
        let resp = self.endpoint.lease("release", Some(&renewer.lease_id), None, None).await?;
        if !resp.status().is_success() {
            return Err(StateError::Blob(format!("release-lease returned {}", resp.status())));
        }
        Ok(())
    }

    async fn force_unlock(&self) -> Result<(), StateError> {
        warn!(url = %self.endpoint.blob_url, "force-unlocking blob state lease");
        if let Some(renewer) = self.renewer.lock().await.take() {
            let _ = renewer.stop.send(());
            let _ = renewer.handle.await;
        }
        // A break period of zero ends the lease immediately regardless of
        // who currently holds it, recovering from a crashed apply that
        // never released its lease.
        let resp = self.endpoint.lease("break", None, None, Some(0)).await?;
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            return Err(StateError::Blob(format!("break-lease returned {}", resp.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(uri: &str) -> BlobStateBackend {
        // `uri` already carries scheme+host+port; splice it in place of the
        // `https://{account}.blob.core.windows.net` prefix `new` builds.
        let endpoint = BlobEndpoint {
            http: reqwest::Client::new(),
            blob_url: format!("{uri}/apimctl/state.json"),
            sas_token: "sv=2021-08-06&sig=test".to_string(),
        };
        BlobStateBackend { endpoint, renewer: Mutex::new(None) }
    }

    #[tokio::test]
    async fn read_missing_blob_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/apimctl/state\.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let backend = backend_for(&server.uri());
        assert!(backend.read_value().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let server = MockServer::start().await;
        let state = empty_state("sub", "rg", "svc");
        let body = serde_json::to_vec(&state).unwrap();

        Mock::given(method("PUT"))
            .and(path_regex(r"/apimctl/state\.json"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"/apimctl/state\.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let backend = backend_for(&server.uri());
        backend.write(&state).await.unwrap();
        let read_back = backend.read().await.unwrap();
        assert_eq!(read_back.subscription_id, "sub");
    }

    #[tokio::test]
    async fn lock_conflict_surfaces_already_locked() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(query_param("comp", "lease"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
        let backend = backend_for(&server.uri());
        let err = backend.lock().await.unwrap_err();
        assert!(matches!(err, StateError::AlreadyLocked(_)));
    }

    #[tokio::test]
    async fn lock_success_exposes_lease_id_for_write() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(query_param("comp", "lease"))
            .respond_with(ResponseTemplate::new(201).insert_header("x-ms-lease-id", "11111111-1111-1111-1111-111111111111"))
            .mount(&server)
            .await;
        let backend = backend_for(&server.uri());
        backend.lock().await.unwrap();
        let guard = backend.renewer.lock().await;
        assert_eq!(guard.as_ref().unwrap().lease_id, "11111111-1111-1111-1111-111111111111");
        drop(guard);
        backend.unlock().await.ok();
    }
}
