// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bearer token acquisition, abstracted behind [`TokenSource`] so the
//! transport crate never depends on a specific identity provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::TransportError;

/// A capability that can produce a bearer token and its expiry.
///
/// Concrete sources decide how to acquire and cache the token; callers of
/// [`Token::acquire`] always get a token that is valid for at least the
/// next 60 seconds (see [`CachingTokenSource`]).
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<(String, DateTime<Utc>), TransportError>;
}

const REFRESH_SKEW: chrono::Duration = chrono::Duration::seconds(60);

/// Wraps an inner [`TokenSource`] with a cache that refreshes 60 seconds
/// before expiry, mirroring the management client's own token cache.
pub struct CachingTokenSource<T> {
    inner: T,
    cached: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl<T: TokenSource> CachingTokenSource<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<T: TokenSource> TokenSource for CachingTokenSource<T> {
    async fn token(&self) -> Result<(String, DateTime<Utc>), TransportError> {
        let mut guard = self.cached.lock().await;
        if let Some((token, expiry)) = guard.as_ref() {
            if Utc::now() < *expiry - REFRESH_SKEW {
                return Ok((token.clone(), *expiry));
            }
        }
        let fresh = self.inner.token().await?;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }
}

/// Reads a pre-acquired bearer token and its expiry from the environment.
///
/// This is the "default credential chain" equivalent for this crate: no
/// identity SDK is pulled in, and instead a process wrapper (or the
/// operator) is expected to place a valid token and its expiry timestamp
/// into the environment before invoking this tool, the same way a CI
/// pipeline step commonly hands a short-lived token to the next step.
pub struct EnvTokenSource {
    token_var: String,
    expiry_var: String,
}

impl EnvTokenSource {
    pub fn new(token_var: impl Into<String>, expiry_var: impl Into<String>) -> Self {
        Self {
            token_var: token_var.into(),
            expiry_var: expiry_var.into(),
        }
    }
}

#[async_trait]
impl TokenSource for EnvTokenSource {
    async fn token(&self) -> Result<(String, DateTime<Utc>), TransportError> {
        let token = std::env::var(&self.token_var)
            .map_err(|_| TransportError::Auth(format!("{} is not set", self.token_var)))?;
        let expiry_raw = std::env::var(&self.expiry_var)
            .map_err(|_| TransportError::Auth(format!("{} is not set", self.expiry_var)))?;
        let expiry = DateTime::parse_from_rfc3339(&expiry_raw)
            .map_err(|e| TransportError::Auth(format!("invalid {}: {e}", self.expiry_var)))?
            .with_timezone(&Utc);
        Ok((token, expiry))
    }
}

/// Acquires a token via the OAuth2 client-credentials grant against a
/// token endpoint, the manual equivalent of a confidential-client
/// credential in an identity SDK.
pub struct ClientCredentialTokenSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientCredentialTokenSource {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
        }
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[async_trait]
impl TokenSource for ClientCredentialTokenSource {
    async fn token(&self) -> Result<(String, DateTime<Utc>), TransportError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let resp = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TransportError::Auth(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TransportError::Auth(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }
        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::Auth(e.to_string()))?;
        let expiry = Utc::now() + chrono::Duration::seconds(parsed.expires_in);
        Ok((parsed.access_token, expiry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn token(&self) -> Result<(String, DateTime<Utc>), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(("tok".to_string(), Utc::now() + chrono::Duration::minutes(5)))
        }
    }

    #[tokio::test]
    async fn caches_token_until_near_expiry() {
        let source = CachingTokenSource::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (t1, _) = source.token().await.unwrap();
        let (t2, _) = source.token().await.unwrap();
        assert_eq!(t1, t2);
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 1);
    }
}
