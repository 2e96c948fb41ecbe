// SPDX-License-Identifier: MIT OR Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Classification, TransportError, classify};
use crate::token::TokenSource;

const API_VERSION: &str = "2024-05-01";
const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// A thin REST client for the gateway management API: builds the base URL
/// from the deployment's coordinates, attaches a bearer token from a
/// [`TokenSource`], and wraps every call in the retry envelope described by
/// [`crate::error::classify`].
pub struct ApimClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl ApimClient {
    pub fn new(
        http: reqwest::Client,
        subscription_id: &str,
        resource_group: &str,
        service_name: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        let base_url = format!(
            "https://management.azure.com/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.ApiManagement/service/{service_name}"
        );
        Self { http, base_url, tokens }
    }

    fn url(&self, path: &str) -> String {
        let sep = if path.contains('?') { "&" } else { "?" };
        format!("{}{}{sep}api-version={API_VERSION}", self.base_url, path)
    }

    /// `GET` a single resource.
    pub async fn get(&self, path: &str) -> Result<Option<Value>, TransportError> {
        match self.request(Method::GET, path, None).await? {
            Some(resp) => Ok(Some(resp)),
            None => Ok(None),
        }
    }

    /// `GET` a collection, following `nextLink` pages until exhausted.
    pub async fn list(&self, path: &str) -> Result<Vec<Value>, TransportError> {
        let mut items = Vec::new();
        let mut next = self.url(path);
        loop {
            let resp = self.request_raw(Method::GET, &next, None).await?;
            let Some(body) = resp else { break };
            if let Some(values) = body.get("value").and_then(Value::as_array) {
                items.extend(values.iter().cloned());
            }
            match body.get("nextLink").and_then(Value::as_str) {
                Some(link) => next = link.to_string(),
                None => break,
            }
        }
        Ok(items)
    }

    /// `PUT` (create or replace) a resource.
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        match self.request(Method::PUT, path, Some(body)).await? {
            Some(v) => Ok(v),
            None => Ok(Value::Null),
        }
    }

    /// `DELETE` a resource. A 404 is treated as success: the resource is
    /// already absent, which is the desired end state.
    pub async fn delete(&self, path: &str) -> Result<(), TransportError> {
        let url = self.url(path);
        match self.execute_with_retry(Method::DELETE, &url, None).await {
            Ok(_) => Ok(()),
            Err(TransportError::Api { status, .. }) if status == StatusCode::NOT_FOUND => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, TransportError> {
        let url = self.url(path);
        self.request_raw(method, &url, body).await
    }

    async fn request_raw(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, TransportError> {
        match self.execute_with_retry(method.clone(), url, body).await {
            Ok(v) => Ok(v),
            Err(TransportError::Api { status, .. })
                if status == StatusCode::NOT_FOUND && method == Method::GET =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn execute_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, TransportError> {
        let mut backoff = INITIAL_BACKOFF;
        for attempt in 0..=MAX_RETRIES {
            let (token, _expiry) = self.tokens.token().await?;
            let mut req = self.http.request(method.clone(), url).bearer_auth(token);
            if let Some(b) = body {
                req = req.json(b);
            }
            let resp = req.send().await?;
            let status = resp.status();

            if status.is_success() {
                if status == StatusCode::NO_CONTENT {
                    return Ok(None);
                }
                let value: Value = resp.json().await.unwrap_or(Value::Null);
                return Ok(Some(value));
            }

            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let request_id = resp
                .headers()
                .get("x-ms-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let error_body: Value = resp.json().await.unwrap_or(Value::Null);
            let error_code = error_body
                .get("error")
                .and_then(|e| e.get("code"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let message = error_body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();

            let classification = classify(method.as_str(), status, &error_code);
            let err = TransportError::Api {
                status,
                method: method.to_string(),
                target: url.to_string(),
                message,
                error_code,
                request_id: if request_id.is_empty() {
                    String::new()
                } else {
                    format!(" (req-id: {request_id})")
                },
                classification,
            };

            if classification != Classification::Transient || attempt == MAX_RETRIES {
                return Err(err);
            }

            let wait = retry_after
                .as_deref()
                .and_then(parse_retry_after)
                .unwrap_or(backoff);
            warn!(attempt, ?wait, %url, "transient error, retrying");
            tokio::time::sleep(wait).await;
            backoff *= 2;
        }
        unreachable!("loop always returns on its last iteration")
    }
}

/// Parses a `Retry-After` header value: either an integer number of
/// seconds, or an HTTP-date. The resulting delay is floored at 1 second so
/// a stale or past date never collapses the wait to zero.
fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs.max(1)));
    }
    let when = chrono::DateTime::parse_from_rfc2822(value.trim()).ok()?;
    let now = chrono::Utc::now();
    let delta = when.with_timezone(&chrono::Utc) - now;
    let secs = delta.num_seconds().max(1) as u64;
    debug!(secs, "parsed Retry-After as HTTP-date");
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_retry_after() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn parses_http_date_retry_after() {
        let future = chrono::Utc::now() + chrono::Duration::seconds(30);
        let formatted = future.to_rfc2822();
        let parsed = parse_retry_after(&formatted).unwrap();
        assert!(parsed.as_secs() <= 30 && parsed.as_secs() >= 28);
    }

    #[test]
    fn rejects_garbage_retry_after() {
        assert_eq!(parse_retry_after("not-a-time"), None);
    }
}
