// SPDX-License-Identifier: MIT OR Apache-2.0
use reqwest::StatusCode;

/// Whether a failed REST call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Transient,
    Permanent,
}

/// An error surfaced by a REST call against the management API, after
/// retries (if any) have been exhausted.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{status} on {method} {target}: {message} [{error_code}]{request_id}")]
    Api {
        status: StatusCode,
        method: String,
        target: String,
        message: String,
        error_code: String,
        request_id: String,
        classification: Classification,
    },

    #[error("request build or send failure: {0}")]
    Request(#[from] reqwest::Error),

    #[error("exclusive lock not held or already released")]
    NotLocked,

    #[error("token acquisition failed: {0}")]
    Auth(String),
}

impl TransportError {
    pub fn classification(&self) -> Option<Classification> {
        match self {
            TransportError::Api { classification, .. } => Some(*classification),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.classification(), Some(Classification::Transient))
    }
}

/// Classifies a response by method and status code, per the management
/// API's documented error taxonomy:
///
/// - 429, 412, and any 5xx are always transient.
/// - 409 is transient only when `error_code` (the control plane's own
///   machine-readable error string, distinct from the HTTP status) contains
///   `"PessimisticConcurrencyConflict"` or `"Conflict"`.
/// - 422 is transient only when `error_code` contains `"ManagementApiFailure"`.
/// - 400, 401, 403 and 404 are permanent, *except* a 404 on a `DELETE`
///   request, which is treated as success (the resource is already gone)
///   rather than as an error at all — callers should check for that case
///   before calling into this classifier.
pub fn classify(method: &str, status: StatusCode, error_code: &str) -> Classification {
    let code = status.as_u16();
    if code == 429 || code == 412 || status.is_server_error() {
        return Classification::Transient;
    }
    if code == 409 {
        let transient_markers = ["PessimisticConcurrencyConflict", "Conflict"];
        if transient_markers.iter().any(|m| error_code.contains(m)) {
            return Classification::Transient;
        }
        return Classification::Permanent;
    }
    if code == 422 {
        if error_code.contains("ManagementApiFailure") {
            return Classification::Transient;
        }
        return Classification::Permanent;
    }
    if code == 404 && method.eq_ignore_ascii_case("DELETE") {
        // Callers treat this as success before reaching classification;
        // if it does arrive here it is not retryable.
        return Classification::Permanent;
    }
    Classification::Permanent
}
