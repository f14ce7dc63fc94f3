//! Okta client error types.
//!
//! Every non-2xx response is classified by HTTP status so the reconciliation
//! core can decide between retrying, suppressing and surfacing the failure
//! without knowing anything about reqwest.

use serde::Deserialize;
use thiserror::Error;

/// Errors returned by the Okta management API client.
#[derive(Debug, Error)]
pub enum OktaClientError {
    /// Transport-level failure (connection refused, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 404 from the API.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// 409 from the API.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 429 from the API.
    #[error("Rate limited by Okta (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// 401 from the API.
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// 403 from the API.
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Any other non-success status.
    #[error("Okta API error ({status}) {error_code}: {summary}")]
    Api {
        status: u16,
        error_code: String,
        summary: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The client was configured with invalid values.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for client operations.
pub type OktaClientResult<T> = Result<T, OktaClientError>;

impl OktaClientError {
    /// HTTP status carried by this error, if it came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::RateLimited { .. } => Some(429),
            Self::AuthError(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::ParseError(_) | Self::InvalidConfig(_) => None,
        }
    }

    /// Whether the error is a 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the failure happened before any response was received.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(e) if e.status().is_none())
    }

    /// Build an error from a non-success status and the raw response body.
    ///
    /// Okta error bodies look like
    /// `{"errorCode":"E0000007","errorSummary":"Not found: ...","errorCauses":[...]}`;
    /// when the body does not parse, the raw text is used as the summary.
    #[must_use]
    pub fn from_response(status: u16, body: &str, retry_after_secs: Option<u64>) -> Self {
        let parsed: Option<OktaErrorBody> = serde_json::from_str(body).ok();
        let summary = parsed
            .as_ref()
            .map(OktaErrorBody::describe)
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.to_string()
                }
            });

        match status {
            404 => Self::NotFound(summary),
            409 => Self::Conflict(summary),
            429 => Self::RateLimited { retry_after_secs },
            401 => Self::AuthError(summary),
            403 => Self::Forbidden(summary),
            _ => Self::Api {
                status,
                error_code: parsed
                    .and_then(|p| p.error_code)
                    .unwrap_or_else(|| "unknown".to_string()),
                summary,
            },
        }
    }
}

impl From<serde_json::Error> for OktaClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseError(e.to_string())
    }
}

/// Okta's standard error envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OktaErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_summary: Option<String>,
    #[serde(default)]
    error_causes: Vec<OktaErrorCause>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OktaErrorCause {
    #[serde(default)]
    error_summary: Option<String>,
}

impl OktaErrorBody {
    fn describe(&self) -> String {
        let mut text = self
            .error_summary
            .clone()
            .unwrap_or_else(|| "no summary".to_string());
        let causes: Vec<&str> = self
            .error_causes
            .iter()
            .filter_map(|c| c.error_summary.as_deref())
            .collect();
        if !causes.is_empty() {
            text.push_str(" (");
            text.push_str(&causes.join("; "));
            text.push(')');
        }
        text
    }
}
