//! Error types for tollgate-llm

use std::time::Duration;
use thiserror::Error;

/// LLM error type
///
/// Variants keep whatever structure the provider gave us (HTTP status, error
/// code) so the classifier can work from facts before falling back to text.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Structured error reported by a provider API
    #[error("provider api error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    ProviderApi {
        /// HTTP status, when the transport exposed one
        status: Option<u16>,
        /// Provider error code or type (e.g. `insufficient_quota`)
        code: Option<String>,
        /// Sanitized provider message
        message: String,
    },

    /// Unstructured API error
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit {
        /// Seconds until retry is allowed, from `retry-after`
        retry_after: Option<u64>,
    },

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Provider-side failure outside the API contract (client construction, etc.)
    #[error("provider error: {0}")]
    Provider(String),

    /// Attempt abandoned because the caller cancelled
    #[error("request cancelled")]
    Cancelled,

    /// Cache backend error
    #[error("cache error: {0}")]
    Cache(String),

    /// Catalog could not be loaded
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl Error {
    /// Map a transport error, keeping the timeout/connect distinction
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Error::Timeout(timeout.as_millis() as u64);
        }
        if err.is_connect() {
            return Error::Network(format!("connection failed: {err}"));
        }
        if let Some(status) = err.status() {
            return Error::ProviderApi {
                status: Some(status.as_u16()),
                code: None,
                message: crate::util::sanitize_error_for_user(&err.to_string()),
            };
        }
        Error::Network(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
