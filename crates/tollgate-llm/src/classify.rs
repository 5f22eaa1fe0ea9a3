//! Error classification
//!
//! Maps adapter failures onto a fixed taxonomy with a user-facing message,
//! a retryable flag and a suggested action. Structured facts (typed variants,
//! provider error codes, HTTP status) win over keyword matching; anything left
//! over is `Unknown`. Classification never fails.

use crate::error::Error;
use crate::util::sanitize_error_for_user;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Error Kind
// ============================================================================

/// Stable error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials missing or rejected
    Authentication,
    /// Credentials valid but not allowed to do this
    PermissionDenied,
    /// Provider throttled the request
    RateLimited,
    /// Request rejected as malformed
    InvalidRequest,
    /// Model unknown to the provider
    ModelNotFound,
    /// Conflicting concurrent request
    Conflict,
    /// Well-formed but semantically rejected
    Unprocessable,
    /// Provider-side failure
    InternalServerError,
    /// Attempt exceeded its deadline
    Timeout,
    /// Provider unreachable
    ConnectionError,
    /// Account quota or credit exhausted
    QuotaExceeded,
    /// Nothing matched
    Unknown,
}

impl ErrorKind {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
            Self::ModelNotFound => "model_not_found",
            Self::Conflict => "conflict",
            Self::Unprocessable => "unprocessable",
            Self::InternalServerError => "internal_server_error",
            Self::Timeout => "timeout",
            Self::ConnectionError => "connection_error",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Unknown => "unknown",
        }
    }

    /// Transient failures that may succeed on retry
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::Timeout
                | Self::ConnectionError
                | Self::InternalServerError
                | Self::Conflict
        )
    }

    /// Failures tied to one provider's account or model list
    ///
    /// Another provider can serve the same request, so these trigger fallback
    /// even though retrying the same provider is pointless.
    #[must_use]
    pub fn is_provider_scoped(&self) -> bool {
        matches!(
            self,
            Self::Authentication | Self::PermissionDenied | Self::QuotaExceeded | Self::ModelNotFound
        )
    }

    /// Whether an unpinned request should move on to the next provider
    #[must_use]
    pub fn triggers_fallback(&self) -> bool {
        self.is_retryable() || self.is_provider_scoped()
    }

    /// Message safe to show an end user
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Authentication => "The model provider rejected the gateway's credentials.",
            Self::PermissionDenied => "The gateway is not permitted to use this model or feature.",
            Self::RateLimited => "The model provider is rate limiting requests.",
            Self::InvalidRequest => "The request was rejected as invalid by the model provider.",
            Self::ModelNotFound => "The requested model does not exist or is not available.",
            Self::Conflict => "The request conflicted with another in-flight request.",
            Self::Unprocessable => "The model provider could not process this request.",
            Self::InternalServerError => "The model provider encountered an internal error.",
            Self::Timeout => "The model provider did not respond in time.",
            Self::ConnectionError => "Could not connect to the model provider.",
            Self::QuotaExceeded => "The provider account has run out of quota or credit.",
            Self::Unknown => "An unexpected error occurred while calling the model provider.",
        }
    }

    /// What the caller (or operator) should do next
    #[must_use]
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the provider API key configured for the gateway.",
            Self::PermissionDenied => "Use a model your account has access to.",
            Self::RateLimited => "Wait a moment and retry, or use a different provider.",
            Self::InvalidRequest => "Check the prompt, parameters and response ceiling.",
            Self::ModelNotFound => "Pick a model from the provider's model list.",
            Self::Conflict => "Retry the request.",
            Self::Unprocessable => "Rephrase or shorten the request and try again.",
            Self::InternalServerError => "Retry shortly; the provider should recover.",
            Self::Timeout => "Retry, or lower the response ceiling.",
            Self::ConnectionError => "Check network connectivity and retry.",
            Self::QuotaExceeded => "Top up the provider account or use another provider.",
            Self::Unknown => "Retry later; contact the operator if it persists.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Classified Error
// ============================================================================

/// A provider failure expressed in the stable taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    /// Taxonomy kind
    pub kind: ErrorKind,
    /// Message safe for end users
    pub user_message: String,
    /// Whether retrying may help
    pub retryable: bool,
    /// Next step for the caller
    pub suggested_action: String,
    /// Provider that produced the failure, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// HTTP status, when the transport exposed one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Seconds the provider asked us to wait
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Sanitized original error text
    pub detail: String,
}

impl ClassifiedError {
    /// Build from a kind with canonical message and action
    #[must_use]
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            user_message: kind.user_message().to_string(),
            retryable: kind.is_retryable(),
            suggested_action: kind.suggested_action().to_string(),
            provider: None,
            status: None,
            retry_after: None,
            detail: sanitize_error_for_user(&detail.into()),
        }
    }

    /// Attach the provider id
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{} ({}): {}", self.kind, provider, self.user_message),
            None => write!(f, "{}: {}", self.kind, self.user_message),
        }
    }
}

impl std::error::Error for ClassifiedError {}

// ============================================================================
// Classification
// ============================================================================

/// Classify an adapter error
#[must_use]
pub fn classify(error: &Error) -> ClassifiedError {
    let detail = error.to_string();
    let (kind, status, retry_after) = match error {
        Error::Timeout(_) => (ErrorKind::Timeout, None, None),
        Error::RateLimit { retry_after } => (ErrorKind::RateLimited, Some(429), *retry_after),
        Error::Network(msg) => {
            let lower = msg.to_lowercase();
            if lower.contains("timed out") || lower.contains("timeout") {
                (ErrorKind::Timeout, None, None)
            } else {
                (ErrorKind::ConnectionError, None, None)
            }
        }
        Error::ProviderApi {
            status,
            code,
            message,
        } => {
            let kind = code
                .as_deref()
                .and_then(kind_from_code)
                .or_else(|| status.and_then(kind_from_status))
                .unwrap_or_else(|| kind_from_message(message));
            (kind, *status, None)
        }
        Error::NotConfigured(_) => (ErrorKind::Authentication, None, None),
        Error::InvalidResponse(_) => (ErrorKind::InternalServerError, None, None),
        Error::Api(msg) | Error::Provider(msg) => (kind_from_message(msg), None, None),
        Error::Cancelled | Error::Cache(_) | Error::Catalog(_) => (ErrorKind::Unknown, None, None),
    };

    let mut classified = ClassifiedError::new(kind, detail);
    classified.status = status;
    classified.retry_after = retry_after;
    classified
}

/// Classify free text from a provider or transport
#[must_use]
pub fn classify_message(message: &str) -> ClassifiedError {
    ClassifiedError::new(kind_from_message(message), message)
}

fn kind_from_code(code: &str) -> Option<ErrorKind> {
    let kind = match code.to_ascii_lowercase().as_str() {
        "invalid_api_key" | "authentication_error" | "invalid_authentication" | "unauthorized" => {
            ErrorKind::Authentication
        }
        "permission_error" | "permission_denied" | "forbidden" => ErrorKind::PermissionDenied,
        "rate_limit_exceeded" | "rate_limit_error" | "rate_limited" => ErrorKind::RateLimited,
        "insufficient_quota" | "quota_exceeded" | "billing_hard_limit_reached"
        | "insufficient_balance" => ErrorKind::QuotaExceeded,
        "model_not_found" | "not_found_error" => ErrorKind::ModelNotFound,
        "invalid_request_error" | "invalid_request" | "context_length_exceeded" => {
            ErrorKind::InvalidRequest
        }
        "overloaded_error" | "api_error" | "server_error" | "internal_error" => {
            ErrorKind::InternalServerError
        }
        "timeout" | "request_timeout" => ErrorKind::Timeout,
        "conflict" => ErrorKind::Conflict,
        "unprocessable_entity" => ErrorKind::Unprocessable,
        _ => return None,
    };
    Some(kind)
}

fn kind_from_status(status: u16) -> Option<ErrorKind> {
    let kind = match status {
        400 => ErrorKind::InvalidRequest,
        401 => ErrorKind::Authentication,
        402 => ErrorKind::QuotaExceeded,
        403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::ModelNotFound,
        408 | 504 => ErrorKind::Timeout,
        409 => ErrorKind::Conflict,
        422 => ErrorKind::Unprocessable,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::InternalServerError,
        _ => return None,
    };
    Some(kind)
}

/// Whether `code` appears as a standalone number in `text`
fn has_status_code(text: &str, code: &str) -> bool {
    text.split(|c: char| !c.is_ascii_digit())
        .any(|token| token == code)
}

fn kind_from_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    let code = |codes: &[&str]| codes.iter().any(|c| has_status_code(&lower, c));

    if any(&["quota", "billing", "credit balance", "insufficient balance"]) || code(&["402"]) {
        ErrorKind::QuotaExceeded
    } else if any(&["rate limit", "rate_limit", "too many requests"]) || code(&["429"]) {
        ErrorKind::RateLimited
    } else if any(&["timed out", "timeout", "deadline exceeded"]) || code(&["408", "504"]) {
        ErrorKind::Timeout
    } else if any(&[
        "unauthorized",
        "unauthenticated",
        "invalid api key",
        "invalid_api_key",
        "authentication",
        "api key",
    ]) || code(&["401"])
    {
        ErrorKind::Authentication
    } else if any(&["permission", "forbidden", "access denied", "not allowed"]) || code(&["403"]) {
        ErrorKind::PermissionDenied
    } else if any(&[
        "model not found",
        "model_not_found",
        "does not exist",
        "unknown model",
        "no such model",
    ]) || code(&["404"])
    {
        ErrorKind::ModelNotFound
    } else if any(&[
        "connection",
        "connect",
        "dns",
        "network",
        "unreachable",
        "reset by peer",
        "broken pipe",
    ]) {
        ErrorKind::ConnectionError
    } else if any(&["conflict"]) || code(&["409"]) {
        ErrorKind::Conflict
    } else if any(&["unprocessable"]) || code(&["422"]) {
        ErrorKind::Unprocessable
    } else if any(&[
        "internal server error",
        "internal error",
        "server error",
        "bad gateway",
        "service unavailable",
        "overloaded",
    ]) || code(&["500", "502", "503"])
    {
        ErrorKind::InternalServerError
    } else if any(&[
        "invalid request",
        "invalid_request",
        "bad request",
        "malformed",
        "context length",
    ]) || code(&["400"])
    {
        ErrorKind::InvalidRequest
    } else {
        ErrorKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: Option<u16>, code: Option<&str>, message: &str) -> Error {
        Error::ProviderApi {
            status,
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_retryable_partition() {
        let retryable = [
            ErrorKind::RateLimited,
            ErrorKind::Timeout,
            ErrorKind::ConnectionError,
            ErrorKind::InternalServerError,
            ErrorKind::Conflict,
        ];
        let terminal = [
            ErrorKind::Authentication,
            ErrorKind::PermissionDenied,
            ErrorKind::InvalidRequest,
            ErrorKind::ModelNotFound,
            ErrorKind::Unprocessable,
            ErrorKind::Unknown,
        ];
        assert!(retryable.iter().all(ErrorKind::is_retryable));
        assert!(!terminal.iter().any(ErrorKind::is_retryable));
    }

    #[test]
    fn test_typed_variants() {
        assert_eq!(classify(&Error::Timeout(30_000)).kind, ErrorKind::Timeout);
        assert_eq!(
            classify(&Error::Network("connection refused".into())).kind,
            ErrorKind::ConnectionError
        );
        let limited = classify(&Error::RateLimit {
            retry_after: Some(12),
        });
        assert_eq!(limited.kind, ErrorKind::RateLimited);
        assert!(limited.retryable);
        assert_eq!(limited.retry_after, Some(12));
    }

    #[test]
    fn test_code_wins_over_status() {
        let quota = classify(&api(Some(429), Some("insufficient_quota"), "You exceeded..."));
        assert_eq!(quota.kind, ErrorKind::QuotaExceeded);
        assert!(!quota.retryable);
        assert_eq!(quota.status, Some(429));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (400, ErrorKind::InvalidRequest),
            (401, ErrorKind::Authentication),
            (403, ErrorKind::PermissionDenied),
            (404, ErrorKind::ModelNotFound),
            (409, ErrorKind::Conflict),
            (422, ErrorKind::Unprocessable),
            (429, ErrorKind::RateLimited),
            (503, ErrorKind::InternalServerError),
            (504, ErrorKind::Timeout),
        ];
        for (status, kind) in cases {
            assert_eq!(classify(&api(Some(status), None, "x")).kind, kind, "{status}");
        }
    }

    #[test]
    fn test_anthropic_error_types() {
        assert_eq!(
            classify(&api(Some(529), Some("overloaded_error"), "Overloaded")).kind,
            ErrorKind::InternalServerError
        );
        assert_eq!(
            classify(&api(Some(404), Some("not_found_error"), "model: x")).kind,
            ErrorKind::ModelNotFound
        );
    }

    #[test]
    fn test_keyword_fallback_is_case_insensitive() {
        assert_eq!(
            classify(&Error::Api("RATE LIMIT reached for requests".into())).kind,
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify(&Error::Api("The model `gpt-9` does not exist".into())).kind,
            ErrorKind::ModelNotFound
        );
        assert_eq!(
            classify_message("Upstream returned 503 Service Unavailable").kind,
            ErrorKind::InternalServerError
        );
    }

    #[test]
    fn test_numbers_inside_words_do_not_match_status() {
        assert_eq!(
            classify_message("prompt of 5000 tokens failed").kind,
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_unknown_is_not_retryable() {
        let unknown = classify(&Error::Api("something odd happened".into()));
        assert_eq!(unknown.kind, ErrorKind::Unknown);
        assert!(!unknown.retryable);
        assert!(!unknown.user_message.is_empty());
        assert!(!unknown.suggested_action.is_empty());
    }

    #[test]
    fn test_detail_is_sanitized() {
        let classified = classify(&Error::Api("Incorrect API key provided: sk-abc...".into()));
        assert_eq!(classified.kind, ErrorKind::Authentication);
        assert!(!classified.detail.contains("sk-abc"));
    }

    #[test]
    fn test_fallback_triggers() {
        assert!(ErrorKind::Timeout.triggers_fallback());
        assert!(ErrorKind::QuotaExceeded.triggers_fallback());
        assert!(ErrorKind::Authentication.triggers_fallback());
        assert!(!ErrorKind::InvalidRequest.triggers_fallback());
        assert!(!ErrorKind::Unprocessable.triggers_fallback());
        assert!(!ErrorKind::Unknown.triggers_fallback());
    }

    #[test]
    fn test_display_includes_provider() {
        let e = ClassifiedError::new(ErrorKind::Timeout, "t").with_provider("groq");
        assert!(e.to_string().starts_with("timeout (groq)"));
    }
}
