//! Error types for tollgate-core
//!
//! This module provides error types and user-friendly error formatting.

use crate::budget::BudgetDecision;
use thiserror::Error;
use tollgate_llm::ClassifiedError;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The request would exceed one or more budget ceilings
    #[error("budget exceeded: {}", .0.reasons.join(", "))]
    BudgetExceeded(Box<BudgetDecision>),

    /// The caller pinned a provider that is not registered
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The caller pinned a model the catalog does not know for that provider
    #[error("unknown model {model} for provider {provider}")]
    UnknownModel {
        /// Provider id
        provider: String,
        /// Requested model
        model: String,
    },

    /// Every provider attempt failed
    #[error("provider error: {0}")]
    Provider(ClassifiedError),

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// Malformed request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Usage store failure
    #[error("usage store error: {0}")]
    Store(String),

    /// Plan lookup failure
    #[error("plan error: {0}")]
    Plan(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// LLM layer error
    #[error("llm error: {0}")]
    Llm(#[from] tollgate_llm::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same request later could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider(classified) => classified.retryable,
            Error::Store(_) => true,
            _ => false,
        }
    }
}

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages and suggestions for fixing.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::BudgetExceeded(decision) => {
                let failed: Vec<String> = decision
                    .failed_checks()
                    .map(|c| {
                        format!(
                            "{} ({} of {} used, {} requested)",
                            c.kind, c.current, c.limit, c.requested
                        )
                    })
                    .collect();
                format!("💸 Budget exceeded: {}", failed.join("; "))
            }
            Error::UnknownProvider(id) => format!("🔌 Unknown provider '{}'.", id),
            Error::UnknownModel { provider, model } => {
                format!("🔌 Model '{}' is not available from '{}'.", model, provider)
            }
            Error::Provider(classified) => match &classified.provider {
                Some(provider) => format!("🤖 {} ({})", classified.user_message, provider),
                None => format!("🤖 {}", classified.user_message),
            },
            Error::Cancelled => "✋ Request cancelled.".to_string(),
            Error::InvalidRequest(msg) => format!("📋 Invalid request: {}", msg),
            Error::Store(_) => "📼 Usage could not be read or written.".to_string(),
            Error::Plan(_) => "📋 Subscription plan could not be resolved.".to_string(),
            Error::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
            Error::Llm(e) => format!("🤖 LLM error: {}", e),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::BudgetExceeded(decision) => decision
                .recommendations
                .first()
                .map(|r| format!("💡 {}", r)),
            Error::UnknownProvider(_) => {
                Some("💡 Run `tollgate providers` to see registered providers.".to_string())
            }
            Error::UnknownModel { provider, .. } => Some(format!(
                "💡 Run `tollgate models --provider {}` to see available models.",
                provider
            )),
            Error::Provider(classified) if !classified.suggested_action.is_empty() => {
                Some(format!("💡 {}", classified.suggested_action))
            }
            Error::Configuration(_) => Some(
                "💡 Check config/default.toml, config/local.toml or TOLLGATE_* environment variables."
                    .to_string(),
            ),
            Error::Store(_) => Some("💡 Check the usage database path and permissions.".to_string()),
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}
