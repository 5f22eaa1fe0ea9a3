//! Request, selection and outcome types for routing

use crate::classify::ClassifiedError;
use crate::completion::{CompletionResponse, GenerationParams};
use crate::message::Message;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request
// ============================================================================

/// What the provider is asked to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Invocation {
    /// Single prompt
    Generate {
        /// Prompt text
        prompt: String,
    },
    /// Multi-turn conversation
    Chat {
        /// Ordered messages
        messages: Vec<Message>,
    },
}

/// A routed call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Prompt or conversation
    pub invocation: Invocation,
    /// Pinned provider; disables fallback
    pub provider: Option<String>,
    /// Model for the selected provider
    pub model: Option<String>,
    /// Response ceiling
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
}

impl RouteRequest {
    fn with_invocation(invocation: Invocation) -> Self {
        Self {
            invocation,
            provider: None,
            model: None,
            max_tokens: None,
            temperature: None,
            stop: None,
        }
    }

    /// Single-prompt request
    #[must_use]
    pub fn generate(prompt: impl Into<String>) -> Self {
        Self::with_invocation(Invocation::Generate {
            prompt: prompt.into(),
        })
    }

    /// Chat request
    #[must_use]
    pub fn chat(messages: Vec<Message>) -> Self {
        Self::with_invocation(Invocation::Chat { messages })
    }

    /// Pin a provider
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Request a model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the response ceiling
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Generation parameters for an attempt against `model`
    #[must_use]
    pub fn params_for(&self, model: &str) -> GenerationParams {
        GenerationParams {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop: self.stop.clone(),
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// The primary provider/model chosen for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Provider id
    pub provider: String,
    /// Model name
    pub model: String,
    /// The caller pinned the provider
    pub pinned: bool,
}

// ============================================================================
// Outcome
// ============================================================================

/// One provider attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Provider tried
    pub provider: String,
    /// Model tried
    pub model: String,
    /// Failure, `None` when the attempt succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
    /// Wall time of the attempt
    pub latency_ms: u64,
}

impl AttemptRecord {
    /// Whether this attempt produced the response
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A provider answered
#[derive(Debug, Clone)]
pub struct RouteSuccess {
    /// Normalized provider response
    pub response: CompletionResponse,
    /// Provider that answered
    pub provider: String,
    /// Model that answered
    pub model: String,
    /// Answer came from a provider other than the primary
    pub fallback_occurred: bool,
    /// Primary failure that caused the fallback
    pub originating_error: Option<ClassifiedError>,
    /// Every attempt, in order, ending with the successful one
    pub attempts: Vec<AttemptRecord>,
    /// Total routing time
    pub latency_ms: u64,
}

/// Every attempt failed
#[derive(Debug, Clone)]
pub struct RouteFailure {
    /// Error of the last attempt
    pub error: ClassifiedError,
    /// Provider of the last attempt
    pub provider: String,
    /// Model of the last attempt
    pub model: String,
    /// Every attempt, in order
    pub attempts: Vec<AttemptRecord>,
}

/// Result of routing one logical request
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    /// A provider answered
    Completed(RouteSuccess),
    /// No adapter could be selected
    NoProvider {
        /// Machine-readable reason (`provider_not_available`)
        reason: String,
        /// Provider the caller pinned, if any
        requested: Option<String>,
    },
    /// Attempts were made and all failed
    Failed(RouteFailure),
    /// The caller cancelled
    Cancelled {
        /// Attempts finished before cancellation
        attempts: Vec<AttemptRecord>,
    },
}
