//! Gateway inputs and outputs

use crate::optimizer::{Optimization, OptimizerConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tollgate_llm::{AttemptRecord, Capability, ClassifiedError, ProviderStatus, TokenUsage};

fn default_user() -> String {
    "anonymous".to_string()
}

/// The `gateway` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// User id billed when the caller supplies none
    #[serde(default = "default_user")]
    pub default_user: String,
    /// Optimizer thresholds
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_user: default_user(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// Per-call options shared by `generate` and `chat`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// User to bill
    pub user_id: Option<String>,
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

impl RequestOptions {
    /// Options with every field unset
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bill a user
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
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

    /// Set stop sequences
    #[must_use]
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

/// Everything about how a result was produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Request id, also attached to logs
    pub request_id: String,
    /// Why generation stopped
    pub finish_reason: Option<String>,
    /// A provider other than the primary answered
    pub fallback_occurred: bool,
    /// Primary failure behind a fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_error: Option<ClassifiedError>,
    /// Served from a response cache (responses are never cached here)
    pub cached: bool,
    /// No provider was called; content is a placeholder
    pub mock: bool,
    /// Why the result is a placeholder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Plan, usage or accounting data was unavailable somewhere on the path
    pub degraded: bool,
    /// Usage was estimated because the provider reported none
    pub usage_estimated: bool,
    /// Optimizations applied or suggested
    pub optimizations: Vec<Optimization>,
    /// Cost charged (USD)
    pub cost: f64,
    /// End-to-end latency
    pub latency_ms: u64,
    /// Every provider attempt, in order
    pub attempts: Vec<AttemptRecord>,
}

/// Normalized answer to `generate` / `chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated text
    pub content: String,
    /// Provider used
    pub provider: String,
    /// Model used
    pub model: String,
    /// Units consumed
    pub usage: TokenUsage,
    /// How it was produced
    pub metadata: ResponseMetadata,
}

/// One entry of `list_providers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider id
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Supported features
    pub capabilities: Vec<Capability>,
    /// Default model, when the adapter exists
    pub default_model: Option<String>,
    /// Availability decided at startup
    #[serde(flatten)]
    pub status: ProviderStatus,
}

/// Overall health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Every provider is available
    Healthy,
    /// Some providers are available
    Degraded,
    /// No provider is available
    Unhealthy,
}

/// Answer to `health_check`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status
    pub status: HealthStatus,
    /// Availability per provider id
    pub providers: BTreeMap<String, bool>,
}
