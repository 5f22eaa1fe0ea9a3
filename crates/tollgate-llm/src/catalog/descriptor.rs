//! Model descriptors and capability flags

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Capability
// ============================================================================

/// Feature a model supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Plain text generation
    Text,
    /// Image input
    Vision,
    /// Tool / function calling
    FunctionCalling,
    /// Streamed responses
    Streaming,
    /// Extended reasoning
    Reasoning,
}

impl Capability {
    /// Wire name of the capability
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Vision => "vision",
            Self::FunctionCalling => "function_calling",
            Self::Streaming => "streaming",
            Self::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Model Tier
// ============================================================================

/// Cost tier derived from the input price
///
/// Tiers are ordered by cost (ascending):
/// - UltraBudget: < $0.15/M tokens
/// - Fast: $0.15 ~ $1.00/M tokens
/// - Standard: $1.00 ~ $5.00/M tokens
/// - Premium: >= $5.00/M tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Ultra-budget models for trivial tasks
    UltraBudget,
    /// Fast, cheap models
    Fast,
    /// Balanced models
    Standard,
    /// Premium models for complex reasoning
    Premium,
}

impl ModelTier {
    /// Classify an input price (USD per million units)
    #[must_use]
    pub fn from_input_cost(cost_per_million: f64) -> Self {
        if cost_per_million < 0.15 {
            Self::UltraBudget
        } else if cost_per_million < 1.0 {
            Self::Fast
        } else if cost_per_million < 5.0 {
            Self::Standard
        } else {
            Self::Premium
        }
    }

    /// Standard and Premium models count as high-cost
    #[must_use]
    pub fn is_high_cost(&self) -> bool {
        matches!(self, Self::Standard | Self::Premium)
    }

    /// Get the price range description for this tier
    #[must_use]
    pub fn price_range(&self) -> &'static str {
        match self {
            Self::UltraBudget => "< $0.15/M tokens",
            Self::Fast => "$0.15 ~ $1.00/M tokens",
            Self::Standard => "$1.00 ~ $5.00/M tokens",
            Self::Premium => ">= $5.00/M tokens",
        }
    }
}

// ============================================================================
// Model Descriptor
// ============================================================================

fn default_true() -> bool {
    true
}

/// Pricing and capability record for one (provider, model) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Provider id (e.g. "openai")
    pub provider: String,
    /// Model name as the provider knows it
    pub model: String,
    /// Cost per 1M input units (USD)
    pub input_cost_per_million: f64,
    /// Cost per 1M output units (USD)
    pub output_cost_per_million: f64,
    /// Largest response the model can produce
    pub max_output_tokens: u32,
    /// Context window size
    pub context_window: u32,
    /// Supported features
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Inactive descriptors are ignored by lookups
    #[serde(default = "default_true")]
    pub active: bool,
}

impl ModelDescriptor {
    /// Create an active text model with the given prices
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        input_cost_per_million: f64,
        output_cost_per_million: f64,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            input_cost_per_million,
            output_cost_per_million,
            max_output_tokens: 4096,
            context_window: 128_000,
            capabilities: vec![Capability::Text],
            active: true,
        }
    }

    /// Set context window and response ceiling
    #[must_use]
    pub fn with_limits(mut self, context_window: u32, max_output_tokens: u32) -> Self {
        self.context_window = context_window;
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Replace the capability set
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    /// Mark as inactive
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Calculate cost for given token counts
    #[must_use]
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input_cost + output_cost
    }

    /// Price a unit count whose input/output split is not yet known
    ///
    /// Uses the higher of the two prices so pre-call estimates never undercount.
    #[must_use]
    pub fn upper_bound_cost(&self, units: u64) -> f64 {
        let rate = self
            .input_cost_per_million
            .max(self.output_cost_per_million);
        (units as f64 / 1_000_000.0) * rate
    }

    /// Whether the model supports a capability
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Cost tier of this model
    #[must_use]
    pub fn tier(&self) -> ModelTier {
        ModelTier::from_input_cost(self.input_cost_per_million)
    }

    /// Combined per-million price used to rank models
    #[must_use]
    pub fn blended_cost(&self) -> f64 {
        self.input_cost_per_million + self.output_cost_per_million
    }
}
