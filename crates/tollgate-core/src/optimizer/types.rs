//! Optimizer configuration and results

use crate::budget::BudgetDecision;
use serde::{Deserialize, Serialize};
use tollgate_llm::Invocation;

fn default_prompt_warning_threshold() -> u32 {
    3000
}
fn default_small_prompt_threshold() -> u32 {
    500
}
fn default_min_response_tokens() -> u32 {
    16
}
fn default_response_ceiling() -> u32 {
    1024
}

/// The `gateway.optimizer` configuration section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Prompts above this many units get a length warning
    #[serde(default = "default_prompt_warning_threshold")]
    pub prompt_warning_threshold: u32,
    /// Prompts below this many units on a high-cost model get a cheaper-model hint
    #[serde(default = "default_small_prompt_threshold")]
    pub small_prompt_threshold: u32,
    /// Smallest ceiling worth shrinking to instead of rejecting
    #[serde(default = "default_min_response_tokens")]
    pub min_response_tokens: u32,
    /// Ceiling used when the caller sets none and the model is not in the catalog
    #[serde(default = "default_response_ceiling")]
    pub default_response_ceiling: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            prompt_warning_threshold: default_prompt_warning_threshold(),
            small_prompt_threshold: default_small_prompt_threshold(),
            min_response_tokens: default_min_response_tokens(),
            default_response_ceiling: default_response_ceiling(),
        }
    }
}

/// Something the optimizer did or suggested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Optimization {
    /// Prompt is long; sent unchanged
    PromptLengthWarning {
        /// Prompt units
        units: u32,
        /// Warning threshold
        threshold: u32,
    },
    /// Ceiling lowered to the plan's per-request maximum
    ClampedToPlan {
        /// Requested ceiling
        from: u32,
        /// Applied ceiling
        to: u32,
    },
    /// Ceiling lowered to the model's output maximum
    ClampedToModel {
        /// Requested ceiling
        from: u32,
        /// Applied ceiling
        to: u32,
    },
    /// Ceiling lowered to fit the units left today
    ShrunkToBudget {
        /// Ceiling before shrinking
        from: u32,
        /// Applied ceiling
        to: u32,
    },
    /// A cheaper model would likely do; not applied
    CheaperModelSuggested {
        /// Suggested model (same provider)
        model: String,
        /// Its input price per million units
        input_cost_per_million: f64,
    },
}

impl Optimization {
    /// Short machine-readable name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PromptLengthWarning { .. } => "prompt_length_warning",
            Self::ClampedToPlan { .. } => "clamped_to_plan",
            Self::ClampedToModel { .. } => "clamped_to_model",
            Self::ShrunkToBudget { .. } => "shrunk_to_budget",
            Self::CheaperModelSuggested { .. } => "cheaper_model_suggested",
        }
    }
}

/// A response ceiling after plan and model clamping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCeiling {
    /// Ceiling to estimate and send
    pub value: u32,
    /// Clamps applied to reach it
    pub applied: Vec<Optimization>,
}

impl ResponseCeiling {
    /// A ceiling nothing was done to
    #[must_use]
    pub fn unchanged(value: u32) -> Self {
        Self {
            value,
            applied: Vec::new(),
        }
    }
}

/// Whether the request goes ahead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "decision", rename_all = "snake_case")]
pub enum Verdict {
    /// Route the request
    Proceed,
    /// Refuse; carries the failing budget decision
    Reject(Box<BudgetDecision>),
}

/// Output of `optimize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationPlan {
    /// Prompt or conversation to send, unchanged
    pub final_prompt: Invocation,
    /// Response ceiling to send
    pub final_response_ceiling: u32,
    /// Units the prompt was estimated at
    pub prompt_units: u32,
    /// Everything applied or suggested, in order
    pub applied_optimizations: Vec<Optimization>,
    /// Go or no-go
    pub verdict: Verdict,
}

impl OptimizationPlan {
    /// Whether the request may be routed
    #[must_use]
    pub fn is_proceed(&self) -> bool {
        matches!(self.verdict, Verdict::Proceed)
    }
}
