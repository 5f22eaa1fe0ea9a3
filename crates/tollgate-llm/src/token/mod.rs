//! Token accounting
//!
//! Units are estimated per (provider, model, text) and cached for an hour.
//! OpenAI models are counted exactly with tiktoken; everything else uses a
//! character/word heuristic tuned per provider.

mod cache;
mod engine;
mod estimator;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cache::{MemoryTokenCache, RedisTokenCache, SharedTokenCache};
pub use engine::{TokenAccountant, TokenAccountingConfig};
pub use estimator::{count_native, estimate_units, EstimationMethod, HeuristicProfile};

/// Result of a unit estimate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCountResult {
    /// SHA-256 of provider, model and text
    pub content_hash: String,
    /// Provider the count applies to
    pub provider: String,
    /// Model the count applies to
    pub model: String,
    /// Estimated units
    pub units: u32,
    /// How the count was produced
    pub method: EstimationMethod,
    /// When the count was computed
    pub computed_at: DateTime<Utc>,
    /// Served from a cache rather than computed for this call
    #[serde(default)]
    pub cached: bool,
}
