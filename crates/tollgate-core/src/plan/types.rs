//! Plan tiers and limits

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Free tier
    Free,
    /// Entry paid tier
    Starter,
    /// Professional tier
    Pro,
    /// Enterprise tier
    Enterprise,
}

impl PlanTier {
    /// All tiers, cheapest first
    pub const ALL: [PlanTier; 4] = [Self::Free, Self::Starter, Self::Pro, Self::Enterprise];

    /// Config/string form
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown plan tier: {s}"))
    }
}

/// Ceilings applied by the budget ledger
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Units per day
    pub daily_token_limit: u64,
    /// USD per day
    pub daily_cost_limit: f64,
    /// Logical calls per hour
    pub hourly_request_limit: u32,
    /// Largest response ceiling a single request may ask for
    pub max_tokens_per_request: u32,
}

impl PlanLimits {
    /// Built-in limits for a tier
    #[must_use]
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self {
                daily_token_limit: 10_000,
                daily_cost_limit: 0.50,
                hourly_request_limit: 20,
                max_tokens_per_request: 1024,
            },
            PlanTier::Starter => Self {
                daily_token_limit: 100_000,
                daily_cost_limit: 5.0,
                hourly_request_limit: 100,
                max_tokens_per_request: 4096,
            },
            PlanTier::Pro => Self {
                daily_token_limit: 1_000_000,
                daily_cost_limit: 50.0,
                hourly_request_limit: 500,
                max_tokens_per_request: 8192,
            },
            PlanTier::Enterprise => Self {
                daily_token_limit: 10_000_000,
                daily_cost_limit: 500.0,
                hourly_request_limit: 5000,
                max_tokens_per_request: 32_768,
            },
        }
    }

    /// The most restrictive built-in limits
    #[must_use]
    pub fn conservative() -> Self {
        Self::for_tier(PlanTier::Free)
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self::conservative()
    }
}
