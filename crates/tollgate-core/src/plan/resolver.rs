//! Plan resolution

use super::types::{PlanLimits, PlanTier};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Looks up the limits a user is entitled to
#[async_trait]
pub trait PlanResolver: Send + Sync {
    /// Limits of the user's active subscription, `None` when there is none
    async fn resolve(&self, user_id: &str) -> Result<Option<PlanLimits>>;
}

/// The `plans` configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlansConfig {
    /// Tier for users without an explicit entry; unset means "no subscription"
    #[serde(default)]
    pub default_tier: Option<PlanTier>,
    /// User id to tier
    #[serde(default)]
    pub users: HashMap<String, PlanTier>,
    /// Replacement limits per tier name
    #[serde(default)]
    pub tiers: HashMap<String, PlanLimits>,
}

/// Resolver backed by configuration
///
/// User ids are matched case-insensitively; the config loader lowercases
/// map keys, so entries written as `Alice` arrive as `alice`.
#[derive(Debug, Clone)]
pub struct StaticPlanResolver {
    default_tier: Option<PlanTier>,
    users: HashMap<String, PlanTier>,
    tiers: HashMap<PlanTier, PlanLimits>,
}

impl StaticPlanResolver {
    /// Resolver where nobody has a subscription
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_tier: None,
            users: HashMap::new(),
            tiers: PlanTier::ALL
                .into_iter()
                .map(|t| (t, PlanLimits::for_tier(t)))
                .collect(),
        }
    }

    /// Build from the `plans` section
    ///
    /// # Errors
    /// Returns error if a tier override names an unknown tier
    pub fn from_config(config: &PlansConfig) -> Result<Self> {
        let mut resolver = Self::new();
        resolver.default_tier = config.default_tier;
        for (name, limits) in &config.tiers {
            let tier: PlanTier = name.parse().map_err(Error::Configuration)?;
            resolver.tiers.insert(tier, *limits);
        }
        for (user, tier) in &config.users {
            resolver.users.insert(user.to_lowercase(), *tier);
        }
        Ok(resolver)
    }

    /// Assign a user to a tier
    #[must_use]
    pub fn with_user(mut self, user_id: &str, tier: PlanTier) -> Self {
        self.users.insert(user_id.to_lowercase(), tier);
        self
    }

    /// Tier for users without an entry
    #[must_use]
    pub fn with_default_tier(mut self, tier: PlanTier) -> Self {
        self.default_tier = Some(tier);
        self
    }

    /// Replace a tier's limits
    #[must_use]
    pub fn with_tier_limits(mut self, tier: PlanTier, limits: PlanLimits) -> Self {
        self.tiers.insert(tier, limits);
        self
    }

    /// Tier a user falls into, if any
    #[must_use]
    pub fn tier_of(&self, user_id: &str) -> Option<PlanTier> {
        self.users
            .get(&user_id.to_lowercase())
            .copied()
            .or(self.default_tier)
    }
}

impl Default for StaticPlanResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanResolver for StaticPlanResolver {
    async fn resolve(&self, user_id: &str) -> Result<Option<PlanLimits>> {
        let Some(tier) = self.tier_of(user_id) else {
            debug!(user_id, "No subscription for user");
            return Ok(None);
        };
        let limits = self
            .tiers
            .get(&tier)
            .copied()
            .unwrap_or_else(|| PlanLimits::for_tier(tier));
        Ok(Some(limits))
    }
}
