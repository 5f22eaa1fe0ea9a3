//! Budget ledger

use super::types::{
    BudgetCheck, BudgetCheckKind, BudgetConfig, BudgetDecision, BudgetWindow, FailurePolicy,
    Remaining, UsageReport, WindowMode,
};
use crate::error::Result;
use crate::plan::{PlanLimits, PlanResolver};
use crate::usage::{UsageRecord, UsageStore};
use chrono::{DateTime, Duration, DurationRound, NaiveTime, Utc};
use std::sync::Arc;
use tollgate_llm::PricingTable;
use tracing::{debug, instrument, warn};

/// Reason code when usage could not be read under `fail_closed`
pub const USAGE_UNAVAILABLE: &str = "usage_unavailable";

/// Tracks consumption and compares it against plan limits
pub struct BudgetLedger {
    usage: Arc<dyn UsageStore>,
    plans: Arc<dyn PlanResolver>,
    pricing: Arc<PricingTable>,
    config: BudgetConfig,
    fallback_limits: PlanLimits,
}

impl BudgetLedger {
    /// Create a ledger; users without a plan get the conservative limits
    #[must_use]
    pub fn new(
        usage: Arc<dyn UsageStore>,
        plans: Arc<dyn PlanResolver>,
        pricing: Arc<PricingTable>,
        config: BudgetConfig,
    ) -> Self {
        Self {
            usage,
            plans,
            pricing,
            config,
            fallback_limits: PlanLimits::conservative(),
        }
    }

    /// Limits for users without a resolvable plan
    #[must_use]
    pub fn with_fallback_limits(mut self, limits: PlanLimits) -> Self {
        self.fallback_limits = limits;
        self
    }

    /// Ledger configuration
    #[must_use]
    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Limits for a user, and whether the lookup failed
    pub async fn limits_for(&self, user_id: &str) -> (PlanLimits, bool) {
        match self.plans.resolve(user_id).await {
            Ok(Some(limits)) => (limits, false),
            Ok(None) => {
                debug!(user_id, "No active plan, using fallback limits");
                (self.fallback_limits, false)
            }
            Err(e) => {
                warn!(user_id, error = %e, "Plan lookup failed, using fallback limits");
                (self.fallback_limits, true)
            }
        }
    }

    fn window_starts(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self.config.window_mode {
            WindowMode::Rolling => (now - Duration::hours(24), now - Duration::hours(1)),
            WindowMode::Calendar => {
                let day = now.date_naive().and_time(NaiveTime::MIN).and_utc();
                let hour = now.duration_trunc(Duration::hours(1)).unwrap_or(day);
                (day, hour)
            }
        }
    }

    /// Aggregate a user's daily and hourly consumption
    ///
    /// # Errors
    /// Returns error if the usage store cannot be read
    pub async fn window(&self, user_id: &str) -> Result<BudgetWindow> {
        let (day_start, hour_start) = self.window_starts(Utc::now());
        let (day, hour) = futures::try_join!(
            self.usage.aggregate(user_id, day_start),
            self.usage.aggregate(user_id, hour_start),
        )?;

        Ok(BudgetWindow {
            total_tokens: day.total_tokens,
            total_cost: day.total_cost,
            request_count_hour: hour.request_count,
            day_start,
            hour_start,
        })
    }

    /// Decide whether a call of `estimated_units` on `provider`/`model` fits the user's budget
    ///
    /// Never fails: plan and usage trouble produce a `degraded` decision
    /// according to the configured failure policy.
    #[instrument(skip(self), fields(policy = ?self.config.failure_policy))]
    pub async fn check_budget(
        &self,
        user_id: &str,
        estimated_units: u64,
        provider: &str,
        model: &str,
    ) -> BudgetDecision {
        let (limits, plan_degraded) = self.limits_for(user_id).await;
        self.evaluate(user_id, limits, plan_degraded, estimated_units, provider, model)
            .await
    }

    /// `check_budget` against limits the caller already resolved
    pub async fn evaluate(
        &self,
        user_id: &str,
        limits: PlanLimits,
        plan_degraded: bool,
        estimated_units: u64,
        provider: &str,
        model: &str,
    ) -> BudgetDecision {
        let estimated_cost = self
            .pricing
            .estimate_units_cost(provider, model, estimated_units);

        let window = match self.window(user_id).await {
            Ok(window) => window,
            Err(e) => {
                warn!(user_id, error = %e, "Usage aggregation failed");
                return self.degraded_decision(limits, estimated_cost);
            }
        };

        let checks = vec![
            BudgetCheck::new(
                BudgetCheckKind::DailyTokens,
                window.total_tokens as f64,
                limits.daily_token_limit as f64,
                estimated_units as f64,
            ),
            BudgetCheck::new(
                BudgetCheckKind::DailyCost,
                window.total_cost,
                limits.daily_cost_limit,
                estimated_cost,
            ),
            BudgetCheck::new(
                BudgetCheckKind::HourlyRequests,
                window.request_count_hour as f64,
                f64::from(limits.hourly_request_limit),
                1.0,
            ),
        ];

        let failed: Vec<&BudgetCheck> = checks.iter().filter(|c| !c.passed).collect();
        let reasons = failed.iter().map(|c| c.kind.as_str().to_string()).collect();
        let recommendations = failed
            .iter()
            .map(|c| self.recommend(c, provider, model))
            .collect();
        let approved = failed.is_empty();

        if approved {
            debug!(user_id, estimated_units, estimated_cost, "Budget approved");
        } else {
            debug!(user_id, estimated_units, ?reasons, "Budget rejected");
        }

        BudgetDecision {
            approved,
            reasons,
            recommendations,
            checks,
            degraded: plan_degraded,
            limits,
            window: Some(window),
            estimated_cost,
        }
    }

    fn degraded_decision(&self, limits: PlanLimits, estimated_cost: f64) -> BudgetDecision {
        let (approved, reasons, recommendations) = match self.config.failure_policy {
            FailurePolicy::FailOpen => (true, Vec::new(), Vec::new()),
            FailurePolicy::FailClosed => (
                false,
                vec![USAGE_UNAVAILABLE.to_string()],
                vec!["Usage data is temporarily unavailable; retry shortly".to_string()],
            ),
        };
        BudgetDecision {
            approved,
            reasons,
            recommendations,
            checks: Vec::new(),
            degraded: true,
            limits,
            window: None,
            estimated_cost,
        }
    }

    fn recommend(&self, check: &BudgetCheck, provider: &str, model: &str) -> String {
        match check.kind {
            BudgetCheckKind::DailyTokens => {
                let remaining = check.remaining() as u64;
                if remaining > 0 {
                    format!(
                        "Shorten the prompt or reduce the response ceiling to fit the {remaining} units left today"
                    )
                } else {
                    "Shorten the prompt or reduce the response ceiling; the daily unit limit is used up until the window resets".to_string()
                }
            }
            BudgetCheckKind::DailyCost => match self.pricing.cheaper_alternative(provider, model) {
                Some(cheaper) => format!(
                    "Switch to a cheaper model such as {} (${:.2}/M input units)",
                    cheaper.model, cheaper.input_cost_per_million
                ),
                None => "Switch to a cheaper model or wait for the daily cost window to reset"
                    .to_string(),
            },
            BudgetCheckKind::HourlyRequests => {
                "Wait for the hourly request window to reset before retrying".to_string()
            }
        }
    }

    /// Append a completed call to the usage log
    ///
    /// # Errors
    /// Returns error if the usage store rejects the write
    #[instrument(skip(self, record), fields(user_id = %record.user_id, cost = record.cost))]
    pub async fn record(&self, record: &UsageRecord) -> Result<()> {
        self.usage.append(record).await
    }

    /// Limits, consumption and headroom for a user
    ///
    /// # Errors
    /// Returns error if the usage store cannot be read
    pub async fn usage_report(&self, user_id: &str) -> Result<UsageReport> {
        let (limits, degraded) = self.limits_for(user_id).await;
        let window = self.window(user_id).await?;

        let remaining = Remaining {
            tokens: limits.daily_token_limit.saturating_sub(window.total_tokens),
            cost: (limits.daily_cost_limit - window.total_cost).max(0.0),
            requests: u64::from(limits.hourly_request_limit).saturating_sub(window.request_count_hour),
        };

        Ok(UsageReport {
            user_id: user_id.to_string(),
            limits,
            window,
            remaining,
            degraded,
        })
    }
}
