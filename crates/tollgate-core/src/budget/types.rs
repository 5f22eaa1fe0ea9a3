//! Budget configuration, windows and decisions

use crate::plan::PlanLimits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Configuration
// ============================================================================

/// What to do when usage cannot be aggregated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Approve and mark the decision degraded
    #[default]
    FailOpen,
    /// Reject and mark the decision degraded
    FailClosed,
}

/// How the daily and hourly windows are anchored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Last 24 hours / last 60 minutes
    #[default]
    Rolling,
    /// Since UTC midnight / since the top of the hour
    Calendar,
}

/// The `budget` configuration section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Aggregation failure handling
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Window anchoring
    #[serde(default)]
    pub window_mode: WindowMode,
}

// ============================================================================
// Window
// ============================================================================

/// A user's consumption, derived from usage records
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetWindow {
    /// Units in the daily window
    pub total_tokens: u64,
    /// Cost in the daily window
    pub total_cost: f64,
    /// Calls in the hourly window
    pub request_count_hour: u64,
    /// Start of the daily window
    pub day_start: DateTime<Utc>,
    /// Start of the hourly window
    pub hour_start: DateTime<Utc>,
}

// ============================================================================
// Checks and decisions
// ============================================================================

/// One of the three independent ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCheckKind {
    /// Units per day
    DailyTokens,
    /// Cost per day
    DailyCost,
    /// Calls per hour
    HourlyRequests,
}

impl BudgetCheckKind {
    /// Reason code reported when this check fails
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyTokens => "daily_token_limit",
            Self::DailyCost => "daily_cost_limit",
            Self::HourlyRequests => "hourly_request_limit",
        }
    }
}

impl fmt::Display for BudgetCheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single ceiling check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheck {
    /// Which ceiling
    pub kind: BudgetCheckKind,
    /// `current + requested <= limit`
    pub passed: bool,
    /// Already consumed in the window
    pub current: f64,
    /// Plan ceiling
    pub limit: f64,
    /// What this request adds
    pub requested: f64,
}

impl BudgetCheck {
    /// Evaluate a ceiling
    #[must_use]
    pub fn new(kind: BudgetCheckKind, current: f64, limit: f64, requested: f64) -> Self {
        Self {
            kind,
            passed: current + requested <= limit,
            current,
            limit,
            requested,
        }
    }

    /// Headroom left before this request, never negative
    #[must_use]
    pub fn remaining(&self) -> f64 {
        (self.limit - self.current).max(0.0)
    }
}

/// Result of `check_budget`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDecision {
    /// All checks passed (or the policy approved despite missing data)
    pub approved: bool,
    /// Reason codes of the failed checks
    pub reasons: Vec<String>,
    /// Human-readable next steps
    pub recommendations: Vec<String>,
    /// Every check that ran
    pub checks: Vec<BudgetCheck>,
    /// Plan or usage data was unavailable
    pub degraded: bool,
    /// Limits the checks ran against
    pub limits: PlanLimits,
    /// Window the checks ran against, absent when aggregation failed
    pub window: Option<BudgetWindow>,
    /// Pre-call cost estimate for the requested units
    pub estimated_cost: f64,
}

impl BudgetDecision {
    /// Checks that did not pass
    pub fn failed_checks(&self) -> impl Iterator<Item = &BudgetCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Look up one check
    #[must_use]
    pub fn check(&self, kind: BudgetCheckKind) -> Option<&BudgetCheck> {
        self.checks.iter().find(|c| c.kind == kind)
    }

    /// True when the daily-unit check is the only failure
    #[must_use]
    pub fn only_tokens_exceeded(&self) -> bool {
        let mut failed = self.failed_checks();
        matches!(
            (failed.next(), failed.next()),
            (Some(c), None) if c.kind == BudgetCheckKind::DailyTokens
        )
    }
}

/// Remaining headroom in the current windows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Remaining {
    /// Units left today
    pub tokens: u64,
    /// USD left today
    pub cost: f64,
    /// Calls left this hour
    pub requests: u64,
}

/// Answer to `usage_report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// User the report is for
    pub user_id: String,
    /// Limits in force
    pub limits: PlanLimits,
    /// Consumption so far
    pub window: BudgetWindow,
    /// Headroom
    pub remaining: Remaining,
    /// Plan lookup failed and fallback limits were used
    pub degraded: bool,
}
