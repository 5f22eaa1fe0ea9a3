//! Usage record and aggregate types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_llm::TokenUsage;
use uuid::Uuid;

/// Outcome of a logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    /// A provider answered
    Success,
    /// Every attempt failed
    Failure,
}

impl UsageStatus {
    /// Stored string form
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl std::str::FromStr for UsageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            other => Err(format!("unknown usage status: {other}")),
        }
    }
}

/// One completed logical call, written once and never changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Record id
    pub id: Uuid,
    /// User the call is billed to
    pub user_id: String,
    /// Provider that served (or last failed) the call
    pub provider: String,
    /// Model that served (or last failed) the call
    pub model: String,
    /// Prompt units
    pub input_tokens: u32,
    /// Response units
    pub output_tokens: u32,
    /// Sum of both
    pub total_tokens: u32,
    /// Cost in USD
    pub cost: f64,
    /// End-to-end latency
    pub latency_ms: u64,
    /// Outcome
    pub status: UsageStatus,
    /// Units were estimated because the provider reported none
    pub estimated: bool,
    /// When the call completed
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    /// A successful call with provider-reported usage
    #[must_use]
    pub fn success(
        user_id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        usage: TokenUsage,
        cost: f64,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            provider: provider.into(),
            model: model.into(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost,
            latency_ms,
            status: UsageStatus::Success,
            estimated: false,
            timestamp: Utc::now(),
        }
    }

    /// A call where every attempt failed; carries no usage and no cost
    #[must_use]
    pub fn failure(
        user_id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            status: UsageStatus::Failure,
            ..Self::success(user_id, provider, model, TokenUsage::default(), 0.0, latency_ms)
        }
    }

    /// Mark units as estimated
    #[must_use]
    pub fn estimated(mut self) -> Self {
        self.estimated = true;
        self
    }

    /// Override the timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Sums over a user's records in a time range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageAggregate {
    /// Units consumed
    pub total_tokens: u64,
    /// Cost accrued
    pub total_cost: f64,
    /// Logical calls made, failures included
    pub request_count: u64,
}

impl UsageAggregate {
    /// Fold one record into the sums
    pub fn add(&mut self, record: &UsageRecord) {
        self.total_tokens += u64::from(record.total_tokens);
        self.total_cost += record.cost;
        self.request_count += 1;
    }
}
