use super::*;
use crate::error::{Error, Result};
use crate::plan::{PlanLimits, PlanResolver, PlanTier, StaticPlanResolver};
use crate::usage::{MemoryUsageStore, UsageAggregate, UsageRecord, UsageStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockall::mock;
use std::sync::Arc;
use tollgate_llm::{ModelDescriptor, PricingTable, TokenUsage};

mock! {
    Store {}

    #[async_trait]
    impl UsageStore for Store {
        async fn append(&self, record: &UsageRecord) -> Result<()>;
        async fn aggregate(&self, user_id: &str, since: DateTime<Utc>) -> Result<UsageAggregate>;
        async fn records(
            &self,
            user_id: &str,
            since: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<UsageRecord>>;
    }
}

mock! {
    Plans {}

    #[async_trait]
    impl PlanResolver for Plans {
        async fn resolve(&self, user_id: &str) -> Result<Option<PlanLimits>>;
    }
}

fn scenario_limits() -> PlanLimits {
    PlanLimits {
        daily_token_limit: 1000,
        daily_cost_limit: 2.0,
        hourly_request_limit: 10,
        max_tokens_per_request: 4096,
    }
}

/// $0.003 per 1K units on both sides
fn pricing() -> Arc<PricingTable> {
    Arc::new(PricingTable::new(vec![
        ModelDescriptor::new("acme", "standard-1", 3.0, 3.0),
        ModelDescriptor::new("acme", "premium-1", 15.0, 60.0),
        ModelDescriptor::new("acme", "mini-1", 0.1, 0.4),
    ]))
}

fn ledger_with(store: Arc<dyn UsageStore>, plans: Arc<dyn PlanResolver>) -> BudgetLedger {
    BudgetLedger::new(store, plans, pricing(), BudgetConfig::default())
}

fn scenario_ledger(store: Arc<dyn UsageStore>) -> BudgetLedger {
    let plans = StaticPlanResolver::new()
        .with_user("alice", PlanTier::Starter)
        .with_tier_limits(PlanTier::Starter, scenario_limits());
    ledger_with(store, Arc::new(plans))
}

fn spent(user: &str, tokens: u32, cost: f64, minutes_ago: i64) -> UsageRecord {
    UsageRecord::success(user, "acme", "standard-1", TokenUsage::new(tokens, 0), cost, 10)
        .with_timestamp(Utc::now() - Duration::minutes(minutes_ago))
}

#[tokio::test]
async fn test_token_ceiling_scenario() {
    let ledger = scenario_ledger(Arc::new(MemoryUsageStore::new()));

    let decision = ledger.check_budget("alice", 1500, "acme", "standard-1").await;

    assert!(!decision.approved);
    assert_eq!(decision.reasons, vec!["daily_token_limit".to_string()]);
    assert!(!decision.degraded);
    assert!((decision.estimated_cost - 0.0045).abs() < 1e-12);
    assert!(decision.only_tokens_exceeded());

    let recommendation = decision.recommendations[0].to_lowercase();
    assert!(recommendation.contains("shorten the prompt"));
    assert!(recommendation.contains("reduce the response ceiling"));

    let tokens = decision.check(BudgetCheckKind::DailyTokens).unwrap();
    assert_eq!((tokens.current, tokens.limit, tokens.requested), (0.0, 1000.0, 1500.0));
}

#[tokio::test]
async fn test_within_limits_is_approved() {
    let ledger = scenario_ledger(Arc::new(MemoryUsageStore::new()));
    let decision = ledger.check_budget("alice", 400, "acme", "standard-1").await;

    assert!(decision.approved);
    assert!(decision.reasons.is_empty());
    assert!(decision.recommendations.is_empty());
    assert_eq!(decision.checks.len(), 3);
}

#[tokio::test]
async fn test_exact_limit_passes() {
    let store = Arc::new(MemoryUsageStore::new());
    store.append(&spent("alice", 600, 0.0, 5)).await.unwrap();
    let ledger = scenario_ledger(store);

    assert!(ledger.check_budget("alice", 400, "acme", "standard-1").await.approved);
    assert!(!ledger.check_budget("alice", 401, "acme", "standard-1").await.approved);
}

#[tokio::test]
async fn test_cost_ceiling_recommends_cheaper_model() {
    let store = Arc::new(MemoryUsageStore::new());
    store.append(&spent("alice", 0, 1.999, 5)).await.unwrap();
    let ledger = scenario_ledger(store);

    let decision = ledger.check_budget("alice", 100, "acme", "premium-1").await;

    assert!(!decision.approved);
    assert_eq!(decision.reasons, vec!["daily_cost_limit".to_string()]);
    assert!(decision.recommendations[0].contains("mini-1"));
}

#[tokio::test]
async fn test_hourly_request_ceiling() {
    let store = Arc::new(MemoryUsageStore::new());
    for _ in 0..10 {
        store.append(&spent("alice", 1, 0.0, 1)).await.unwrap();
    }
    // Outside the hourly window, inside the daily one
    store.append(&spent("alice", 1, 0.0, 120)).await.unwrap();
    let ledger = scenario_ledger(store);

    let decision = ledger.check_budget("alice", 10, "acme", "standard-1").await;
    assert_eq!(decision.reasons, vec!["hourly_request_limit".to_string()]);
    assert!(decision.recommendations[0].contains("hourly"));
    assert_eq!(decision.window.unwrap().request_count_hour, 10);
}

#[tokio::test]
async fn test_all_failures_reported_together() {
    let store = Arc::new(MemoryUsageStore::new());
    for _ in 0..10 {
        store.append(&spent("alice", 100, 0.2, 1)).await.unwrap();
    }
    let ledger = scenario_ledger(store);

    let decision = ledger.check_budget("alice", 1, "acme", "standard-1").await;
    assert_eq!(
        decision.reasons,
        vec![
            "daily_token_limit".to_string(),
            "daily_cost_limit".to_string(),
            "hourly_request_limit".to_string()
        ]
    );
    assert_eq!(decision.recommendations.len(), 3);
    assert!(!decision.only_tokens_exceeded());
}

#[tokio::test]
async fn test_monotonic_in_prior_usage() {
    let store = Arc::new(MemoryUsageStore::new());
    let ledger = scenario_ledger(store.clone());

    let mut previously_approved = true;
    for _ in 0..12 {
        let approved = ledger.check_budget("alice", 100, "acme", "standard-1").await.approved;
        // Once rejected, more usage never flips it back
        assert!(previously_approved || !approved);
        previously_approved = approved;
        store.append(&spent("alice", 100, 0.01, 300)).await.unwrap();
    }
    assert!(!previously_approved);
}

#[tokio::test]
async fn test_cost_limit_flips_approval_and_stays_rejected() {
    let store = Arc::new(MemoryUsageStore::new());
    let plans = StaticPlanResolver::new()
        .with_user("alice", PlanTier::Starter)
        .with_tier_limits(
            PlanTier::Starter,
            PlanLimits {
                daily_token_limit: 1_000_000,
                hourly_request_limit: 1000,
                ..scenario_limits()
            },
        );
    let ledger = ledger_with(store.clone(), Arc::new(plans));

    // $0.25 per call against $2.00: the ninth check would exceed it
    let mut first_rejection = None;
    for call in 0..12 {
        let decision = ledger.check_budget("alice", 100, "acme", "standard-1").await;
        match first_rejection {
            None if decision.approved => {}
            None => {
                assert_eq!(decision.reasons, vec!["daily_cost_limit".to_string()]);
                first_rejection = Some(call);
            }
            Some(_) => {
                assert!(!decision.approved);
                assert_eq!(decision.reasons, vec!["daily_cost_limit".to_string()]);
            }
        }
        store.append(&spent("alice", 100, 0.25, 300)).await.unwrap();
    }
    assert_eq!(first_rejection, Some(8));
}

#[tokio::test]
async fn test_users_are_isolated() {
    let store = Arc::new(MemoryUsageStore::new());
    store.append(&spent("bob", 5000, 0.0, 1)).await.unwrap();
    let ledger = scenario_ledger(store);

    assert!(ledger.check_budget("alice", 500, "acme", "standard-1").await.approved);
}

#[tokio::test]
async fn test_no_plan_uses_fallback_limits() {
    let ledger = scenario_ledger(Arc::new(MemoryUsageStore::new()));
    let decision = ledger.check_budget("stranger", 10, "acme", "standard-1").await;

    assert_eq!(decision.limits, PlanLimits::conservative());
    assert!(!decision.degraded);
}

#[tokio::test]
async fn test_plan_error_uses_fallback_and_degrades() {
    let mut plans = MockPlans::new();
    plans
        .expect_resolve()
        .returning(|_| Err(Error::Plan("subscription service down".to_string())));
    let custom = PlanLimits {
        daily_token_limit: 50,
        ..PlanLimits::conservative()
    };
    let ledger = ledger_with(Arc::new(MemoryUsageStore::new()), Arc::new(plans))
        .with_fallback_limits(custom);

    let decision = ledger.check_budget("alice", 10, "acme", "standard-1").await;
    assert!(decision.approved);
    assert!(decision.degraded);
    assert_eq!(decision.limits, custom);
}

#[tokio::test]
async fn test_aggregation_error_fails_open_by_default() {
    let mut store = MockStore::new();
    store
        .expect_aggregate()
        .returning(|_, _| Err(Error::Store("disk I/O error".to_string())));
    let ledger = scenario_ledger(Arc::new(store));

    let decision = ledger.check_budget("alice", 999_999, "acme", "standard-1").await;
    assert!(decision.approved);
    assert!(decision.degraded);
    assert!(decision.window.is_none());
    assert!(decision.checks.is_empty());
}

#[tokio::test]
async fn test_aggregation_error_fail_closed() {
    let mut store = MockStore::new();
    store
        .expect_aggregate()
        .returning(|_, _| Err(Error::Store("disk I/O error".to_string())));
    let config = BudgetConfig {
        failure_policy: FailurePolicy::FailClosed,
        ..Default::default()
    };
    let ledger = BudgetLedger::new(
        Arc::new(store),
        Arc::new(StaticPlanResolver::new()),
        pricing(),
        config,
    );

    let decision = ledger.check_budget("alice", 1, "acme", "standard-1").await;
    assert!(!decision.approved);
    assert!(decision.degraded);
    assert_eq!(decision.reasons, vec![USAGE_UNAVAILABLE.to_string()]);
}

#[tokio::test]
async fn test_calendar_window_starts_at_midnight() {
    let config = BudgetConfig {
        window_mode: WindowMode::Calendar,
        ..Default::default()
    };
    let ledger = BudgetLedger::new(
        Arc::new(MemoryUsageStore::new()),
        Arc::new(StaticPlanResolver::new()),
        pricing(),
        config,
    );

    let window = ledger.window("alice").await.unwrap();
    assert_eq!(window.day_start.time(), chrono::NaiveTime::MIN);
    assert_eq!(window.day_start.date_naive(), Utc::now().date_naive());
    assert!(window.hour_start >= window.day_start);
    assert_eq!(window.hour_start.timestamp() % 3600, 0);
}

#[tokio::test]
async fn test_usage_report() {
    let store = Arc::new(MemoryUsageStore::new());
    store.append(&spent("alice", 250, 0.5, 2)).await.unwrap();
    let ledger = scenario_ledger(store);

    let report = ledger.usage_report("alice").await.unwrap();
    assert_eq!(report.limits, scenario_limits());
    assert_eq!(report.window.total_tokens, 250);
    assert_eq!(report.remaining.tokens, 750);
    assert!((report.remaining.cost - 1.5).abs() < 1e-9);
    assert_eq!(report.remaining.requests, 9);
}

#[tokio::test]
async fn test_record_appends() {
    let store = Arc::new(MemoryUsageStore::new());
    let ledger = scenario_ledger(store.clone());

    ledger.record(&spent("alice", 10, 0.1, 0)).await.unwrap();
    assert_eq!(store.len().await, 1);
}

#[test]
fn test_check_remaining_never_negative() {
    let check = BudgetCheck::new(BudgetCheckKind::DailyTokens, 1200.0, 1000.0, 1.0);
    assert!(!check.passed);
    assert_eq!(check.remaining(), 0.0);
}
