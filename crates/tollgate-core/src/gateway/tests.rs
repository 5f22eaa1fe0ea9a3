use super::*;
use crate::budget::{BudgetConfig, BudgetLedger};
use crate::error::{Error, Result};
use crate::optimizer::Optimization;
use crate::plan::{PlanLimits, PlanTier, StaticPlanResolver};
use crate::usage::{MemoryUsageStore, UsageAggregate, UsageRecord, UsageStatus, UsageStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tollgate_llm::{
    ErrorKind, EstimationMethod, LlmProvider, LlmRouter, Message, MockProvider, ModelDescriptor, PricingTable,
    ProviderRegistry, RouterConfig, TokenAccountant, TokenAccountingConfig, TokenUsage,
};

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

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    gateway: Gateway,
    store: Arc<MemoryUsageStore>,
}

impl Harness {
    async fn records(&self, user: &str) -> Vec<UsageRecord> {
        self.store
            .records(user, Utc::now() - ChronoDuration::hours(1), 100)
            .await
            .unwrap()
    }
}

fn pricing() -> Arc<PricingTable> {
    Arc::new(PricingTable::new(vec![
        ModelDescriptor::new("primary", "primary-model", 3.0, 3.0),
        ModelDescriptor::new("primary", "primary-large", 15.0, 60.0),
        ModelDescriptor::new("backup", "backup-model", 1.0, 2.0),
    ]))
}

fn registry(available: &[Arc<MockProvider>], unavailable: &[&str]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for provider in available {
        registry.register(Arc::clone(provider) as Arc<dyn LlmProvider>);
    }
    for id in unavailable {
        registry.register_unavailable(*id, "missing credentials");
    }
    registry
}

fn build(
    available: &[Arc<MockProvider>],
    unavailable: &[&str],
    plans: StaticPlanResolver,
    usage: Arc<dyn UsageStore>,
) -> Gateway {
    let pricing = pricing();
    let router = LlmRouter::new(registry(available, unavailable), RouterConfig::default());
    let ledger = BudgetLedger::new(usage, Arc::new(plans), Arc::clone(&pricing), BudgetConfig::default());
    Gateway::new(
        Arc::new(router),
        Arc::new(TokenAccountant::new(TokenAccountingConfig::default())),
        Arc::new(ledger),
        pricing,
        GatewayConfig::default(),
    )
}

fn harness_with(
    available: &[Arc<MockProvider>],
    unavailable: &[&str],
    plans: StaticPlanResolver,
) -> Harness {
    let store = Arc::new(MemoryUsageStore::new());
    let gateway = build(available, unavailable, plans, store.clone());
    Harness { gateway, store }
}

fn harness(available: &[Arc<MockProvider>]) -> Harness {
    harness_with(
        available,
        &[],
        StaticPlanResolver::new().with_default_tier(PlanTier::Pro),
    )
}

fn provider(name: &str) -> Arc<MockProvider> {
    Arc::new(MockProvider::new(name))
}

fn rate_limited() -> tollgate_llm::Error {
    tollgate_llm::Error::RateLimit { retry_after: None }
}

// ============================================================================
// generate / chat
// ============================================================================

#[tokio::test]
async fn test_generate_bills_once() {
    let primary = provider("primary");
    let h = harness(&[primary.clone()]);

    let result = h
        .gateway
        .generate("hello", &RequestOptions::new().with_user("alice"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.content, "mock response to: hello");
    assert_eq!(result.provider, "primary");
    assert_eq!(result.model, "primary-model");
    assert_eq!(result.usage, TokenUsage::new(10, 20));
    assert!(!result.metadata.fallback_occurred);
    assert!(!result.metadata.mock);
    assert!(!result.metadata.cached);
    assert!(!result.metadata.degraded);
    assert_eq!(result.metadata.finish_reason.as_deref(), Some("stop"));
    assert!((result.metadata.cost - 0.00009).abs() < 1e-12);
    assert_eq!(result.metadata.attempts.len(), 1);
    assert!(!result.metadata.request_id.is_empty());

    let records = h.records("alice").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, UsageStatus::Success);
    assert_eq!(records[0].total_tokens, 30);
    assert_eq!(records[0].cost, result.metadata.cost);
}

#[tokio::test]
async fn test_missing_user_is_billed_as_anonymous() {
    let h = harness(&[provider("primary")]);
    h.gateway
        .generate("hello", &RequestOptions::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(h.records("anonymous").await.len(), 1);
}

#[tokio::test]
async fn test_chat_passes_messages() {
    let primary = provider("primary");
    let h = harness(&[primary.clone()]);
    let messages = vec![
        Message::system("Be brief"),
        Message::user("What is Rust?"),
    ];

    let result = h
        .gateway
        .chat(messages, &RequestOptions::new().with_temperature(0.3), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.content, "mock response to: What is Rust?");
    let params = primary.last_params().unwrap();
    assert_eq!(params.temperature, Some(0.3));
    assert_eq!(params.max_tokens, Some(1024));
}

#[tokio::test]
async fn test_empty_inputs_are_invalid() {
    let h = harness(&[provider("primary")]);
    let cancel = CancellationToken::new();

    let err = h.gateway.generate("  ", &RequestOptions::new(), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    let err = h.gateway.chat(Vec::new(), &RequestOptions::new(), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

// ============================================================================
// Fallback and billing
// ============================================================================

#[tokio::test]
async fn test_fallback_bills_the_successful_provider_only() {
    let primary = Arc::new(MockProvider::new("primary").failing_with(rate_limited));
    let backup = Arc::new(MockProvider::new("backup").with_usage(Some(TokenUsage::new(5, 5))));
    let h = harness(&[primary.clone(), backup.clone()]);

    let result = h
        .gateway
        .generate("hello", &RequestOptions::new().with_user("alice"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.provider, "backup");
    assert_eq!(result.model, "backup-model");
    assert!(result.metadata.fallback_occurred);
    assert_eq!(
        result.metadata.fallback_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::RateLimited)
    );
    assert_eq!(result.metadata.attempts.len(), 2);

    let records = h.records("alice").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].provider, "backup");
    // 5 in at $1/M + 5 out at $2/M
    assert!((records[0].cost - 0.000015).abs() < 1e-12);
}

#[tokio::test]
async fn test_all_failures_record_zero_usage_once() {
    let primary = Arc::new(MockProvider::new("primary").failing_with(rate_limited));
    let backup = Arc::new(MockProvider::new("backup").failing_with(|| {
        tollgate_llm::Error::Network("connection refused".to_string())
    }));
    let h = harness(&[primary, backup]);

    let err = h
        .gateway
        .generate("hello", &RequestOptions::new().with_user("alice"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Provider(classified) => {
            assert_eq!(classified.kind, ErrorKind::ConnectionError);
            assert!(classified.retryable);
            assert_eq!(classified.provider.as_deref(), Some("backup"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let records = h.records("alice").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, UsageStatus::Failure);
    assert_eq!(records[0].cost, 0.0);
    assert_eq!(records[0].total_tokens, 0);
}

#[tokio::test]
async fn test_pinned_failure_is_not_retried_elsewhere() {
    let primary = Arc::new(MockProvider::new("primary").failing_with(rate_limited));
    let backup = provider("backup");
    let h = harness(&[primary.clone(), backup.clone()]);

    let err = h
        .gateway
        .generate(
            "hello",
            &RequestOptions::new().with_provider("primary"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(primary.call_count(), 1);
    assert_eq!(backup.call_count(), 0);
}

// ============================================================================
// Degraded shapes and gating
// ============================================================================

#[tokio::test]
async fn test_pinned_unavailable_provider_returns_placeholder() {
    let h = harness_with(
        &[provider("backup")],
        &["primary"],
        StaticPlanResolver::new().with_default_tier(PlanTier::Pro),
    );

    let result = h
        .gateway
        .generate(
            "hello",
            &RequestOptions::new().with_user("alice").with_provider("primary"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.metadata.mock);
    assert_eq!(result.metadata.reason.as_deref(), Some("provider_not_available"));
    assert_eq!(result.provider, "primary");
    assert_eq!(result.usage, TokenUsage::default());
    assert!(h.records("alice").await.is_empty());
}

#[tokio::test]
async fn test_no_providers_at_all_returns_placeholder() {
    let h = harness_with(&[], &["primary", "backup"], StaticPlanResolver::new());

    let result = h
        .gateway
        .generate("hello", &RequestOptions::new(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.metadata.mock);
    assert!(result.metadata.degraded);
}

#[tokio::test]
async fn test_unknown_provider_and_model_pins_are_rejected() {
    let h = harness(&[provider("primary")]);
    let cancel = CancellationToken::new();

    let err = h
        .gateway
        .generate("hello", &RequestOptions::new().with_provider("nope"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownProvider(id) if id == "nope"));

    let err = h
        .gateway
        .generate("hello", &RequestOptions::new().with_model("imaginary-9"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownModel { ref model, .. } if model == "imaginary-9"));

    // Catalog-only models are accepted
    let ok = h
        .gateway
        .generate("hello", &RequestOptions::new().with_model("primary-large"), &cancel)
        .await
        .unwrap();
    assert_eq!(ok.model, "primary-large");
}

#[tokio::test]
async fn test_budget_rejection_skips_provider() {
    let primary = provider("primary");
    let h = harness_with(
        &[primary.clone()],
        &[],
        StaticPlanResolver::new()
            .with_user("alice", PlanTier::Free)
            .with_tier_limits(
                PlanTier::Free,
                PlanLimits {
                    daily_token_limit: 1000,
                    daily_cost_limit: 2.0,
                    hourly_request_limit: 10,
                    max_tokens_per_request: 1024,
                },
            ),
    );
    h.store
        .append(&UsageRecord::success(
            "alice",
            "primary",
            "primary-model",
            TokenUsage::new(600, 400),
            0.003,
            10,
        ))
        .await
        .unwrap();

    let err = h
        .gateway
        .generate("hello", &RequestOptions::new().with_user("alice"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::BudgetExceeded(decision) => {
            assert_eq!(decision.reasons, vec!["daily_token_limit".to_string()]);
            assert!(!decision.recommendations.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(primary.call_count(), 0);
    assert_eq!(h.records("alice").await.len(), 1);
}

#[tokio::test]
async fn test_token_shortfall_shrinks_ceiling_instead_of_rejecting() {
    let primary = provider("primary");
    let h = harness_with(
        &[primary.clone()],
        &[],
        StaticPlanResolver::new()
            .with_user("alice", PlanTier::Starter)
            .with_tier_limits(
                PlanTier::Starter,
                PlanLimits {
                    daily_token_limit: 1000,
                    daily_cost_limit: 2.0,
                    hourly_request_limit: 10,
                    max_tokens_per_request: 4096,
                },
            ),
    );

    let result = h
        .gateway
        .generate(
            "hello there",
            &RequestOptions::new().with_user("alice").with_max_tokens(2000),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let shrunk = result
        .metadata
        .optimizations
        .iter()
        .find_map(|o| match o {
            Optimization::ShrunkToBudget { from, to } => Some((*from, *to)),
            _ => None,
        })
        .unwrap();
    assert_eq!(shrunk.0, 2000);
    assert!(shrunk.1 < 1000 && shrunk.1 > 900);
    assert_eq!(primary.last_params().unwrap().max_tokens, Some(shrunk.1));
}

#[tokio::test]
async fn test_usage_write_failure_degrades_but_succeeds() {
    let mut store = MockStore::new();
    store
        .expect_aggregate()
        .returning(|_, _| Ok(UsageAggregate::default()));
    store
        .expect_append()
        .times(1)
        .returning(|_| Err(Error::Store("database is locked".to_string())));

    let gateway = build(
        &[provider("primary")],
        &[],
        StaticPlanResolver::new().with_default_tier(PlanTier::Pro),
        Arc::new(store),
    );

    let result = gateway
        .generate("hello", &RequestOptions::new(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.metadata.degraded);
    assert_eq!(result.content, "mock response to: hello");
}

#[tokio::test]
async fn test_aggregation_failure_fails_open() {
    let mut store = MockStore::new();
    store
        .expect_aggregate()
        .returning(|_, _| Err(Error::Store("disk I/O error".to_string())));
    store.expect_append().returning(|_| Ok(()));

    let gateway = build(
        &[provider("primary")],
        &[],
        StaticPlanResolver::new(),
        Arc::new(store),
    );

    let result = gateway
        .generate("hello", &RequestOptions::new(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.metadata.degraded);
}

#[tokio::test]
async fn test_missing_usage_is_estimated() {
    let primary = Arc::new(MockProvider::new("primary").with_usage(None));
    let h = harness(&[primary]);

    let result = h
        .gateway
        .generate("hello world", &RequestOptions::new().with_user("alice"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.metadata.usage_estimated);
    assert!(result.usage.prompt_tokens > 0);
    assert!(result.usage.completion_tokens > 0);

    let records = h.records("alice").await;
    assert!(records[0].estimated);
    assert_eq!(records[0].total_tokens, result.usage.total_tokens);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_writes_no_record() {
    let primary = Arc::new(MockProvider::new("primary").with_delay(Duration::from_secs(5)));
    let h = harness(&[primary]);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let err = h
        .gateway
        .generate("hello", &RequestOptions::new().with_user("alice"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(h.records("alice").await.is_empty());
}

// ============================================================================
// Read APIs
// ============================================================================

#[tokio::test]
async fn test_count_units() {
    let h = harness(&[provider("primary")]);

    let first = h.gateway.count_units("some text to count", None, None).await.unwrap();
    assert_eq!(first.provider, "primary");
    assert_eq!(first.model, "primary-model");
    assert!(first.units >= 1);
    assert!(!first.cached);

    let second = h.gateway.count_units("some text to count", None, None).await.unwrap();
    assert_eq!(second.units, first.units);
    assert!(second.cached);

    let explicit = h
        .gateway
        .count_units("some text", Some("openai"), Some("gpt-4o"))
        .await
        .unwrap();
    assert_eq!(explicit.provider, "openai");
}

#[tokio::test]
async fn test_count_units_without_providers() {
    let h = harness_with(&[], &["primary"], StaticPlanResolver::new());

    // 11 chars / 4 -> 3, 2 words * 1.3 -> 3
    let result = h.gateway.count_units("hello world", None, None).await.unwrap();
    assert_eq!(result.provider, GENERIC_PROVIDER);
    assert_eq!(result.model, "");
    assert_eq!(result.units, 3);
    assert_eq!(result.method, EstimationMethod::Heuristic);
}

#[test]
fn test_list_providers_and_health() {
    let h = harness_with(&[provider("primary")], &["backup"], StaticPlanResolver::new());

    let providers = h.gateway.list_providers();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].id, "primary");
    assert!(providers[0].status.is_available());
    assert_eq!(providers[0].default_model.as_deref(), Some("primary-model"));
    assert_eq!(providers[1].id, "backup");
    assert!(!providers[1].status.is_available());
    assert!(providers[1].capabilities.is_empty());

    let health = h.gateway.health_check(None).unwrap();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.providers.get("primary"), Some(&true));
    assert_eq!(health.providers.get("backup"), Some(&false));

    let one = h.gateway.health_check(Some("primary")).unwrap();
    assert_eq!(one.status, HealthStatus::Healthy);
    assert!(h.gateway.health_check(Some("missing")).is_err());

    let none = harness_with(&[], &["primary"], StaticPlanResolver::new());
    assert_eq!(none.gateway.health_check(None).unwrap().status, HealthStatus::Unhealthy);
}

#[test]
fn test_list_models() {
    let h = harness(&[provider("primary")]);
    assert_eq!(h.gateway.list_models(None).len(), 3);
    let primary: Vec<String> = h
        .gateway
        .list_models(Some("primary"))
        .into_iter()
        .map(|d| d.model)
        .collect();
    assert_eq!(primary, vec!["primary-large", "primary-model"]);
}

#[tokio::test]
async fn test_usage_report_reflects_calls() {
    let h = harness(&[provider("primary")]);
    h.gateway
        .generate("hello", &RequestOptions::new().with_user("alice"), &CancellationToken::new())
        .await
        .unwrap();

    let report = h.gateway.usage_report("alice").await.unwrap();
    assert_eq!(report.window.total_tokens, 30);
    assert_eq!(report.window.request_count_hour, 1);
    assert_eq!(report.limits, PlanLimits::for_tier(PlanTier::Pro));
}
