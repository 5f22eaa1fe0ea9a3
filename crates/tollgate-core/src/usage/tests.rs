use super::*;
use chrono::Duration;
use tollgate_llm::TokenUsage;

fn record(user: &str, tokens: u32, cost: f64, minutes_ago: i64) -> UsageRecord {
    UsageRecord::success(
        user,
        "openai",
        "gpt-4o-mini",
        TokenUsage::new(tokens / 2, tokens - tokens / 2),
        cost,
        120,
    )
    .with_timestamp(Utc::now() - Duration::minutes(minutes_ago))
}

async fn exercise_store(store: &dyn UsageStore) {
    store.append(&record("alice", 100, 0.01, 5)).await.unwrap();
    store.append(&record("alice", 300, 0.03, 90)).await.unwrap();
    store.append(&record("alice", 50, 0.5, 60 * 30)).await.unwrap();
    store.append(&record("bob", 999, 9.0, 1)).await.unwrap();
    store
        .append(&UsageRecord::failure("alice", "anthropic", "claude", 40))
        .await
        .unwrap();

    let day = store
        .aggregate("alice", Utc::now() - Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(day.total_tokens, 400);
    assert!((day.total_cost - 0.04).abs() < 1e-9);
    assert_eq!(day.request_count, 3);

    let hour = store
        .aggregate("alice", Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(hour.request_count, 2);
    assert_eq!(hour.total_tokens, 100);

    let nobody = store.aggregate("carol", Utc::now() - Duration::hours(24)).await.unwrap();
    assert_eq!(nobody, UsageAggregate::default());

    let recent = store
        .records("alice", Utc::now() - Duration::hours(24), 10)
        .await
        .unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].status, UsageStatus::Failure);
    assert!(recent.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

    let limited = store
        .records("alice", Utc::now() - Duration::hours(24), 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_memory_store() {
    let store = MemoryUsageStore::new();
    assert!(store.is_empty().await);
    exercise_store(&store).await;
    assert_eq!(store.len().await, 5);
}

#[tokio::test]
async fn test_sqlite_store() {
    let store = SqliteUsageStore::in_memory().await.unwrap();
    exercise_store(&store).await;
}

#[tokio::test]
async fn test_sqlite_round_trip_preserves_fields() {
    let store = SqliteUsageStore::in_memory().await.unwrap();
    let original = record("alice", 42, 0.0021, 0).estimated();
    store.append(&original).await.unwrap();

    let loaded = store
        .records("alice", Utc::now() - Duration::hours(1), 5)
        .await
        .unwrap();
    assert_eq!(loaded.len(), 1);
    let loaded = &loaded[0];
    assert_eq!(loaded.id, original.id);
    assert_eq!(loaded.total_tokens, 42);
    assert_eq!(loaded.input_tokens, 21);
    assert!(loaded.estimated);
    assert_eq!(loaded.status, UsageStatus::Success);
    assert_eq!(
        loaded.timestamp.timestamp_micros(),
        original.timestamp.timestamp_micros()
    );
}

#[tokio::test]
async fn test_sqlite_from_path_creates_file() {
    let dir = std::env::temp_dir().join(format!("tollgate-usage-{}", uuid::Uuid::new_v4()));
    let path = dir.join("usage.db");

    let store = SqliteUsageStore::from_path(&path).await.unwrap();
    store.append(&record("alice", 10, 0.001, 0)).await.unwrap();
    assert!(path.exists());

    // Reopening runs migrations again without touching existing rows
    let reopened = SqliteUsageStore::from_path(&path).await.unwrap();
    let agg = reopened
        .aggregate("alice", Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(agg.request_count, 1);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_failure_record_has_no_cost() {
    let failure = UsageRecord::failure("alice", "openai", "gpt-5", 10);
    assert_eq!(failure.status, UsageStatus::Failure);
    assert_eq!(failure.total_tokens, 0);
    assert_eq!(failure.cost, 0.0);
    assert!(!failure.estimated);
}

#[test]
fn test_status_parse() {
    assert_eq!("success".parse::<UsageStatus>(), Ok(UsageStatus::Success));
    assert_eq!("failure".parse::<UsageStatus>(), Ok(UsageStatus::Failure));
    assert!("pending".parse::<UsageStatus>().is_err());
}
