//! In-memory usage store

use super::types::{UsageAggregate, UsageRecord};
use super::UsageStore;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Usage log held in process memory
///
/// Lost on restart; suited to tests and single-process deployments.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: RwLock<Vec<UsageRecord>>,
}

impl MemoryUsageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn append(&self, record: &UsageRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn aggregate(&self, user_id: &str, since: DateTime<Utc>) -> Result<UsageAggregate> {
        let records = self.records.read().await;
        let mut aggregate = UsageAggregate::default();
        records
            .iter()
            .filter(|r| r.user_id == user_id && r.timestamp >= since)
            .for_each(|r| aggregate.add(r));
        Ok(aggregate)
    }

    async fn records(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<UsageRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<UsageRecord> = records
            .iter()
            .filter(|r| r.user_id == user_id && r.timestamp >= since)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}
