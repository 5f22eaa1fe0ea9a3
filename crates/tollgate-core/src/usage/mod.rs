//! Usage - the append-only log of completed calls
//!
//! # Module Structure
//!
//! - `types`: UsageRecord, UsageStatus and UsageAggregate
//! - `memory`: process-local store
//! - `sqlite`: SQLite store (sqlx)
//!
//! Budget windows are always derived by aggregating records; nothing here is
//! ever updated in place.

mod memory;
mod sqlite;
mod types;

#[cfg(test)]
mod tests;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryUsageStore;
pub use sqlite::SqliteUsageStore;
pub use types::{UsageAggregate, UsageRecord, UsageStatus};

/// Append-only usage storage with range aggregation
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Append a record
    async fn append(&self, record: &UsageRecord) -> Result<()>;

    /// Sum a user's records with `timestamp >= since`
    async fn aggregate(&self, user_id: &str, since: DateTime<Utc>) -> Result<UsageAggregate>;

    /// A user's records with `timestamp >= since`, newest first
    async fn records(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<UsageRecord>>;
}
