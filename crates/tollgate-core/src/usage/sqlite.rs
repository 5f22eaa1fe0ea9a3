//! SqliteUsageStore - SQLite-based usage storage

use super::types::{UsageAggregate, UsageRecord, UsageStatus};
use super::UsageStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Usage store persisting records to a `usage_records` table
#[derive(Clone)]
pub struct SqliteUsageStore {
    pool: SqlitePool,
}

impl SqliteUsageStore {
    /// Create a store over an existing pool (migrations are not run)
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database file and run migrations
    pub async fn from_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Store(format!("failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        info!("SQLite usage store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        debug!("In-memory SQLite usage store initialized");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_records (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                cost REAL NOT NULL DEFAULT 0,
                latency_ms INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                estimated INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_usage_user_time
            ON usage_records(user_id, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        Ok(())
    }
}

/// Fixed-width UTC form so text comparison orders like time
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_record(row: SqliteRow) -> Result<UsageRecord> {
    let id_str: String = row.get("id");
    let status_str: String = row.get("status");
    let timestamp_str: String = row.get("timestamp");
    let input_tokens: i64 = row.get("input_tokens");
    let output_tokens: i64 = row.get("output_tokens");
    let total_tokens: i64 = row.get("total_tokens");
    let latency_ms: i64 = row.get("latency_ms");

    let id = Uuid::parse_str(&id_str).map_err(|e| Error::Store(format!("invalid uuid: {e}")))?;
    let status: UsageStatus = status_str.parse().map_err(Error::Store)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map_err(|e| Error::Store(format!("invalid timestamp: {e}")))?
        .with_timezone(&Utc);

    Ok(UsageRecord {
        id,
        user_id: row.get("user_id"),
        provider: row.get("provider"),
        model: row.get("model"),
        input_tokens: to_u32(input_tokens),
        output_tokens: to_u32(output_tokens),
        total_tokens: to_u32(total_tokens),
        cost: row.get("cost"),
        latency_ms: u64::try_from(latency_ms).unwrap_or(0),
        status,
        estimated: row.get("estimated"),
        timestamp,
    })
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    #[instrument(skip(self, record), fields(user_id = %record.user_id, provider = %record.provider))]
    async fn append(&self, record: &UsageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (
                id, user_id, provider, model, input_tokens, output_tokens,
                total_tokens, cost, latency_ms, status, estimated, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.user_id)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(i64::from(record.input_tokens))
        .bind(i64::from(record.output_tokens))
        .bind(i64::from(record.total_tokens))
        .bind(record.cost)
        .bind(i64::try_from(record.latency_ms).unwrap_or(i64::MAX))
        .bind(record.status.as_str())
        .bind(record.estimated)
        .bind(format_timestamp(record.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        debug!(id = %record.id, cost = record.cost, "Usage record appended");
        Ok(())
    }

    async fn aggregate(&self, user_id: &str, since: DateTime<Utc>) -> Result<UsageAggregate> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(total_tokens), 0) AS total_tokens,
                COALESCE(SUM(cost), 0.0) AS total_cost,
                COUNT(*) AS request_count
            FROM usage_records
            WHERE user_id = ?1 AND timestamp >= ?2
            "#,
        )
        .bind(user_id)
        .bind(format_timestamp(since))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        let total_tokens: i64 = row.get("total_tokens");
        let total_cost: f64 = row.get("total_cost");
        let request_count: i64 = row.get("request_count");

        Ok(UsageAggregate {
            total_tokens: u64::try_from(total_tokens).unwrap_or(0),
            total_cost,
            request_count: u64::try_from(request_count).unwrap_or(0),
        })
    }

    async fn records(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM usage_records
            WHERE user_id = ?1 AND timestamp >= ?2
            ORDER BY timestamp DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(format_timestamp(since))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        rows.into_iter().map(row_to_record).collect()
    }
}
