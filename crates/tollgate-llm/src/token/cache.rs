//! Token count caches
//!
//! The process-local cache is always present. A shared cache (Redis) can sit
//! behind it; callers treat every shared-cache failure as a miss.

use super::TokenCountResult;
use crate::error::{Error, Result};
use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

// ============================================================================
// Local cache
// ============================================================================

struct CacheEntry {
    value: TokenCountResult,
    inserted_at: Instant,
}

/// Bounded in-process cache with TTL and oldest-first eviction
pub struct MemoryTokenCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
    evict_fraction: f64,
}

impl MemoryTokenCache {
    /// Create a cache; `evict_fraction` of the entries go once `max_entries` is exceeded
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize, evict_fraction: f64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            evict_fraction: evict_fraction.clamp(0.01, 1.0),
        }
    }

    /// Fresh entry for `key`; an expired entry is dropped and reported as a miss
    #[must_use]
    pub fn get(&self, key: &str) -> Option<TokenCountResult> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries
                .remove_if(key, |_, entry| entry.inserted_at.elapsed() >= self.ttl);
        }
        None
    }

    /// Insert, evicting if the size bound is exceeded
    pub fn insert(&self, key: String, value: TokenCountResult) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        if self.entries.len() > self.max_entries {
            self.evict();
        }
    }

    /// Drop expired entries, returning how many went
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    fn evict(&self) {
        let purged = self.purge_expired();
        let len = self.entries.len();
        if len <= self.max_entries {
            debug!(purged, "Token cache trimmed by expiry");
            return;
        }

        let mut ages: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().inserted_at))
            .collect();
        ages.sort_by_key(|(_, inserted_at)| *inserted_at);

        let to_remove = ((len as f64) * self.evict_fraction).ceil() as usize;
        for (key, _) in ages.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }
        debug!(purged, evicted = to_remove, "Token cache evicted oldest entries");
    }

    /// Number of entries, including ones not yet purged
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Shared cache
// ============================================================================

/// Cache shared between gateway processes
#[async_trait::async_trait]
pub trait SharedTokenCache: Send + Sync {
    /// Fetch a cached count
    async fn get(&self, key: &str) -> Result<Option<TokenCountResult>>;

    /// Store a count with a TTL
    async fn put(&self, key: &str, value: &TokenCountResult, ttl: Duration) -> Result<()>;
}

/// Redis-backed shared cache
///
/// One multiplexed connection is opened on first use and shared by every
/// call; a failed command drops it so the next call reconnects.
pub struct RedisTokenCache {
    client: redis::Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    key_prefix: String,
}

impl RedisTokenCache {
    /// Connect lazily to `redis_url`
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| Error::Cache(e.to_string()))?;
        Ok(Self {
            client,
            connection: RwLock::new(None),
            key_prefix: "tollgate:tokens:".to_string(),
        })
    }

    /// Override the key prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Open the shared connection now instead of on the first lookup
    pub async fn connect(&self) -> Result<()> {
        self.connection().await.map(|_| ())
    }

    /// Whether a connection is currently held
    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut slot = self.connection.write().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Cache(e.to_string()))?;
        debug!("Redis token cache connected");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self, error: redis::RedisError) -> Error {
        *self.connection.write().await = None;
        Error::Cache(error.to_string())
    }
}

#[async_trait::async_trait]
impl SharedTokenCache for RedisTokenCache {
    async fn get(&self, key: &str) -> Result<Option<TokenCountResult>> {
        let mut conn = self.connection().await?;
        let data: Option<String> = match redis::cmd("GET")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
        {
            Ok(data) => data,
            Err(e) => return Err(self.reset(e).await),
        };

        data.map(|json| serde_json::from_str(&json).map_err(|e| Error::Cache(e.to_string())))
            .transpose()
    }

    async fn put(&self, key: &str, value: &TokenCountResult, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| Error::Cache(e.to_string()))?;
        let mut conn = self.connection().await?;
        let written = redis::cmd("SETEX")
            .arg(self.key(key))
            .arg(ttl.as_secs().max(1))
            .arg(json)
            .query_async::<()>(&mut conn)
            .await;
        match written {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reset(e).await),
        }
    }
}
