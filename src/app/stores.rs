//! Store initialization
//!
//! Usage log, model catalog and the token accountant's optional shared cache.

use super::config::{AppConfig, CatalogConfig, CatalogSource, UsageBackend, UsageConfig};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tollgate_core::{MemoryUsageStore, SqliteUsageStore, UsageStore};
use tollgate_llm::{
    CatalogStore, JsonFileCatalog, RedisTokenCache, StaticCatalog, TokenAccountant,
};
use tracing::{info, warn};

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Open the configured usage store
pub async fn init_usage_store(config: &UsageConfig) -> Result<Arc<dyn UsageStore>> {
    match config.backend {
        UsageBackend::Memory => {
            info!("Usage records kept in memory");
            Ok(Arc::new(MemoryUsageStore::new()))
        }
        UsageBackend::Sqlite => {
            let store = SqliteUsageStore::from_path(&config.path)
                .await
                .with_context(|| {
                    format!("Failed to open usage database at {}", config.path.display())
                })?;
            Ok(Arc::new(store))
        }
    }
}

/// The configured catalog source
pub fn init_catalog_store(config: &CatalogConfig) -> Result<Arc<dyn CatalogStore>> {
    match config.source {
        CatalogSource::Builtin => Ok(Arc::new(StaticCatalog::default())),
        CatalogSource::File => {
            let path = config
                .path
                .as_ref()
                .context("catalog.path is required when catalog.source = \"file\"")?;
            Ok(Arc::new(JsonFileCatalog::new(path)))
        }
    }
}

/// Token accountant, backed by Redis when `redis.url` is set
///
/// The shared connection is opened here so lookups reuse it. A Redis URL
/// that cannot be parsed only loses the shared cache; an unreachable server
/// is retried on first use.
pub async fn init_token_accountant(config: &AppConfig) -> TokenAccountant {
    let accountant = TokenAccountant::new(config.tokens.clone());
    let Some(url) = config.redis.url.as_deref() else {
        return accountant;
    };

    let cache = match RedisTokenCache::new(url) {
        Ok(cache) => cache.with_prefix(config.redis.prefix.clone()),
        Err(e) => {
            warn!(error = %e, "Redis token cache unavailable, using local cache only");
            return accountant;
        }
    };
    match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, cache.connect()).await {
        Ok(Ok(())) => info!("Shared token cache enabled (Redis)"),
        Ok(Err(e)) => warn!(error = %e, "Redis not reachable yet, will retry on first lookup"),
        Err(_) => warn!("Redis connect timed out, will retry on first lookup"),
    }
    accountant.with_shared_cache(Arc::new(cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_memory_usage_store() {
        let config = UsageConfig {
            backend: UsageBackend::Memory,
            ..UsageConfig::default()
        };
        let store = init_usage_store(&config).await.unwrap();
        let aggregate = store.aggregate("alice", Utc::now()).await.unwrap();
        assert_eq!(aggregate.request_count, 0);
    }

    #[tokio::test]
    async fn test_sqlite_usage_store_creates_directory() {
        let dir = std::env::temp_dir().join(format!("tollgate-app-{}", std::process::id()));
        let config = UsageConfig {
            backend: UsageBackend::Sqlite,
            path: dir.join("nested").join("usage.db"),
        };

        let store = init_usage_store(&config).await.unwrap();
        assert!(store.aggregate("alice", Utc::now()).await.is_ok());
        assert!(config.path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_catalog_requires_path() {
        let config = CatalogConfig {
            source: CatalogSource::File,
            path: None,
            refresh_interval_secs: 0,
        };
        assert!(init_catalog_store(&config).is_err());
    }

    #[tokio::test]
    async fn test_accountant_without_redis() {
        let accountant = init_token_accountant(&AppConfig::default()).await;
        assert_eq!(accountant.cache_len(), 0);
    }
}
