//! Token accounting engine

use super::cache::{MemoryTokenCache, SharedTokenCache};
use super::estimator::estimate_units;
use super::TokenCountResult;
use crate::message::Message;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Role marker and separators per chat message
const MESSAGE_OVERHEAD: u32 = 6;
/// Start/end markers per conversation
const CONVERSATION_OVERHEAD: u32 = 3;

fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_max_cache_entries() -> usize {
    1000
}
fn default_evict_fraction() -> f64 {
    0.2
}
fn default_shared_timeout_ms() -> u64 {
    50
}

/// Token accounting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAccountingConfig {
    /// Lifetime of a cached count
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Local cache size bound
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,
    /// Share of entries evicted when the bound is exceeded
    #[serde(default = "default_evict_fraction")]
    pub evict_fraction: f64,
    /// Upper bound on any single shared-cache round trip
    #[serde(default = "default_shared_timeout_ms")]
    pub shared_timeout_ms: u64,
}

impl Default for TokenAccountingConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            max_cache_entries: default_max_cache_entries(),
            evict_fraction: default_evict_fraction(),
            shared_timeout_ms: default_shared_timeout_ms(),
        }
    }
}

impl TokenAccountingConfig {
    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    fn shared_timeout(&self) -> Duration {
        Duration::from_millis(self.shared_timeout_ms)
    }
}

/// Estimates units for text under a provider/model, with caching
///
/// `estimate` never fails: cache trouble degrades to recomputation and
/// tokenizer trouble degrades to the heuristic.
pub struct TokenAccountant {
    local: MemoryTokenCache,
    shared: Option<Arc<dyn SharedTokenCache>>,
    config: TokenAccountingConfig,
}

impl TokenAccountant {
    /// Create an engine with a process-local cache only
    #[must_use]
    pub fn new(config: TokenAccountingConfig) -> Self {
        let local = MemoryTokenCache::new(
            config.cache_ttl(),
            config.max_cache_entries,
            config.evict_fraction,
        );
        Self {
            local,
            shared: None,
            config,
        }
    }

    /// Put a shared cache behind the local one
    #[must_use]
    pub fn with_shared_cache(mut self, shared: Arc<dyn SharedTokenCache>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Cache key: SHA-256 over provider, model and text
    #[must_use]
    pub fn cache_key(provider: &str, model: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update([0u8]);
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Estimate units for `text`
    pub async fn estimate(&self, text: &str, provider: &str, model: &str) -> TokenCountResult {
        let key = Self::cache_key(provider, model, text);

        if let Some(mut hit) = self.local.get(&key) {
            hit.cached = true;
            return hit;
        }

        if let Some(mut hit) = self.shared_get(&key).await {
            self.local.insert(key, hit.clone());
            hit.cached = true;
            return hit;
        }

        let (units, method) = estimate_units(provider, model, text);
        let result = TokenCountResult {
            content_hash: key.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
            units,
            method,
            computed_at: Utc::now(),
            cached: false,
        };
        debug!(provider, model, units, method = %method, "Estimated units");

        self.local.insert(key.clone(), result.clone());
        self.shared_put(&key, &result).await;
        result
    }

    /// Estimate units for a chat transcript, including per-message overhead
    ///
    /// Each message is counted as `role: content`, one per line.
    pub async fn estimate_messages(
        &self,
        messages: &[Message],
        provider: &str,
        model: &str,
    ) -> TokenCountResult {
        let text = messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let mut result = self.estimate(&text, provider, model).await;
        let overhead = MESSAGE_OVERHEAD
            .saturating_mul(messages.len() as u32)
            .saturating_add(CONVERSATION_OVERHEAD);
        result.units = result.units.saturating_add(overhead);
        result
    }

    /// Entries currently held in the local cache
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.local.len()
    }

    /// Drop expired local entries
    pub fn purge_expired(&self) -> usize {
        self.local.purge_expired()
    }

    async fn shared_get(&self, key: &str) -> Option<TokenCountResult> {
        let shared = self.shared.as_ref()?;
        match tokio::time::timeout(self.config.shared_timeout(), shared.get(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(error = %e, "Shared token cache read failed, using local cache");
                None
            }
            Err(_) => {
                warn!("Shared token cache read timed out, using local cache");
                None
            }
        }
    }

    async fn shared_put(&self, key: &str, value: &TokenCountResult) {
        let Some(shared) = self.shared.as_ref() else {
            return;
        };
        let write = shared.put(key, value, self.config.cache_ttl());
        match tokio::time::timeout(self.config.shared_timeout(), write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Shared token cache write failed"),
            Err(_) => warn!("Shared token cache write timed out"),
        }
    }
}

impl Default for TokenAccountant {
    fn default() -> Self {
        Self::new(TokenAccountingConfig::default())
    }
}
