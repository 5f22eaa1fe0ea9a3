//! Provider registry
//!
//! Fixed provider-id → adapter table, built once at startup and read-only
//! afterwards. Iteration order is registration order, which is also the
//! fallback order.

use super::provider::LlmProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a registered provider can take traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Adapter constructed and usable
    Available,
    /// Known provider that could not be set up
    Unavailable {
        /// Why (missing credentials, disabled, bad config)
        reason: String,
    },
}

impl ProviderStatus {
    /// Whether traffic can be sent
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

struct Entry {
    id: String,
    adapter: Option<Arc<dyn LlmProvider>>,
    status: ProviderStatus,
}

/// Registry of provider adapters in registration order
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<Entry>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a usable adapter under its own name
    pub fn register(&mut self, adapter: Arc<dyn LlmProvider>) {
        let id = adapter.name().to_string();
        debug!(provider = %id, "Registering LLM provider");
        self.insert(Entry {
            id,
            adapter: Some(adapter),
            status: ProviderStatus::Available,
        });
    }

    /// Record a known provider that cannot take traffic
    pub fn register_unavailable(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        let id = id.into();
        let reason = reason.into();
        debug!(provider = %id, %reason, "Registering unavailable LLM provider");
        self.insert(Entry {
            id,
            adapter: None,
            status: ProviderStatus::Unavailable { reason },
        });
    }

    fn insert(&mut self, entry: Entry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == entry.id) {
            warn!(provider = %entry.id, "Provider registered twice, replacing earlier entry");
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    /// Adapter for `id`, only when it is available
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.adapter.clone())
    }

    /// Status for `id`, `None` when the id was never registered
    #[must_use]
    pub fn status(&self, id: &str) -> Option<&ProviderStatus> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.status)
    }

    /// Whether the id was registered at all
    #[must_use]
    pub fn is_registered(&self, id: &str) -> bool {
        self.status(id).is_some()
    }

    /// Whether the id is registered and available
    #[must_use]
    pub fn is_available(&self, id: &str) -> bool {
        self.status(id).is_some_and(ProviderStatus::is_available)
    }

    /// Available provider ids in registration order
    #[must_use]
    pub fn available_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.status.is_available())
            .map(|e| e.id.as_str())
            .collect()
    }

    /// All entries in registration order
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&str, &ProviderStatus, Option<&Arc<dyn LlmProvider>>)> {
        self.entries
            .iter()
            .map(|e| (e.id.as_str(), &e.status, e.adapter.as_ref()))
    }

    /// Number of registered providers, available or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.id, &e.status)))
            .finish()
    }
}
