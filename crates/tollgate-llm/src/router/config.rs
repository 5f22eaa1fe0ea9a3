//! Configuration types for provider routing

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_max_concurrent_requests() -> usize {
    32
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Per-provider settings; credentials come from the environment, never from here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether the provider may be registered at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Default model override
    #[serde(default)]
    pub default_model: Option<String>,
    /// HTTP timeout for this provider in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            default_model: None,
            timeout_ms: None,
        }
    }
}

// ============================================================================
// Router Configuration
// ============================================================================

/// Router configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Preferred provider when a request does not pin one
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Deadline for a single provider attempt
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound on in-flight provider calls
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Walk other providers when an unpinned request fails
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_concurrent_requests: default_max_concurrent_requests(),
            fallback_enabled: true,
        }
    }
}

impl RouterConfig {
    /// Set the default provider
    #[must_use]
    pub fn with_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Set the concurrency bound
    #[must_use]
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }
}
