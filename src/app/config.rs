//! Application configuration types
//!
//! One struct per section of `config/default.toml`. API keys never appear
//! here; adapters read them from the environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tollgate_core::{BudgetConfig, GatewayConfig, PlansConfig};
use tollgate_llm::{ProviderConfig, RouterConfig, TokenAccountingConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub router: RouterConfig,
    /// Per-provider overrides keyed by provider id
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub tokens: TokenAccountingConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub plans: PlansConfig,
    #[serde(default)]
    pub usage: UsageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Overrides for a provider, or the defaults when the section is absent
    pub fn provider(&self, id: &str) -> ProviderConfig {
        self.providers.get(id).cloned().unwrap_or_default()
    }
}

/// Redis configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL; unset disables the shared token cache
    #[serde(default)]
    pub url: Option<String>,
    /// Key prefix for cached token counts
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

fn default_redis_prefix() -> String {
    "tollgate:tokens:".to_string()
}

/// Where usage records are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageBackend {
    /// Process memory; lost on exit
    Memory,
    /// SQLite file
    #[default]
    Sqlite,
}

/// Usage log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    #[serde(default)]
    pub backend: UsageBackend,
    /// Database file for the SQLite backend
    #[serde(default = "default_usage_path")]
    pub path: PathBuf,
}

fn default_usage_path() -> PathBuf {
    PathBuf::from("data/usage.db")
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            backend: UsageBackend::default(),
            path: default_usage_path(),
        }
    }
}

/// Where model prices come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    /// Compiled-in price list
    #[default]
    Builtin,
    /// JSON array of descriptors on disk
    File,
}

/// Catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub source: CatalogSource,
    /// Descriptor file for the `file` source
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Seconds between refreshes; 0 disables the refresh task
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 {
    300
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source: CatalogSource::default(),
            path: None,
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "tollgate=info,tollgate_core=info,tollgate_llm=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}
