//! LLM provider resolution
//!
//! Every known provider is registered exactly once, in fallback order. A
//! provider that is disabled or has no credentials is still registered, as
//! unavailable, so it shows up in listings and health checks.

use super::config::AppConfig;
use std::sync::Arc;
use tollgate_llm::{
    AnthropicConfig, AnthropicProvider, LlmProvider, OpenAiCompatConfig, OpenAiCompatProvider,
    OpenAiConfig, OpenAiProvider, ProviderConfig, ProviderRegistry,
};
use tracing::{debug, info, warn};

/// Provider ids in registration (and fallback) order
pub const KNOWN_PROVIDERS: [&str; 5] = ["openai", "anthropic", "deepseek", "groq", "ollama"];

fn construct(id: &str, overrides: &ProviderConfig) -> tollgate_llm::Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match id {
        "openai" => {
            let config = OpenAiConfig::from_env()?.with_overrides(overrides);
            Arc::new(OpenAiProvider::new(config)?)
        }
        "anthropic" => {
            let config = AnthropicConfig::from_env()?.with_overrides(overrides);
            Arc::new(AnthropicProvider::new(config)?)
        }
        other => {
            let config = OpenAiCompatConfig::from_env(other)?.with_overrides(overrides);
            Arc::new(OpenAiCompatProvider::new(config)?)
        }
    };
    Ok(provider)
}

/// Build the provider registry from configuration and the environment
pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    for id in KNOWN_PROVIDERS {
        let overrides = config.provider(id);
        if !overrides.enabled {
            debug!(provider = id, "Provider disabled in configuration");
            registry.register_unavailable(id, "disabled in configuration");
            continue;
        }

        match construct(id, &overrides) {
            Ok(adapter) => {
                info!(provider = id, model = adapter.default_model(), "Registered provider");
                registry.register(adapter);
            }
            Err(e) => {
                debug!(provider = id, error = %e, "Provider not available");
                registry.register_unavailable(id, e.to_string());
            }
        }
    }

    if registry.available_ids().is_empty() {
        warn!("No LLM provider is available. Set OPENAI_API_KEY, ANTHROPIC_API_KEY, DEEPSEEK_API_KEY or GROQ_API_KEY.");
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_providers_are_listed_unavailable() {
        let mut config = AppConfig::default();
        for id in KNOWN_PROVIDERS {
            config.providers.insert(
                id.to_string(),
                ProviderConfig {
                    enabled: false,
                    ..ProviderConfig::default()
                },
            );
        }

        let registry = build_registry(&config);

        assert_eq!(registry.len(), KNOWN_PROVIDERS.len());
        assert!(registry.available_ids().is_empty());
        for id in KNOWN_PROVIDERS {
            assert!(registry.is_registered(id));
            assert!(!registry.is_available(id));
        }
    }

    #[test]
    fn test_unknown_compat_id_has_no_preset() {
        assert!(construct("nope", &ProviderConfig::default()).is_err());
    }
}
