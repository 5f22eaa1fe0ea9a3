//! Tollgate LLM - provider abstraction for the gateway
//!
//! This crate holds everything that talks to, or reasons about, model providers:
//! - Catalog: model descriptors, capabilities and the refreshable pricing table
//! - Token: unit estimation with a bounded cache (local, optionally Redis-backed)
//! - Classify: stable error taxonomy for provider failures
//! - Router: provider registry, selection, bounded concurrency and fallback
//! - Providers: OpenAI, Anthropic and OpenAI-compatible adapters (DeepSeek, Groq, Ollama)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod classify;
pub mod completion;
pub mod error;
pub mod message;
pub mod providers;
pub mod router;
pub mod token;
pub mod util;

pub use catalog::{
    Capability, CatalogStore, JsonFileCatalog, ModelDescriptor, ModelTier, PricingTable,
    StaticCatalog,
};
pub use classify::{classify, ClassifiedError, ErrorKind};
pub use completion::{CompletionResponse, GenerationParams, TokenUsage};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use router::{
    AttemptRecord, Invocation, LlmProvider, LlmRouter, MockProvider, ProviderConfig,
    ProviderRegistry, ProviderStatus, RouteFailure, RouteOutcome, RouteRequest, RouteSuccess,
    RouterConfig, Selection, PROVIDER_NOT_AVAILABLE,
};
pub use token::{
    EstimationMethod, MemoryTokenCache, RedisTokenCache, SharedTokenCache, TokenAccountant,
    TokenAccountingConfig, TokenCountResult,
};

// Re-export provider types
pub use providers::anthropic::{AnthropicConfig, AnthropicProvider};
pub use providers::compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use providers::openai::{OpenAiConfig, OpenAiProvider};
