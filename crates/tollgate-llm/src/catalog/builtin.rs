//! Built-in catalog (per 1M tokens, USD)

use super::descriptor::{Capability, ModelDescriptor};

/// Default cost per 1M input tokens (USD) for unknown models
pub const DEFAULT_INPUT_COST_PER_MILLION: f64 = 5.0;

/// Default cost per 1M output tokens (USD) for unknown models
pub const DEFAULT_OUTPUT_COST_PER_MILLION: f64 = 15.0;

const CHAT: &[Capability] = &[
    Capability::Text,
    Capability::FunctionCalling,
    Capability::Streaming,
];

const MULTIMODAL: &[Capability] = &[
    Capability::Text,
    Capability::Vision,
    Capability::FunctionCalling,
    Capability::Streaming,
];

const FRONTIER: &[Capability] = &[
    Capability::Text,
    Capability::Vision,
    Capability::FunctionCalling,
    Capability::Streaming,
    Capability::Reasoning,
];

/// Default catalog shipped with the binary
#[must_use]
pub fn default_catalog() -> Vec<ModelDescriptor> {
    vec![
        // ====================================================================
        // OpenAI - GPT-5 family, GPT-4o legacy
        // ====================================================================
        ModelDescriptor::new("openai", "gpt-5", 1.25, 10.00)
            .with_limits(400_000, 128_000)
            .with_capabilities(FRONTIER),
        ModelDescriptor::new("openai", "gpt-5-nano", 0.05, 0.40)
            .with_limits(400_000, 128_000)
            .with_capabilities(FRONTIER),
        ModelDescriptor::new("openai", "gpt-4o", 2.50, 10.00)
            .with_limits(128_000, 16_384)
            .with_capabilities(MULTIMODAL),
        ModelDescriptor::new("openai", "gpt-4o-mini", 0.15, 0.60)
            .with_limits(128_000, 16_384)
            .with_capabilities(MULTIMODAL),
        // ====================================================================
        // Anthropic - Claude 4.5 family
        // ====================================================================
        ModelDescriptor::new("anthropic", "claude-opus-4-5-20250514", 5.00, 25.00)
            .with_limits(200_000, 32_000)
            .with_capabilities(FRONTIER),
        ModelDescriptor::new("anthropic", "claude-sonnet-4-5-20250929", 3.00, 15.00)
            .with_limits(200_000, 64_000)
            .with_capabilities(FRONTIER),
        ModelDescriptor::new("anthropic", "claude-haiku-4-5-20251001", 1.00, 5.00)
            .with_limits(200_000, 64_000)
            .with_capabilities(MULTIMODAL),
        // ====================================================================
        // DeepSeek - OpenAI-compatible, ultra-low-cost
        // ====================================================================
        ModelDescriptor::new("deepseek", "deepseek-chat", 0.14, 0.28)
            .with_limits(64_000, 8_192)
            .with_capabilities(CHAT),
        ModelDescriptor::new("deepseek", "deepseek-reasoner", 0.55, 2.19)
            .with_limits(64_000, 8_192)
            .with_capabilities(&[Capability::Text, Capability::Streaming, Capability::Reasoning]),
        // ====================================================================
        // Groq - OpenAI-compatible, fast inference
        // ====================================================================
        ModelDescriptor::new("groq", "llama-3.1-8b-instant", 0.05, 0.08)
            .with_limits(131_072, 8_192)
            .with_capabilities(CHAT),
        ModelDescriptor::new("groq", "llama-3.3-70b-versatile", 0.59, 0.79)
            .with_limits(131_072, 32_768)
            .with_capabilities(CHAT),
        ModelDescriptor::new("groq", "openai/gpt-oss-120b", 0.15, 0.75)
            .with_limits(131_072, 32_766)
            .with_capabilities(CHAT),
        // ====================================================================
        // Ollama - local, free
        // ====================================================================
        ModelDescriptor::new("ollama", "llama3.2", 0.0, 0.0)
            .with_limits(128_000, 4_096)
            .with_capabilities(&[Capability::Text, Capability::Streaming]),
        ModelDescriptor::new("ollama", "qwen2.5:7b", 0.0, 0.0)
            .with_limits(32_768, 4_096)
            .with_capabilities(&[Capability::Text, Capability::Streaming]),
    ]
}
