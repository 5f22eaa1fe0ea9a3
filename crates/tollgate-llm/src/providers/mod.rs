//! Provider adapters
//!
//! Each adapter turns the uniform [`LlmProvider`](crate::router::LlmProvider)
//! call into one provider's wire format and maps its failures onto
//! [`Error`](crate::error::Error) variants the classifier understands.

/// Anthropic Messages API provider
pub mod anthropic;
/// OpenAI-compatible chat completions (DeepSeek, Groq, Ollama)
pub mod compat;
/// OpenAI provider
pub mod openai;
