//! LLM Provider trait definition

use crate::catalog::Capability;
use crate::completion::{CompletionResponse, GenerationParams};
use crate::error::Result;
use crate::message::Message;

/// Capability interface every provider adapter implements
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider id (`openai`, `anthropic`, ...)
    fn name(&self) -> &str;

    /// Human-readable name
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Capabilities shared by the provider's models
    fn capabilities(&self) -> Vec<Capability>;

    /// Get available models
    fn available_models(&self) -> Vec<String>;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Single-prompt generation
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<CompletionResponse> {
        self.chat(&[Message::user(prompt)], params).await
    }

    /// Multi-turn chat
    async fn chat(&self, messages: &[Message], params: &GenerationParams)
        -> Result<CompletionResponse>;
}
