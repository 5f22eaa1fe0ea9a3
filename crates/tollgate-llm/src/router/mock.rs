//! Mock LLM Provider
//!
//! Scriptable adapter for tests and offline runs: queued replies, a sticky
//! failure mode, an artificial delay and call counting.

use super::provider::LlmProvider;
use crate::catalog::Capability;
use crate::completion::{CompletionResponse, GenerationParams, TokenUsage};
use crate::error::{Error, Result};
use crate::message::Message;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ErrorFactory = Arc<dyn Fn() -> Error + Send + Sync>;

/// A mock provider returning queued replies, or a canned default
pub struct MockProvider {
    name: String,
    models: Vec<String>,
    capabilities: Vec<Capability>,
    replies: Arc<Mutex<VecDeque<Result<CompletionResponse>>>>,
    failure: Option<ErrorFactory>,
    delay: Option<Duration>,
    usage: Option<TokenUsage>,
    calls: Arc<AtomicUsize>,
    last_params: Arc<Mutex<Option<GenerationParams>>>,
}

impl MockProvider {
    /// Create a mock registered under `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            models: vec![format!("{name}-model")],
            name,
            capabilities: vec![Capability::Text],
            replies: Arc::new(Mutex::new(VecDeque::new())),
            failure: None,
            delay: None,
            usage: Some(TokenUsage::new(10, 20)),
            calls: Arc::new(AtomicUsize::new(0)),
            last_params: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the model list; the first entry becomes the default
    #[must_use]
    pub fn with_models(mut self, models: &[&str]) -> Self {
        if !models.is_empty() {
            self.models = models.iter().map(|m| (*m).to_string()).collect();
        }
        self
    }

    /// Replace the capability set
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    /// Usage attached to default replies; `None` simulates a provider that reports none
    #[must_use]
    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }

    /// Sleep before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call that has no queued reply
    #[must_use]
    pub fn failing_with<F>(mut self, make_error: F) -> Self
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        self.failure = Some(Arc::new(make_error));
        self
    }

    /// Queue a successful reply with the given text
    pub fn push_text(&self, content: impl Into<String>) {
        let reply = CompletionResponse {
            content: content.into(),
            usage: self.usage,
            finish_reason: Some("stop".to_string()),
            model: String::new(),
        };
        self.lock_replies().push_back(Ok(reply));
    }

    /// Queue a failure
    pub fn push_error(&self, error: Error) {
        self.lock_replies().push_back(Err(error));
    }

    /// Calls received so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Parameters of the most recent call
    #[must_use]
    pub fn last_params(&self) -> Option<GenerationParams> {
        self.last_params
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<CompletionResponse>>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.capabilities.clone()
    }

    fn available_models(&self) -> Vec<String> {
        self.models.clone()
    }

    fn default_model(&self) -> &str {
        self.models.first().map_or("mock-model", String::as_str)
    }

    async fn chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap_or_else(|e| e.into_inner()) = Some(params.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let model = params.model_or(self.default_model()).to_string();
        let queued = self.lock_replies().pop_front();
        match queued {
            Some(Ok(mut reply)) => {
                reply.model = model;
                Ok(reply)
            }
            Some(Err(e)) => Err(e),
            None => match &self.failure {
                Some(make_error) => Err(make_error()),
                None => {
                    let last = messages.last().map_or("", |m| m.content.as_str());
                    Ok(CompletionResponse {
                        content: format!("mock response to: {last}"),
                        usage: self.usage,
                        finish_reason: Some("stop".to_string()),
                        model,
                    })
                }
            },
        }
    }
}
