//! OpenAI - async-openai provider
//!
//! Chat completions through async-openai 0.32. The HTTP client carries an
//! explicit timeout and the client's internal backoff is disabled, so a 429
//! surfaces at once as a rate-limit error and the router falls back.

use crate::catalog::Capability;
use crate::completion::{CompletionResponse, GenerationParams, TokenUsage};
use crate::error::{Error, Result};
use crate::message::{Message, MessageRole};
use crate::router::{LlmProvider, ProviderConfig};
use crate::util::{mask_api_key, truncate_safe};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, StopConfiguration,
    },
    Client,
};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};


/// Available OpenAI models
///
/// GPT-5 family pricing (per 1M tokens):
/// - gpt-5-nano: $0.05/$0.40
/// - gpt-5: $1.25/$10.00
///
/// GPT-4o family (legacy, still available):
/// - gpt-4o-mini: $0.15/$0.60
/// - gpt-4o: $2.50/$10.00
pub const MODELS: &[&str] = &["gpt-5", "gpt-5-nano", "gpt-4o", "gpt-4o-mini"];

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-5";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the OpenAI provider
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key for authentication
    pub api_key: String,
    /// Optional custom base URL (for Azure OpenAI or proxies)
    pub base_url: Option<String>,
    /// Optional organization ID
    pub org_id: Option<String>,
    /// Default model to use for completions
    pub default_model: String,
    /// Request timeout duration
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("org_id", &self.org_id.as_ref().map(|_| "[REDACTED]"))
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    /// Creates a new configuration with the given API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            org_id: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Reads `OPENAI_API_KEY` (required), `OPENAI_BASE_URL`, `OPENAI_ORG_ID`
    /// and `OPENAI_MODEL`.
    ///
    /// # Errors
    /// Returns error if `OPENAI_API_KEY` is not set
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::NotConfigured("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            org_id: std::env::var("OPENAI_ORG_ID").ok(),
            default_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Apply file/env overrides from the `providers.openai` section
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ProviderConfig) -> Self {
        if let Some(url) = &overrides.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(model) = &overrides.default_model {
            self.default_model = model.clone();
        }
        if let Some(ms) = overrides.timeout_ms {
            self.timeout = Duration::from_millis(ms);
        }
        self
    }

    /// Sets a custom base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Sets the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Backoff handed to async-openai: give up after the first failure
pub(crate) fn client_backoff() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..Default::default()
    }
}

/// OpenAI API provider for chat completions
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    default_model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Creates a new provider with the given configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        if let Some(org_id) = &config.org_id {
            openai_config = openai_config.with_org_id(org_id);
        }

        // async-openai's default reqwest client has no timeout
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;

        let client = Client::build(http_client, openai_config, client_backoff());

        Ok(Self {
            client,
            default_model: config.default_model,
            timeout: config.timeout,
        })
    }

    /// Creates a provider from environment variables
    ///
    /// # Errors
    /// Returns error if `OPENAI_API_KEY` is not set
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    fn convert_message(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                name: None,
            }
            .into(),
            MessageRole::User => ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }
            .into(),
            MessageRole::Assistant =>
            {
                #[allow(deprecated)]
                ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    function_call: None,
                    refusal: None,
                    audio: None,
                }
                .into()
            }
        }
    }

    fn map_error(&self, error: OpenAIError) -> Error {
        match error {
            OpenAIError::ApiError(api) => {
                api_error(&api.message, api.r#type.as_deref(), api.code.as_deref())
            }
            OpenAIError::Reqwest(e) => Error::from_reqwest(&e, self.timeout),
            other => Error::Api(truncate_safe(&other.to_string(), 300).to_string()),
        }
    }
}

/// Build a structured error from an OpenAI error body
///
/// OpenAI's `code` is the more specific field (`insufficient_quota`,
/// `model_not_found`); `type` is used when no code is present.
pub(crate) fn api_error(message: &str, error_type: Option<&str>, code: Option<&str>) -> Error {
    Error::ProviderApi {
        status: None,
        code: code.or(error_type).map(str::to_string),
        message: truncate_safe(message, 300).to_string(),
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn display_name(&self) -> &str {
        "OpenAI"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::Text,
            Capability::Vision,
            Capability::FunctionCalling,
            Capability::Streaming,
        ]
    }

    fn available_models(&self) -> Vec<String> {
        MODELS.iter().map(|s| (*s).to_string()).collect()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    #[instrument(skip(self, messages, params), fields(model = %params.model))]
    async fn chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResponse> {
        let model = params.model_or(&self.default_model);

        let request = CreateChatCompletionRequest {
            model: model.to_string(),
            messages: messages.iter().map(Self::convert_message).collect(),
            max_completion_tokens: params.max_tokens,
            temperature: params.temperature,
            stop: params.stop.clone().map(StopConfiguration::StringArray),
            ..Default::default()
        };

        debug!("Sending request to OpenAI");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| self.map_error(e))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| Error::InvalidResponse("No choices in response".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        Ok(CompletionResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            usage,
            finish_reason: choice
                .finish_reason
                .as_ref()
                .map(|r| format!("{r:?}").to_lowercase()),
            model: response.model,
        })
    }
}
