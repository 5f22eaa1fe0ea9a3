use super::convert::{convert_messages, convert_response, error_from_response};
use super::types::{AnthropicConfig, AnthropicRequest, AnthropicResponse, API_VERSION, MODELS};
use crate::catalog::Capability;
use crate::completion::{CompletionResponse, GenerationParams};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::router::LlmProvider;
use crate::util::parse_retry_after;
use reqwest::Client;
use tracing::{debug, instrument};

/// Anthropic Claude provider
pub struct AnthropicProvider {
    pub(crate) client: Client,
    pub(crate) config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    ///
    /// # Errors
    /// Returns error if `ANTHROPIC_API_KEY` is not set
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    pub(crate) fn build_request(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> AnthropicRequest {
        let (system, messages) = convert_messages(messages);
        AnthropicRequest {
            model: params.model_or(&self.config.default_model).to_string(),
            max_tokens: params.max_tokens.unwrap_or(self.config.default_max_tokens),
            system,
            messages,
            temperature: params.temperature,
            stop_sequences: params.stop.clone(),
        }
    }

    async fn send_request(&self, request: AnthropicRequest) -> Result<AnthropicResponse> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        debug!(%url, "Sending request to Anthropic");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&e, self.config.timeout))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&e, self.config.timeout))?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), retry_after, &body));
        }

        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn display_name(&self) -> &str {
        "Anthropic"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::Text,
            Capability::Vision,
            Capability::FunctionCalling,
            Capability::Streaming,
            Capability::Reasoning,
        ]
    }

    fn available_models(&self) -> Vec<String> {
        MODELS.iter().map(|s| (*s).to_string()).collect()
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, messages, params), fields(model = %params.model))]
    async fn chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResponse> {
        let request = self.build_request(messages, params);
        let response = self.send_request(request).await?;
        Ok(convert_response(response))
    }
}
