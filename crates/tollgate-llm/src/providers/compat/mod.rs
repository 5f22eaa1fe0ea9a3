//! OpenAI-compatible chat completions
//!
//! One adapter for every provider that speaks `POST {base}/chat/completions`
//! with bearer auth. Presets cover DeepSeek, Groq and a local Ollama endpoint.

use crate::catalog::Capability;
use crate::completion::{CompletionResponse, GenerationParams, TokenUsage};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::router::{LlmProvider, ProviderConfig};
use crate::util::{mask_api_key, parse_retry_after, truncate_safe};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};


/// DeepSeek API base URL
pub const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
/// Groq API base URL
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
/// Default local Ollama endpoint (OpenAI-compatible surface)
pub const OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

/// Configuration for an OpenAI-compatible provider
#[derive(Clone)]
pub struct OpenAiCompatConfig {
    /// Provider id used for routing and pricing
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Bearer token; local endpoints may not need one
    pub api_key: Option<String>,
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Models advertised by this provider
    pub models: Vec<String>,
    /// Capability flags
    pub capabilities: Vec<Capability>,
    /// Request timeout
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("id", &self.id)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("models", &self.models)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl OpenAiCompatConfig {
    /// DeepSeek preset
    #[must_use]
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self {
            id: "deepseek".to_string(),
            display_name: "DeepSeek".to_string(),
            api_key: Some(api_key.into()),
            base_url: DEEPSEEK_API_BASE.to_string(),
            default_model: "deepseek-chat".to_string(),
            models: strings(&["deepseek-chat", "deepseek-reasoner"]),
            capabilities: vec![
                Capability::Text,
                Capability::FunctionCalling,
                Capability::Streaming,
                Capability::Reasoning,
            ],
            // DeepSeek can be slower
            timeout: Duration::from_secs(120),
        }
    }

    /// Groq preset
    #[must_use]
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            id: "groq".to_string(),
            display_name: "Groq".to_string(),
            api_key: Some(api_key.into()),
            base_url: GROQ_API_BASE.to_string(),
            default_model: "llama-3.3-70b-versatile".to_string(),
            models: strings(&[
                "llama-3.3-70b-versatile",
                "llama-3.1-8b-instant",
                "openai/gpt-oss-120b",
            ]),
            capabilities: vec![
                Capability::Text,
                Capability::FunctionCalling,
                Capability::Streaming,
            ],
            timeout: Duration::from_secs(60),
        }
    }

    /// Local Ollama preset
    #[must_use]
    pub fn ollama() -> Self {
        Self {
            id: "ollama".to_string(),
            display_name: "Ollama (local)".to_string(),
            api_key: None,
            base_url: OLLAMA_API_BASE.to_string(),
            default_model: "llama3.2".to_string(),
            models: strings(&["llama3.2", "qwen2.5:7b"]),
            capabilities: vec![Capability::Text, Capability::Streaming],
            // Local models on CPU are slow
            timeout: Duration::from_secs(300),
        }
    }

    /// Preset for `id` with credentials from the environment
    ///
    /// DeepSeek reads `DEEPSEEK_API_KEY` / `DEEPSEEK_MODEL`, Groq reads
    /// `GROQ_API_KEY` / `GROQ_MODEL`, Ollama reads `OLLAMA_BASE_URL` /
    /// `OLLAMA_MODEL` and needs no key.
    ///
    /// # Errors
    /// Returns error if the key is missing or the id has no preset
    pub fn from_env(id: &str) -> Result<Self> {
        let (mut config, model_var) = match id {
            "deepseek" => (Self::deepseek(require_env("DEEPSEEK_API_KEY")?), "DEEPSEEK_MODEL"),
            "groq" => (Self::groq(require_env("GROQ_API_KEY")?), "GROQ_MODEL"),
            "ollama" => {
                let mut config = Self::ollama();
                if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
                    config.base_url = url;
                }
                (config, "OLLAMA_MODEL")
            }
            other => {
                return Err(Error::NotConfigured(format!(
                    "no OpenAI-compatible preset for {other}"
                )))
            }
        };
        if let Ok(model) = std::env::var(model_var) {
            config.default_model = model;
        }
        Ok(config)
    }

    /// Apply overrides from the `providers.<id>` section
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ProviderConfig) -> Self {
        if let Some(url) = &overrides.base_url {
            self.base_url = url.clone();
        }
        if let Some(model) = &overrides.default_model {
            self.default_model = model.clone();
        }
        if let Some(ms) = overrides.timeout_ms {
            self.timeout = Duration::from_millis(ms);
        }
        self
    }

    /// Sets the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Sets the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

fn require_env(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::NotConfigured(format!("{var} not set")))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Detailed {
        message: String,
        #[serde(default)]
        r#type: Option<String>,
        #[serde(default)]
        code: Option<serde_json::Value>,
    },
    // Ollama: {"error": "model 'x' not found"}
    Text(String),
}

/// Map a non-success HTTP response to a structured error
pub(crate) fn error_from_response(status: u16, retry_after: Option<u64>, body: &str) -> Error {
    let (message, code) = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorField::Detailed {
                message,
                r#type,
                code,
            },
        }) => {
            let code = code
                .and_then(|c| c.as_str().map(str::to_string))
                .or(r#type);
            (message, code)
        }
        Ok(ErrorBody {
            error: ErrorField::Text(message),
        }) => (message, None),
        Err(_) => (format!("HTTP {status}"), None),
    };

    // DeepSeek answers 402 with a generic `invalid_request_error` code
    let code = if status == 402 {
        Some("insufficient_balance".to_string())
    } else {
        code
    };

    // A 429 is only a transient throttle unless the body says the balance is gone
    let quota = code
        .as_deref()
        .is_some_and(|c| c.contains("quota") || c.contains("balance"));
    if status == 429 && !quota {
        return Error::RateLimit { retry_after };
    }

    Error::ProviderApi {
        status: Some(status),
        code,
        message: truncate_safe(&message, 300).to_string(),
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Adapter for OpenAI-compatible chat completion endpoints
pub struct OpenAiCompatProvider {
    client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    /// Create a provider from a config
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Provider(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create the preset for `id` from environment variables
    ///
    /// # Errors
    /// Returns error if the preset's key is not set
    pub fn from_env(id: &str) -> Result<Self> {
        Self::new(OpenAiCompatConfig::from_env(id)?)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.id
    }

    fn display_name(&self) -> &str {
        &self.config.display_name
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.config.capabilities.clone()
    }

    fn available_models(&self) -> Vec<String> {
        self.config.models.clone()
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, messages, params), fields(provider = %self.config.id, model = %params.model))]
    async fn chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResponse> {
        let request = ChatRequest {
            model: params.model_or(&self.config.default_model),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stop: params.stop.as_deref(),
        };

        debug!(provider = %self.config.id, "Sending chat completion request");

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
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

        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<CompletionResponse> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| Error::InvalidResponse(e.to_string()))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidResponse("No choices in response".to_string()))?;

    Ok(CompletionResponse {
        content: choice.message.content.unwrap_or_default(),
        usage: response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        finish_reason: choice.finish_reason,
        model: response.model,
    })
}
