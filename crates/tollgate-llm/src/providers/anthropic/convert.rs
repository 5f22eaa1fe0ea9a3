use super::types::{
    AnthropicError, AnthropicMessage, AnthropicResponse, ResponseContentBlock,
};
use crate::completion::{CompletionResponse, TokenUsage};
use crate::error::Error;
use crate::message::{Message, MessageRole};
use crate::util::truncate_safe;

/// Convert our messages to Anthropic format, returning the system prompt separately
pub(crate) fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system_parts = Vec::new();
    let mut converted = Vec::new();

    for msg in messages {
        match msg.role {
            MessageRole::System => {
                if !msg.content.is_empty() {
                    system_parts.push(msg.content.as_str());
                }
            }
            MessageRole::User => converted.push(AnthropicMessage {
                role: "user",
                content: msg.content.clone(),
            }),
            MessageRole::Assistant => converted.push(AnthropicMessage {
                role: "assistant",
                content: msg.content.clone(),
            }),
        }
    }

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    (system, converted)
}

/// Normalize a Messages API response
pub(crate) fn convert_response(response: AnthropicResponse) -> CompletionResponse {
    let content = response
        .content
        .iter()
        .filter_map(|block| match block {
            ResponseContentBlock::Text { text } => Some(text.as_str()),
            ResponseContentBlock::Other => None,
        })
        .collect::<String>();

    CompletionResponse {
        content,
        usage: response
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
        finish_reason: response.stop_reason,
        model: response.model,
    }
}

/// Map a non-success HTTP response to a structured error
///
/// Anthropic reports `{"type":"error","error":{"type":"...","message":"..."}}`;
/// the inner type becomes the error code.
pub(crate) fn error_from_response(status: u16, retry_after: Option<u64>, body: &str) -> Error {
    if status == 429 {
        return Error::RateLimit { retry_after };
    }
    match serde_json::from_str::<AnthropicError>(body) {
        Ok(parsed) => Error::ProviderApi {
            status: Some(status),
            code: Some(parsed.error.r#type),
            message: truncate_safe(&parsed.error.message, 300).to_string(),
        },
        // Raw bodies can be HTML error pages; keep only the status
        Err(_) => Error::ProviderApi {
            status: Some(status),
            code: None,
            message: format!("HTTP {status}"),
        },
    }
}
