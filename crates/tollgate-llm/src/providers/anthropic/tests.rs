use super::convert::{convert_messages, convert_response, error_from_response};
use super::types::{AnthropicConfig, AnthropicResponse, MODELS};
use super::AnthropicProvider;
use crate::classify::{classify, ErrorKind};
use crate::completion::GenerationParams;
use crate::error::Error;
use crate::message::Message;
use crate::router::{LlmProvider, ProviderConfig};
use std::time::Duration;

#[test]
fn test_config_builder() {
    let config = AnthropicConfig::new("test-key")
        .with_model("claude-haiku-4-5-20251001")
        .with_max_tokens(2048)
        .with_timeout(Duration::from_secs(30));

    assert_eq!(config.api_key, "test-key");
    assert_eq!(config.default_model, "claude-haiku-4-5-20251001");
    assert_eq!(config.default_max_tokens, 2048);
    assert_eq!(config.timeout, Duration::from_secs(30));
}

#[test]
fn test_overrides() {
    let config = AnthropicConfig::new("test-key").with_overrides(&ProviderConfig {
        base_url: Some("http://localhost:9999".into()),
        ..Default::default()
    });
    assert_eq!(config.base_url, "http://localhost:9999");
    assert_eq!(config.default_model, super::DEFAULT_MODEL);
}

#[test]
fn test_every_model_is_priced() {
    let table = crate::catalog::PricingTable::with_defaults();
    for model in MODELS {
        assert!(table.contains("anthropic", model), "{model} missing from catalog");
    }
}

#[test]
fn test_message_conversion_splits_system() {
    let messages = vec![
        Message::system("You are helpful"),
        Message::system("Answer in English"),
        Message::user("Hello"),
        Message::assistant("Hi there!"),
    ];

    let (system, converted) = convert_messages(&messages);

    assert_eq!(
        system.as_deref(),
        Some("You are helpful\n\nAnswer in English")
    );
    assert_eq!(converted.len(), 2);
    assert_eq!(converted[0].role, "user");
    assert_eq!(converted[1].role, "assistant");
}

#[test]
fn test_request_uses_default_ceiling_and_model() {
    let provider = AnthropicProvider::new(AnthropicConfig::new("test-key")).unwrap();
    let request = provider.build_request(&[Message::user("hi")], &GenerationParams::new(""));
    assert_eq!(request.max_tokens, 4096);
    assert_eq!(request.model, super::DEFAULT_MODEL);

    let request = provider.build_request(
        &[Message::user("hi")],
        &GenerationParams::new("claude-haiku-4-5-20251001").with_max_tokens(100),
    );
    assert_eq!(request.max_tokens, 100);
    assert_eq!(request.model, "claude-haiku-4-5-20251001");

    let json = serde_json::to_value(&request).unwrap();
    assert!(json.get("system").is_none());
    assert!(json.get("stop_sequences").is_none());
}

#[test]
fn test_response_conversion_joins_text_blocks() {
    let response: AnthropicResponse = serde_json::from_str(
        r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5-20250929",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": " world"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }"#,
    )
    .unwrap();

    let converted = convert_response(response);
    assert_eq!(converted.content, "Hello world");
    assert_eq!(converted.finish_reason.as_deref(), Some("end_turn"));
    let usage = converted.usage.unwrap();
    assert_eq!((usage.prompt_tokens, usage.completion_tokens, usage.total_tokens), (12, 3, 15));
}

#[test]
fn test_error_body_maps_to_structured_error() {
    let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
    let error = error_from_response(529, None, body);
    assert_eq!(classify(&error).kind, ErrorKind::InternalServerError);

    let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
    let classified = classify(&error_from_response(401, None, body));
    assert_eq!(classified.kind, ErrorKind::Authentication);
    assert!(!classified.detail.contains("x-api-key"));
}

#[test]
fn test_rate_limit_keeps_retry_after() {
    let error = error_from_response(429, Some(20), "{}");
    assert!(matches!(error, Error::RateLimit { retry_after: Some(20) }));
}

#[test]
fn test_unparseable_body_is_not_echoed() {
    let error = error_from_response(502, None, "<html>Bad Gateway</html>");
    assert!(!error.to_string().contains("<html>"));
    assert_eq!(classify(&error).kind, ErrorKind::InternalServerError);
}

#[test]
fn test_config_debug_masks_key() {
    let config = AnthropicConfig::new("sk-ant-REDACTED");
    let debug_str = format!("{config:?}");

    assert!(!debug_str.contains("1234567890"));
    assert!(debug_str.contains("sk-a...ghij"));
}

#[test]
fn test_provider_metadata() {
    let provider = AnthropicProvider::new(AnthropicConfig::new("test-key")).unwrap();
    assert_eq!(provider.name(), "anthropic");
    assert_eq!(provider.display_name(), "Anthropic");
    assert_eq!(provider.available_models().len(), MODELS.len());
}
