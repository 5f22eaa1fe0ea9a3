//! `generate` and `chat` commands

use super::RequestArgs;
use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tollgate_core::{format_error_for_cli, Gateway, GenerationResult};
use tollgate_llm::{Message, MessageRole};
use tracing::debug;

/// Cancel `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, cancelling request");
            token.cancel();
        }
    });
}

pub async fn run_generate(
    gateway: &Gateway,
    prompt: Option<String>,
    request: &RequestArgs,
    json: bool,
) -> Result<()> {
    let prompt = match prompt {
        Some(prompt) => prompt,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read prompt from stdin")?;
            buf
        }
    };

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let result = gateway
        .generate(&prompt, &request.to_options(), &cancel)
        .await
        .map_err(|e| anyhow!(format_error_for_cli(&e)))?;
    print_result(&result, json)
}

pub async fn run_chat(
    gateway: &Gateway,
    messages: &[String],
    file: Option<&Path>,
    request: &RequestArgs,
    json: bool,
) -> Result<()> {
    let mut conversation = match file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<Vec<Message>>(&raw)
                .with_context(|| format!("{} is not a JSON array of messages", path.display()))?
        }
        None => Vec::new(),
    };
    for raw in messages {
        conversation.push(parse_message(raw)?);
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let result = gateway
        .chat(conversation, &request.to_options(), &cancel)
        .await
        .map_err(|e| anyhow!(format_error_for_cli(&e)))?;
    print_result(&result, json)
}

/// Parse `role:content`; a bare string is a user message
fn parse_message(raw: &str) -> Result<Message> {
    if let Some((role, content)) = raw.split_once(':') {
        if let Ok(role) = role.parse::<MessageRole>() {
            return Ok(Message::new(role, content.trim_start()));
        }
    }
    if raw.trim().is_empty() {
        bail!("empty message");
    }
    Ok(Message::user(raw))
}

fn print_result(result: &GenerationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let meta = &result.metadata;
    if meta.mock {
        eprintln!(
            "⚠️  No provider available ({}). Nothing was sent.",
            meta.reason.as_deref().unwrap_or("unknown")
        );
        return Ok(());
    }

    println!("{}", result.content);
    eprintln!();
    eprintln!(
        "── {}/{} · {} in / {} out · ${:.6} · {} ms",
        result.provider,
        result.model,
        result.usage.prompt_tokens,
        result.usage.completion_tokens,
        meta.cost,
        meta.latency_ms
    );
    if meta.fallback_occurred {
        if let Some(error) = &meta.fallback_error {
            eprintln!("   fallback after {}", error.kind);
        }
    }
    for optimization in &meta.optimizations {
        eprintln!("   {}", optimization.name());
    }
    if meta.degraded {
        eprintln!("   degraded: usage or plan data was unavailable");
    }
    Ok(())
}
