//! Read-only commands: count, providers, models, health, usage

use anyhow::{anyhow, Result};
use serde::Serialize;
use tollgate_core::{format_error_for_cli, Gateway, HealthStatus};
use tollgate_llm::ProviderStatus;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn count(
    gateway: &Gateway,
    text: &str,
    provider: Option<&str>,
    model: Option<&str>,
    json: bool,
) -> Result<()> {
    let result = gateway
        .count_units(text, provider, model)
        .await
        .map_err(|e| anyhow!(format_error_for_cli(&e)))?;
    if json {
        return print_json(&result);
    }
    println!(
        "{} units ({}/{}, {}{})",
        result.units,
        result.provider,
        result.model,
        result.method,
        if result.cached { ", cached" } else { "" }
    );
    Ok(())
}

pub fn providers(gateway: &Gateway, json: bool) -> Result<()> {
    let providers = gateway.list_providers();
    if json {
        return print_json(&providers);
    }
    for info in providers {
        match &info.status {
            ProviderStatus::Available => {
                let caps: Vec<&str> = info.capabilities.iter().map(|c| c.as_str()).collect();
                println!(
                    "✅ {:<10} {:<16} default={} [{}]",
                    info.id,
                    info.display_name,
                    info.default_model.as_deref().unwrap_or("-"),
                    caps.join(", ")
                );
            }
            ProviderStatus::Unavailable { reason } => {
                println!("❌ {:<10} {:<16} {}", info.id, info.display_name, reason);
            }
        }
    }
    Ok(())
}

pub fn models(gateway: &Gateway, provider: Option<&str>, json: bool) -> Result<()> {
    let models = gateway.list_models(provider);
    if json {
        return print_json(&models);
    }
    if models.is_empty() {
        println!("No models in the catalog{}", provider.map(|p| format!(" for {p}")).unwrap_or_default());
        return Ok(());
    }
    println!(
        "{:<10} {:<32} {:>10} {:>10} {:>8} {:>10}",
        "PROVIDER", "MODEL", "IN $/M", "OUT $/M", "MAX OUT", "CONTEXT"
    );
    for m in models {
        println!(
            "{:<10} {:<32} {:>10.3} {:>10.3} {:>8} {:>10}",
            m.provider,
            m.model,
            m.input_cost_per_million,
            m.output_cost_per_million,
            m.max_output_tokens,
            m.context_window
        );
    }
    Ok(())
}

pub fn health(gateway: &Gateway, provider: Option<&str>, json: bool) -> Result<()> {
    let report = gateway
        .health_check(provider)
        .map_err(|e| anyhow!(format_error_for_cli(&e)))?;
    if json {
        return print_json(&report);
    }
    let icon = match report.status {
        HealthStatus::Healthy => "✅",
        HealthStatus::Degraded => "⚠️ ",
        HealthStatus::Unhealthy => "❌",
    };
    println!("{icon} {:?}", report.status);
    for (id, up) in &report.providers {
        println!("   {:<10} {}", id, if *up { "available" } else { "unavailable" });
    }
    Ok(())
}

pub async fn usage(gateway: &Gateway, user: &str, json: bool) -> Result<()> {
    let report = gateway
        .usage_report(user)
        .await
        .map_err(|e| anyhow!(format_error_for_cli(&e)))?;
    if json {
        return print_json(&report);
    }

    let limits = &report.limits;
    let window = &report.window;
    println!("Usage for {}", report.user_id);
    println!(
        "  tokens today    {:>12} / {:<12} ({} left)",
        window.total_tokens, limits.daily_token_limit, report.remaining.tokens
    );
    println!(
        "  cost today      {:>12.4} / {:<12.2} ({:.4} left)",
        window.total_cost, limits.daily_cost_limit, report.remaining.cost
    );
    println!(
        "  requests / hour {:>12} / {:<12} ({} left)",
        window.request_count_hour, limits.hourly_request_limit, report.remaining.requests
    );
    println!("  max per request {:>12}", limits.max_tokens_per_request);
    if report.degraded {
        println!("  ⚠️  plan lookup failed; fallback limits shown");
    }
    Ok(())
}
