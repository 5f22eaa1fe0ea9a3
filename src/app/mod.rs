//! Composition root
//!
//! # Module Structure
//!
//! - `config`: configuration sections
//! - `loader`: layered loading from embedded defaults, files and environment
//! - `providers`: provider registration
//! - `stores`: usage store, catalog source and token cache

pub mod config;
mod loader;
mod providers;
mod stores;

pub use config::{AppConfig, LogFormat};
pub use loader::load_config;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tollgate_core::{BudgetLedger, Gateway, StaticPlanResolver};
use tollgate_llm::{LlmRouter, PricingTable};
use tracing::{info, warn};

/// Wire every collaborator and return the gateway
///
/// The catalog refresh task, when enabled, stops when `shutdown` is cancelled.
pub async fn build_gateway(config: &AppConfig, shutdown: &CancellationToken) -> Result<Gateway> {
    let pricing = Arc::new(PricingTable::with_defaults());
    let catalog = stores::init_catalog_store(&config.catalog)?;
    match pricing.refresh(catalog.as_ref()).await {
        Ok(count) => info!(source = catalog.name(), models = count, "Pricing table loaded"),
        Err(e) => warn!(error = %e, "Catalog load failed, using built-in prices"),
    }
    if config.catalog.refresh_interval_secs > 0 {
        pricing.spawn_refresh(
            catalog,
            Duration::from_secs(config.catalog.refresh_interval_secs),
            shutdown.clone(),
        );
    }

    let registry = providers::build_registry(config);
    let router = Arc::new(LlmRouter::new(registry, config.router.clone()));
    let tokens = Arc::new(stores::init_token_accountant(config).await);

    let usage = stores::init_usage_store(&config.usage).await?;
    let plans = StaticPlanResolver::from_config(&config.plans).context("Invalid plans section")?;
    let ledger = Arc::new(BudgetLedger::new(
        usage,
        Arc::new(plans),
        Arc::clone(&pricing),
        config.budget,
    ));

    Ok(Gateway::new(
        router,
        tokens,
        ledger,
        pricing,
        config.gateway.clone(),
    ))
}
