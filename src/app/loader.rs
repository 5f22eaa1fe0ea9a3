//! Configuration loading
//!
//! Embedded defaults, then optional files, then environment variables.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

fn defaults() -> ConfigBuilder<config::builder::DefaultState> {
    Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
}

/// Load configuration from files and environment
///
/// `extra` is a file given on the command line; it must exist and sits just
/// below the environment.
pub fn load_config(extra: Option<&Path>) -> Result<AppConfig> {
    let env_name = std::env::var("TOLLGATE_ENV").unwrap_or_else(|_| "development".to_string());

    let mut builder = defaults()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{env_name}")).required(false))
        .add_source(File::with_name("config/local").required(false));
    if let Some(path) = extra {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        // TOLLGATE_BUDGET__FAILURE_POLICY=fail_closed
        .add_source(
            Environment::with_prefix("TOLLGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Embedded defaults with a TOML overlay on top
#[cfg(test)]
pub(crate) fn load_with_overlay(overlay: &str) -> Result<AppConfig> {
    defaults()
        .add_source(File::from_str(overlay, FileFormat::Toml))
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
