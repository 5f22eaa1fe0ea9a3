//! Anthropic - Claude Messages API provider over reqwest

/// Message and response conversion
pub mod convert;
/// Provider implementation
pub mod provider;
/// API types and configuration
pub mod types;

#[cfg(test)]
mod tests;

pub use provider::AnthropicProvider;
pub use types::{AnthropicConfig, DEFAULT_MODEL, MODELS};
