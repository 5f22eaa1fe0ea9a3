//! Gateway - the inbound contract
//!
//! # Module Structure
//!
//! - `types`: request options, GenerationResult and the listing/health shapes
//! - `gateway_impl`: the Gateway facade

mod gateway_impl;
mod types;

#[cfg(test)]
mod tests;

pub use gateway_impl::{Gateway, GENERIC_PROVIDER};
pub use types::{
    GatewayConfig, GenerationResult, HealthReport, HealthStatus, ProviderInfo, RequestOptions,
    ResponseMetadata,
};
