//! Router - provider registry, selection and fallback
//!
//! Every provider sits behind the same [`LlmProvider`] capability interface.
//! The registry is built once at startup in registration order; the router
//! picks the primary from it, bounds concurrency with a semaphore, applies a
//! per-attempt timeout and walks the remaining providers when an unpinned
//! request fails with a fallback-worthy error.
//!
//! # Module Structure
//!
//! - `config`: Provider and router configuration
//! - `provider`: LlmProvider trait definition
//! - `registry`: ProviderRegistry, adapters plus availability
//! - `types`: Request, selection and outcome types
//! - `mock`: Scriptable provider for tests and offline runs
//! - `router_impl`: LlmRouter implementation

mod config;
mod mock;
mod provider;
mod registry;
mod router_impl;
mod types;


pub use config::{ProviderConfig, RouterConfig};
pub use mock::MockProvider;
pub use provider::LlmProvider;
pub use registry::{ProviderRegistry, ProviderStatus};
pub use router_impl::{LlmRouter, PROVIDER_NOT_AVAILABLE};
pub use types::{
    AttemptRecord, Invocation, RouteFailure, RouteOutcome, RouteRequest, RouteSuccess, Selection,
};
