//! Tollgate Core - budget-aware request pipeline
//!
//! This crate sits between callers and the provider router:
//! - Usage: append-only usage log (memory or SQLite)
//! - Plan: subscription tiers and the limits they grant
//! - Budget: daily/hourly ceilings evaluated against the usage log
//! - Optimizer: response-ceiling clamping and budget-driven shrinking
//! - Gateway: the inbound contract (generate, chat, count, list, health)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod error;
pub mod gateway;
pub mod optimizer;
pub mod plan;
pub mod usage;

pub use budget::{
    BudgetCheck, BudgetCheckKind, BudgetConfig, BudgetDecision, BudgetLedger, BudgetWindow,
    FailurePolicy, Remaining, UsageReport, WindowMode, USAGE_UNAVAILABLE,
};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use gateway::{
    Gateway, GatewayConfig, GenerationResult, HealthReport, HealthStatus, ProviderInfo,
    RequestOptions, ResponseMetadata, GENERIC_PROVIDER,
};
pub use optimizer::{
    Optimization, OptimizationPlan, OptimizerConfig, RequestOptimizer, ResponseCeiling, Verdict,
};
pub use plan::{PlanLimits, PlanResolver, PlanTier, PlansConfig, StaticPlanResolver};
pub use usage::{
    MemoryUsageStore, SqliteUsageStore, UsageAggregate, UsageRecord, UsageStatus, UsageStore,
};
