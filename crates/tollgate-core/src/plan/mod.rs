//! Plan - subscription tiers and the limits derived from them
//!
//! A user without an active subscription resolves to `None`; the ledger then
//! applies its conservative fallback limits. Nothing resolves to "unlimited".

mod resolver;
mod types;


pub use resolver::{PlanResolver, PlansConfig, StaticPlanResolver};
pub use types::{PlanLimits, PlanTier};
