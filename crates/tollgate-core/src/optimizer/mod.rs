//! Optimizer - shapes a request to fit its budget before it is routed
//!
//! The prompt itself is never rewritten. The optimizer only adjusts the
//! response ceiling, warns about long prompts, suggests cheaper models and
//! decides whether a budget rejection can be turned into a smaller call.

mod optimizer_impl;
mod types;


pub use optimizer_impl::RequestOptimizer;
pub use types::{Optimization, OptimizationPlan, OptimizerConfig, ResponseCeiling, Verdict};
