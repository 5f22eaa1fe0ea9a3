//! Budget - per-user daily/hourly ceilings
//!
//! The ledger never keeps counters of its own. Every decision aggregates the
//! usage log over the current windows, so a record written by any process is
//! visible to the next check.

mod ledger;
mod types;

#[cfg(test)]
mod tests;

pub use ledger::{BudgetLedger, USAGE_UNAVAILABLE};
pub use types::{
    BudgetCheck, BudgetCheckKind, BudgetConfig, BudgetDecision, BudgetWindow, FailurePolicy,
    Remaining, UsageReport, WindowMode,
};
