//! Catalog - model pricing and capability information
//!
//! # Module Structure
//!
//! - `descriptor`: ModelDescriptor, Capability and the derived ModelTier
//! - `builtin`: the catalog shipped with the binary
//! - `store`: CatalogStore trait with static and JSON-file sources
//! - `table`: PricingTable, the refreshable snapshot everyone reads from

mod builtin;
mod descriptor;
mod store;
mod table;


pub use builtin::{default_catalog, DEFAULT_INPUT_COST_PER_MILLION, DEFAULT_OUTPUT_COST_PER_MILLION};
pub use descriptor::{Capability, ModelDescriptor, ModelTier};
pub use store::{CatalogStore, JsonFileCatalog, StaticCatalog};
pub use table::PricingTable;
