//! Refreshable pricing/capability table

use super::builtin::{default_catalog, DEFAULT_INPUT_COST_PER_MILLION, DEFAULT_OUTPUT_COST_PER_MILLION};
use super::descriptor::{Capability, ModelDescriptor};
use super::store::CatalogStore;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Index = BTreeMap<String, BTreeMap<String, ModelDescriptor>>;

/// Pricing and capability lookup shared by the ledger, optimizer and gateway
///
/// The index is replaced as a whole on refresh; readers hold an `Arc` to the
/// snapshot they started with, so a refresh never changes a request mid-flight.
pub struct PricingTable {
    index: RwLock<Arc<Index>>,
}

impl PricingTable {
    /// Build a table from descriptors
    #[must_use]
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Self {
        Self {
            index: RwLock::new(Arc::new(build_index(descriptors))),
        }
    }

    /// Table seeded with the built-in catalog
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(default_catalog())
    }

    fn snapshot(&self) -> Arc<Index> {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Reload from a store and swap the snapshot
    ///
    /// An error or an empty catalog keeps the previous snapshot in place.
    pub async fn refresh(&self, store: &dyn CatalogStore) -> Result<usize> {
        let descriptors = store.load().await?;
        let index = build_index(descriptors);
        let count: usize = index.values().map(BTreeMap::len).sum();
        if count == 0 {
            return Err(Error::Catalog(format!(
                "{} returned no active models",
                store.name()
            )));
        }

        *self.index.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(index);
        debug!(source = store.name(), models = count, "Pricing table refreshed");
        Ok(count)
    }

    /// Refresh periodically until cancelled
    pub fn spawn_refresh(
        self: &Arc<Self>,
        store: Arc<dyn CatalogStore>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let table = Arc::clone(self);
        tokio::spawn(async move {
            info!(source = store.name(), ?interval, "Catalog refresh task started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Catalog refresh task stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = table.refresh(store.as_ref()).await {
                            warn!(error = %e, "Catalog refresh failed, keeping previous snapshot");
                        }
                    }
                }
            }
        })
    }

    /// Look up an active descriptor
    #[must_use]
    pub fn get(&self, provider: &str, model: &str) -> Option<ModelDescriptor> {
        self.snapshot()
            .get(provider)
            .and_then(|models| models.get(model))
            .cloned()
    }

    /// Whether the catalog knows this pair
    #[must_use]
    pub fn contains(&self, provider: &str, model: &str) -> bool {
        self.get(provider, model).is_some()
    }

    /// Active descriptors, optionally for one provider, sorted by provider then model
    #[must_use]
    pub fn list(&self, provider: Option<&str>) -> Vec<ModelDescriptor> {
        let snapshot = self.snapshot();
        match provider {
            Some(id) => snapshot
                .get(id)
                .map(|models| models.values().cloned().collect())
                .unwrap_or_default(),
            None => snapshot
                .values()
                .flat_map(|models| models.values().cloned())
                .collect(),
        }
    }

    /// Cost of a finished call; unknown models use the default prices
    #[must_use]
    pub fn estimate_cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u32,
        output_tokens: u32,
    ) -> f64 {
        match self.get(provider, model) {
            Some(descriptor) => descriptor.calculate_cost(input_tokens, output_tokens),
            None => {
                let input = (input_tokens as f64 / 1_000_000.0) * DEFAULT_INPUT_COST_PER_MILLION;
                let output =
                    (output_tokens as f64 / 1_000_000.0) * DEFAULT_OUTPUT_COST_PER_MILLION;
                input + output
            }
        }
    }

    /// Pre-call cost bound for `units` at the model's higher per-unit price
    #[must_use]
    pub fn estimate_units_cost(&self, provider: &str, model: &str, units: u64) -> f64 {
        match self.get(provider, model) {
            Some(descriptor) => descriptor.upper_bound_cost(units),
            None => {
                let rate = DEFAULT_INPUT_COST_PER_MILLION.max(DEFAULT_OUTPUT_COST_PER_MILLION);
                (units as f64 / 1_000_000.0) * rate
            }
        }
    }

    /// Cheapest active text model of the same provider that costs less than `model`
    #[must_use]
    pub fn cheaper_alternative(&self, provider: &str, model: &str) -> Option<ModelDescriptor> {
        let current = self.get(provider, model)?;
        self.snapshot()
            .get(provider)?
            .values()
            .filter(|d| d.model != current.model)
            .filter(|d| d.has_capability(Capability::Text))
            .filter(|d| d.blended_cost() < current.blended_cost())
            .min_by(|a, b| a.blended_cost().total_cmp(&b.blended_cost()))
            .cloned()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn build_index(descriptors: Vec<ModelDescriptor>) -> Index {
    let mut index = Index::new();
    for descriptor in descriptors {
        if !descriptor.active {
            debug!(provider = %descriptor.provider, model = %descriptor.model, "Skipping inactive model");
            continue;
        }
        let models = index.entry(descriptor.provider.clone()).or_default();
        if models.contains_key(&descriptor.model) {
            warn!(
                provider = %descriptor.provider,
                model = %descriptor.model,
                "Duplicate active catalog entry, keeping the later one"
            );
        }
        models.insert(descriptor.model.clone(), descriptor);
    }
    index
}
