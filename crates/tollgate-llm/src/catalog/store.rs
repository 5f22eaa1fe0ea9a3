//! Catalog sources the pricing table refreshes from

use super::builtin::default_catalog;
use super::descriptor::ModelDescriptor;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Read-only source of model descriptors
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Load the full descriptor list
    async fn load(&self) -> Result<Vec<ModelDescriptor>>;
}

/// Fixed in-process catalog
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    descriptors: Vec<ModelDescriptor>,
}

impl StaticCatalog {
    /// Wrap an explicit descriptor list
    #[must_use]
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Self {
        Self { descriptors }
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

#[async_trait::async_trait]
impl CatalogStore for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    async fn load(&self) -> Result<Vec<ModelDescriptor>> {
        Ok(self.descriptors.clone())
    }
}

/// Catalog read from a JSON array of descriptors on disk
///
/// The file is re-read on every load, so edits are picked up by the next
/// refresh without restarting.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    /// Catalog backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl CatalogStore for JsonFileCatalog {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn load(&self) -> Result<Vec<ModelDescriptor>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Catalog(format!("{}: {e}", self.path.display())))?;
        let descriptors: Vec<ModelDescriptor> = serde_json::from_str(&raw)
            .map_err(|e| Error::Catalog(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), count = descriptors.len(), "Loaded catalog file");
        Ok(descriptors)
    }
}
