use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, CatalogError, FormatCatalog};
use crate::converter::EngineConfig;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Replaces the built-in catalog when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Vec<CatalogEntry>>,
}

impl Config {
    /// Builds the catalog this configuration describes.
    pub fn build_catalog(&self) -> Result<FormatCatalog, CatalogError> {
        match &self.catalog {
            Some(entries) => FormatCatalog::new(entries.clone()),
            None => Ok(FormatCatalog::builtin()),
        }
    }
}
