//! Startup configuration.
//!
//! Loaded once from TOML, then turned into the immutable pieces the services
//! share: the column catalog snapshot and the sled database.
use super::column::{AvailableColumn, ColumnCatalog, ColumnOption, SourceType};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Remove the database when it is dropped. For tests and demos.
    #[serde(default)]
    pub temporary: bool,
    /// sled background flush interval, the same whether or not `[store]` is given.
    #[serde(default = "default_flush_every_ms")]
    pub flush_every_ms: Option<u64>,
}

fn default_flush_every_ms() -> Option<u64> {
    Some(500)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("requisitions.db"),
            temporary: false,
            flush_every_ms: default_flush_every_ms(),
        }
    }
}

impl StoreConfig {
    pub fn open(&self) -> anyhow::Result<Arc<sled::Db>> {
        let db = sled::Config::new()
            .path(&self.path)
            .temporary(self.temporary)
            .flush_every_ms(self.flush_every_ms)
            .open()
            .with_context(|| format!("failed to open database at {}", self.path.display()))?;
        Ok(Arc::new(db))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    pub indicator: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub display_required: bool,
    pub sources: Vec<SourceType>,
    #[serde(default)]
    pub options: Vec<ColumnOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub store: StoreConfig,
    /// Empty means the standard catalog.
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

impl WorkflowConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("failed to parse config file")
    }

    /// Build the catalog snapshot. Call once and share the result.
    pub fn catalog(&self) -> anyhow::Result<Arc<ColumnCatalog>> {
        if self.columns.is_empty() {
            return Ok(Arc::new(ColumnCatalog::standard()));
        }

        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut definition = AvailableColumn::new(&column.name, &column.indicator)?
                .set_display_required(column.display_required)
                .set_sources(column.sources.iter().copied())
                .set_options(column.options.iter().cloned());
            if let Some(label) = &column.label {
                definition = definition.set_label(label);
            }
            columns.push(definition);
        }
        Ok(Arc::new(ColumnCatalog::new(columns)?))
    }
}
