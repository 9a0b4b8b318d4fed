//! Holding area for extracted row sets between the Extract and Load steps of a table.

mod base;
pub mod file;
pub mod memory;

pub use base::*;

use fullsync_config::shared::HandoffConfig;
use std::sync::Arc;

use crate::error::EtlResult;
use crate::handoff::file::FileHandoffStore;
use crate::handoff::memory::MemoryHandoffStore;
use crate::types::{RowSet, TableName};

/// Handoff store selected at runtime from a [`HandoffConfig`].
#[derive(Debug, Clone)]
pub enum ConfiguredHandoffStore {
    Memory(MemoryHandoffStore),
    File(FileHandoffStore),
}

impl ConfiguredHandoffStore {
    /// Builds the store described by `config`, creating the handoff directory when needed.
    pub async fn from_config(config: &HandoffConfig) -> EtlResult<Self> {
        match config {
            HandoffConfig::Memory => Ok(Self::Memory(MemoryHandoffStore::new())),
            HandoffConfig::File { path } => Ok(Self::File(FileHandoffStore::open(path).await?)),
        }
    }
}

impl HandoffStore for ConfiguredHandoffStore {
    async fn put(&self, table: &TableName, row_set: Arc<RowSet>) -> EtlResult<()> {
        match self {
            Self::Memory(store) => store.put(table, row_set).await,
            Self::File(store) => store.put(table, row_set).await,
        }
    }

    async fn get(&self, table: &TableName) -> EtlResult<Option<Arc<RowSet>>> {
        match self {
            Self::Memory(store) => store.get(table).await,
            Self::File(store) => store.get(table).await,
        }
    }

    async fn clear(&self, table: &TableName) -> EtlResult<()> {
        match self {
            Self::Memory(store) => store.clear(table).await,
            Self::File(store) => store.clear(table).await,
        }
    }
}
