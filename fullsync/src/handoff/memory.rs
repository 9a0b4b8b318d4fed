use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::EtlResult;
use crate::handoff::HandoffStore;
use crate::types::{RowSet, TableName};

/// Handoff store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandoffStore {
    slots: Arc<Mutex<HashMap<TableName, Arc<RowSet>>>>,
}

impl MemoryHandoffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables that currently have a slot, sorted.
    pub async fn tables(&self) -> Vec<TableName> {
        let slots = self.slots.lock().await;
        let mut tables: Vec<_> = slots.keys().cloned().collect();
        tables.sort();
        tables
    }
}

impl HandoffStore for MemoryHandoffStore {
    async fn put(&self, table: &TableName, row_set: Arc<RowSet>) -> EtlResult<()> {
        self.slots.lock().await.insert(table.clone(), row_set);
        Ok(())
    }

    async fn get(&self, table: &TableName) -> EtlResult<Option<Arc<RowSet>>> {
        Ok(self.slots.lock().await.get(table).cloned())
    }

    async fn clear(&self, table: &TableName) -> EtlResult<()> {
        self.slots.lock().await.remove(table);
        Ok(())
    }
}
