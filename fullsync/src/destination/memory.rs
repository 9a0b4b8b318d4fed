use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::destination::{Destination, DestinationConnection};
use crate::error::{ErrorKind, EtlResult};
use crate::types::RowSet;

#[derive(Debug, Default)]
struct Inner {
    schemas: HashSet<String>,
    prepare_count: usize,
    tables: HashMap<(String, String), RowSet>,
    replace_count: usize,
    unreachable: bool,
}

/// In-memory destination for tests and local runs.
///
/// Every table lives behind one lock and is swapped as a whole, so a reader never observes a
/// partially replaced table.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of `schema.table`, if it exists.
    pub async fn table(&self, schema: &str, table: &str) -> Option<RowSet> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
    }

    /// Returns the `(schema, table)` pairs currently stored, sorted.
    pub async fn table_names(&self) -> Vec<(String, String)> {
        let inner = self.inner.lock().await;
        let mut names: Vec<_> = inner.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the schemas created so far, sorted.
    pub async fn schemas(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut schemas: Vec<_> = inner.schemas.iter().cloned().collect();
        schemas.sort();
        schemas
    }

    /// Number of schema preparations.
    pub async fn prepare_count(&self) -> usize {
        self.inner.lock().await.prepare_count
    }

    /// Number of successful replace operations.
    pub async fn replace_count(&self) -> usize {
        self.inner.lock().await.replace_count
    }

    /// Makes every following [`Destination::connect`] fail until reset.
    pub async fn set_unreachable(&self, unreachable: bool) {
        let mut inner = self.inner.lock().await;
        inner.unreachable = unreachable;
    }
}

impl Destination for MemoryDestination {
    type Connection = MemoryDestinationConnection;

    fn name() -> &'static str {
        "memory"
    }

    async fn connect(&self) -> EtlResult<Self::Connection> {
        let inner = self.inner.lock().await;
        if inner.unreachable {
            bail!(
                ErrorKind::DestinationConnectionFailed,
                "Destination is unreachable",
                "The memory destination was marked as unreachable"
            );
        }

        Ok(MemoryDestinationConnection {
            inner: self.inner.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MemoryDestinationConnection {
    inner: Arc<Mutex<Inner>>,
}

impl DestinationConnection for MemoryDestinationConnection {
    async fn prepare_schema(&mut self, schema: &str) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        inner.schemas.insert(schema.to_string());
        inner.prepare_count += 1;

        Ok(())
    }

    async fn replace_table(&mut self, schema: &str, table: &str, row_set: &RowSet) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.schemas.contains(schema) {
            bail!(
                ErrorKind::DestinationWriteFailed,
                "Target schema does not exist",
                format!("Schema `{schema}` was not prepared before replacing `{table}`")
            );
        }

        info!(
            schema,
            table,
            rows = row_set.len(),
            "replacing table in memory destination"
        );

        inner
            .tables
            .insert((schema.to_string(), table.to_string()), row_set.clone());
        inner.replace_count += 1;

        Ok(())
    }

    async fn close(self) -> EtlResult<()> {
        Ok(())
    }
}
