use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::source::{QueryResult, Source, SourceConnection};
use crate::steps::full_table_query;
use crate::types::{Cell, TableName};

#[derive(Debug, Default)]
struct Inner {
    results: HashMap<String, QueryResult>,
    unreachable: bool,
}

/// In-memory source for tests and local runs.
///
/// Tables are registered with [`MemorySource::insert_table`] and answered for the exact query the
/// extractor issues for them.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
    open_connections: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the content of `table`.
    pub async fn insert_table(&self, table: &TableName, column_names: &[&str], rows: Vec<Vec<Cell>>) {
        let result = QueryResult {
            column_names: column_names.iter().map(|c| c.to_string()).collect(),
            rows,
        };

        let mut inner = self.inner.lock().await;
        inner.results.insert(full_table_query(table), result);
    }

    pub async fn drop_table(&self, table: &TableName) {
        let mut inner = self.inner.lock().await;
        inner.results.remove(&full_table_query(table));
    }

    /// Makes every following [`Source::connect`] fail until reset.
    pub async fn set_unreachable(&self, unreachable: bool) {
        let mut inner = self.inner.lock().await;
        inner.unreachable = unreachable;
    }

    /// Number of connections opened and not closed yet.
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }
}

impl Source for MemorySource {
    type Connection = MemorySourceConnection;

    fn name() -> &'static str {
        "memory"
    }

    async fn connect(&self) -> EtlResult<Self::Connection> {
        let inner = self.inner.lock().await;
        if inner.unreachable {
            bail!(
                ErrorKind::SourceConnectionFailed,
                "Source is unreachable",
                "The memory source was marked as unreachable"
            );
        }

        self.open_connections.fetch_add(1, Ordering::SeqCst);

        Ok(MemorySourceConnection {
            inner: self.inner.clone(),
            open_connections: self.open_connections.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MemorySourceConnection {
    inner: Arc<Mutex<Inner>>,
    open_connections: Arc<AtomicUsize>,
}

impl SourceConnection for MemorySourceConnection {
    async fn query(&mut self, sql: &str) -> EtlResult<QueryResult> {
        let inner = self.inner.lock().await;
        match inner.results.get(sql) {
            Some(result) => Ok(result.clone()),
            None => bail!(
                ErrorKind::SourceQueryFailed,
                "Source query failed",
                format!("No table answers the query `{sql}`")
            ),
        }
    }

    async fn close(self) -> EtlResult<()> {
        // Released in `Drop`, which also covers connections dropped on error paths.
        Ok(())
    }
}

impl Drop for MemorySourceConnection {
    fn drop(&mut self) {
        self.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}
