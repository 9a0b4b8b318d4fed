//! Connector wrappers that inject failures and delays and record every attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::destination::{Destination, DestinationConnection};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::source::{QueryResult, Source, SourceConnection};
use crate::steps::full_table_query;
use crate::types::{RowSet, TableName};

#[derive(Debug, Clone, Copy)]
struct Fault {
    remaining: u32,
    kind: ErrorKind,
}

#[derive(Debug, Default)]
struct FaultsInner {
    faults: HashMap<String, Fault>,
    attempts: HashMap<String, Vec<Instant>>,
    delay: Option<Duration>,
}

/// Counts how many operations run at the same time and remembers the maximum.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyTracker {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ConcurrencyTracker {
    fn enter(&self) -> ActiveGuard {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        ActiveGuard {
            active: self.active.clone(),
        }
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Failure plan shared by the clones of a wrapped connector.
#[derive(Debug, Clone, Default)]
struct Faults {
    inner: Arc<Mutex<FaultsInner>>,
    concurrency: ConcurrencyTracker,
}

impl Faults {
    async fn fail(&self, key: String, times: u32, kind: ErrorKind) {
        let mut inner = self.inner.lock().await;
        inner.faults.insert(
            key,
            Fault {
                remaining: times,
                kind,
            },
        );
    }

    async fn set_delay(&self, delay: Duration) {
        self.inner.lock().await.delay = Some(delay);
    }

    async fn attempts(&self, key: &str) -> Vec<Instant> {
        let inner = self.inner.lock().await;
        inner.attempts.get(key).cloned().unwrap_or_default()
    }

    /// Records an attempt on `key`, waits for the configured delay and fails if planned.
    async fn attempt(&self, key: &str) -> EtlResult<()> {
        let _guard = self.concurrency.enter();

        let (delay, fault) = {
            let mut inner = self.inner.lock().await;
            inner
                .attempts
                .entry(key.to_string())
                .or_default()
                .push(Instant::now());

            let fault = match inner.faults.get_mut(key) {
                Some(fault) if fault.remaining > 0 => {
                    fault.remaining -= 1;
                    Some(fault.kind)
                }
                _ => None,
            };

            (inner.delay, fault)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match fault {
            Some(kind) => Err(etl_error!(
                kind,
                "Injected failure",
                format!("Planned failure for {key}")
            )),
            None => Ok(()),
        }
    }
}

/// [`Source`] wrapper failing the reads of chosen tables.
///
/// Failures happen on the query, after the connection was opened.
#[derive(Debug, Clone)]
pub struct TestSource<S> {
    wrapped: S,
    faults: Faults,
}

impl<S> TestSource<S> {
    pub fn wrap(wrapped: S) -> Self {
        Self {
            wrapped,
            faults: Faults::default(),
        }
    }

    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }

    /// Makes the next `times` reads of `table` fail with `kind`.
    pub async fn fail_table(&self, table: &TableName, times: u32, kind: ErrorKind) {
        self.faults.fail(full_table_query(table), times, kind).await;
    }

    /// Makes every read of `table` fail with `kind`.
    pub async fn always_fail_table(&self, table: &TableName, kind: ErrorKind) {
        self.fail_table(table, u32::MAX, kind).await;
    }

    /// Makes every read take at least `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        self.faults.set_delay(delay).await;
    }

    /// Start instants of every read of `table`.
    pub async fn attempts(&self, table: &TableName) -> Vec<Instant> {
        self.faults.attempts(&full_table_query(table)).await
    }

    /// Tracks how many reads run at the same time.
    pub fn concurrency(&self) -> &ConcurrencyTracker {
        &self.faults.concurrency
    }
}

impl<S> Source for TestSource<S>
where
    S: Source,
{
    type Connection = TestSourceConnection<S::Connection>;

    fn name() -> &'static str {
        S::name()
    }

    async fn connect(&self) -> EtlResult<Self::Connection> {
        let wrapped = self.wrapped.connect().await?;

        Ok(TestSourceConnection {
            wrapped,
            faults: self.faults.clone(),
        })
    }
}

#[derive(Debug)]
pub struct TestSourceConnection<C> {
    wrapped: C,
    faults: Faults,
}

impl<C> SourceConnection for TestSourceConnection<C>
where
    C: SourceConnection,
{
    async fn query(&mut self, sql: &str) -> EtlResult<QueryResult> {
        self.faults.attempt(sql).await?;
        self.wrapped.query(sql).await
    }

    async fn close(self) -> EtlResult<()> {
        self.wrapped.close().await
    }
}

/// [`Destination`] wrapper failing the writes of chosen tables.
///
/// Tables are identified by their unqualified name, which is the name written in the target.
#[derive(Debug, Clone)]
pub struct TestDestination<D> {
    wrapped: D,
    faults: Faults,
}

impl<D> TestDestination<D> {
    pub fn wrap(wrapped: D) -> Self {
        Self {
            wrapped,
            faults: Faults::default(),
        }
    }

    pub fn wrapped(&self) -> &D {
        &self.wrapped
    }

    /// Makes the next `times` writes of `table` fail with `kind`.
    pub async fn fail_table(&self, table: &TableName, times: u32, kind: ErrorKind) {
        self.faults.fail(table.name().to_string(), times, kind).await;
    }

    pub async fn always_fail_table(&self, table: &TableName, kind: ErrorKind) {
        self.fail_table(table, u32::MAX, kind).await;
    }

    pub async fn set_delay(&self, delay: Duration) {
        self.faults.set_delay(delay).await;
    }

    /// Start instants of every write of `table`.
    pub async fn attempts(&self, table: &TableName) -> Vec<Instant> {
        self.faults.attempts(table.name()).await
    }
}

impl<D> Destination for TestDestination<D>
where
    D: Destination,
{
    type Connection = TestDestinationConnection<D::Connection>;

    fn name() -> &'static str {
        D::name()
    }

    async fn connect(&self) -> EtlResult<Self::Connection> {
        let wrapped = self.wrapped.connect().await?;

        Ok(TestDestinationConnection {
            wrapped,
            faults: self.faults.clone(),
        })
    }
}

#[derive(Debug)]
pub struct TestDestinationConnection<C> {
    wrapped: C,
    faults: Faults,
}

impl<C> DestinationConnection for TestDestinationConnection<C>
where
    C: DestinationConnection,
{
    async fn prepare_schema(&mut self, schema: &str) -> EtlResult<()> {
        self.wrapped.prepare_schema(schema).await
    }

    async fn replace_table(&mut self, schema: &str, table: &str, row_set: &RowSet) -> EtlResult<()> {
        self.faults.attempt(table).await?;
        self.wrapped.replace_table(schema, table, row_set).await
    }

    async fn close(self) -> EtlResult<()> {
        self.wrapped.close().await
    }
}
