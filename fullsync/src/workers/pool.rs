use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::TableName;

#[derive(Debug, Default)]
struct TableWorkerPoolInner {
    /// Task ids of running workers, used to name the table of a panicked task.
    tasks: HashMap<Id, TableName>,
    join_set: JoinSet<(TableName, EtlResult<()>)>,
}

/// Pool owning the table workers of one run.
#[derive(Debug, Clone, Default)]
pub struct TableWorkerPool {
    inner: Arc<Mutex<TableWorkerPoolInner>>,
}

impl TableWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `future` as the worker of `table`.
    pub async fn spawn<F>(&self, table: TableName, future: F)
    where
        F: Future<Output = EtlResult<()>> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;

        let worker_table = table.clone();
        let abort_handle = inner.join_set.spawn(async move {
            let result = future.await;
            (worker_table, result)
        });

        inner.tasks.insert(abort_handle.id(), table.clone());

        debug!(%table, "spawned table worker");
    }

    /// Waits for every spawned worker and returns each table's result in completion order.
    ///
    /// A panicking worker yields an [`ErrorKind::TableWorkerPanic`] error for its table.
    pub async fn wait_all(&self) -> Vec<(TableName, EtlResult<()>)> {
        // The join set is taken out so that the lock is not held while waiting.
        let (mut join_set, mut tasks) = {
            let mut inner = self.inner.lock().await;
            (
                std::mem::take(&mut inner.join_set),
                std::mem::take(&mut inner.tasks),
            )
        };

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, (table, result))) => {
                    tasks.remove(&id);

                    if let Err(err) = &result {
                        error!(%table, error = %err, "table worker completed with error");
                    }

                    results.push((table, result));
                }
                Err(join_err) => {
                    let Some(table) = tasks.remove(&join_err.id()) else {
                        error!(error = %join_err, "unknown table worker task failed");
                        continue;
                    };

                    let err = if join_err.is_cancelled() {
                        etl_error!(
                            ErrorKind::TableWorkerPanic,
                            "Table worker was cancelled",
                            format!("The worker of table {table} was cancelled before finishing"),
                            source: join_err
                        )
                    } else {
                        etl_error!(
                            ErrorKind::TableWorkerPanic,
                            "Table worker panicked",
                            format!("The worker of table {table} panicked"),
                            source: join_err
                        )
                    };

                    error!(%table, error = %err, "table worker did not complete");
                    results.push((table, Err(err)));
                }
            }
        }

        results
    }
}
