use chrono::Utc;
use fullsync_config::shared::PipelineConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

use crate::concurrency::shutdown::{
    ShutdownRx, ShutdownTx, create_shutdown_channel, is_shutdown_requested,
};
use crate::destination::Destination;
use crate::error::EtlResult;
use crate::handoff::HandoffStore;
use crate::source::Source;
use crate::state::run::{RunOutcome, RunReport};
use crate::state::table::{Step, TablePhase};
use crate::steps::{Extractor, Loader};
use crate::types::{TableName, TableRegistry};
use crate::workers::pool::TableWorkerPool;
use crate::workers::table::{TableWorker, TableWorkerState};

pub type PipelineId = u64;

/// Replicates every table of a registry from a [`Source`] into a [`Destination`].
///
/// Each call to [`Pipeline::run`] is one full load: every table is extracted into the handoff
/// store and then loaded into the target schema, tables running in parallel up to
/// `max_table_workers`.
#[derive(Debug)]
pub struct Pipeline<S, D, H> {
    config: Arc<PipelineConfig>,
    registry: TableRegistry,
    source: S,
    destination: D,
    handoff: H,
    states: HashMap<TableName, TableWorkerState>,
    shutdown_tx: ShutdownTx,
    // Kept so that sending the shutdown signal never fails and so that receivers cloned from it
    // observe a signal sent before they were created.
    shutdown_rx: ShutdownRx,
    run_lock: Mutex<()>,
}

impl<S, D, H> Pipeline<S, D, H>
where
    S: Source,
    D: Destination,
    H: HandoffStore,
{
    pub fn new(config: PipelineConfig, source: S, destination: D, handoff: H) -> EtlResult<Self> {
        config.validate()?;

        let registry = TableRegistry::parse(&config.tables)?;
        let states = registry
            .iter()
            .map(|table| (table.clone(), TableWorkerState::new(table.clone())))
            .collect();

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        Ok(Self {
            config: Arc::new(config),
            registry,
            source,
            destination,
            handoff,
            states,
            shutdown_tx,
            shutdown_rx,
            run_lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> PipelineId {
        self.config.id
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Signals shutdown to the current run and to every later run of this pipeline.
    pub fn shutdown(&self) {
        if let Err(err) = self.shutdown_tx.shutdown() {
            warn!(error = %err, "failed to send the shutdown signal");
        }
    }

    /// Returns the live state of `table`, usable while a run is in flight.
    pub fn table_state(&self, table: &TableName) -> Option<TableWorkerState> {
        self.states.get(table).cloned()
    }

    /// Runs one full load of every table and reports the outcome of each of them.
    ///
    /// Table failures do not fail the run, they are reported in the [`RunReport`]. Runs of the
    /// same pipeline never overlap, a second call waits for the first one to finish.
    pub async fn run(&self) -> EtlResult<RunReport> {
        let _running = self.run_lock.lock().await;

        let started_at = Utc::now();
        info!(
            pipeline_id = self.id(),
            tables = self.registry.len(),
            max_table_workers = self.config.max_table_workers,
            "starting pipeline run"
        );

        let mut startable = Vec::with_capacity(self.registry.len());
        for table in self.registry.iter() {
            let Some(state) = self.states.get(table) else {
                continue;
            };
            state.reset().await;

            // A slot left over by an aborted run must never be loaded by this one.
            if let Err(err) = self.handoff.clear(table).await {
                error!(%table, error = %err, "failed to clear the stale handoff slot");
                state.lock().await.fail(Step::Extract, err);
                continue;
            }

            startable.push((table, state));
        }

        let pool = TableWorkerPool::new();
        let run_permits = Arc::new(Semaphore::new(self.config.max_table_workers as usize));
        // Shared by every worker of this run so that the target schema is prepared only once.
        let loader = Loader::new(
            self.destination.clone(),
            self.handoff.clone(),
            self.config.target_schema.clone(),
        );

        for (table, state) in startable {
            let worker = TableWorker::new(
                self.id(),
                table.clone(),
                self.config.retry,
                Extractor::new(self.source.clone(), self.handoff.clone()),
                loader.clone(),
                state.clone(),
                self.shutdown_rx.clone(),
                run_permits.clone(),
            );

            worker.spawn_into_pool(&pool).await;
        }

        for (table, result) in pool.wait_all().await {
            let Err(err) = result else {
                continue;
            };

            let Some(state) = self.states.get(&table) else {
                continue;
            };

            // Workers record their own failures, only a worker that did not finish leaves a
            // table unsettled.
            let mut inner = state.lock().await;
            if !inner.phase().as_type().is_settled() {
                let step = match inner.phase() {
                    TablePhase::Extracted | TablePhase::Loading => Step::Load,
                    _ => Step::Extract,
                };
                inner.fail(step, err);
            }
        }

        let mut tables = Vec::with_capacity(self.registry.len());
        for table in self.registry.iter() {
            if let Some(state) = self.states.get(table) {
                tables.push(state.lock().await.outcome());
            }
        }

        let report = RunReport::new(
            self.id(),
            started_at,
            tables,
            is_shutdown_requested(&self.shutdown_rx),
        );

        let failed = report.failed_tables().count();
        match report.outcome {
            RunOutcome::Succeeded => {
                info!(pipeline_id = self.id(), outcome = %report.outcome, "pipeline run finished");
            }
            RunOutcome::Cancelled => {
                warn!(
                    pipeline_id = self.id(),
                    outcome = %report.outcome,
                    failed_tables = failed,
                    "pipeline run cancelled"
                );
            }
            RunOutcome::PartiallySucceeded | RunOutcome::Failed => {
                error!(
                    pipeline_id = self.id(),
                    outcome = %report.outcome,
                    failed_tables = failed,
                    "pipeline run finished with failed tables"
                );
            }
        }

        Ok(report)
    }
}
