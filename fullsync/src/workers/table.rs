use fullsync_config::shared::RetryConfig;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, Notify, Semaphore};
use tokio::time::Instant;
use tracing::{Instrument, error, info, warn};

use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx, is_shutdown_requested};
use crate::destination::Destination;
use crate::error::{EtlError, EtlResult};
use crate::handoff::HandoffStore;
use crate::source::Source;
use crate::state::run::{StepRun, StepRunStatus, TableOutcome};
use crate::state::table::{Step, TablePhase, TablePhaseType};
use crate::steps::{Extractor, Loader};
use crate::types::TableName;
use crate::workers::policy::build_error_handling_policy;
use crate::workers::pool::TableWorkerPool;

/// Internal state of [`TableWorkerState`].
#[derive(Debug)]
pub struct TableWorkerStateInner {
    table: TableName,
    phase: TablePhase,
    phase_change: Arc<Notify>,
    runs: Vec<StepRun>,
    error: Option<EtlError>,
}

impl TableWorkerStateInner {
    /// Updates the phase and wakes every task waiting on a phase change.
    pub fn set(&mut self, phase: TablePhase) {
        info!(
            table = %self.table,
            from_phase = %self.phase,
            to_phase = %phase,
            "table phase changing",
        );

        self.phase = phase;

        // Only tasks already waiting are woken, no permit is stored.
        self.phase_change.notify_waiters();
    }

    pub fn phase(&self) -> TablePhase {
        self.phase.clone()
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Number of attempts started for `step`.
    pub fn attempts(&self, step: Step) -> u32 {
        self.runs
            .iter()
            .filter(|run| run.step == step && run.status != StepRunStatus::Pending)
            .count() as u32
    }

    pub fn runs(&self) -> &[StepRun] {
        &self.runs
    }

    /// Records a new pending attempt of `step` and returns its index.
    fn push_run(&mut self, step: Step) -> usize {
        let attempt = self.runs.iter().filter(|run| run.step == step).count() as u32 + 1;
        self.runs.push(StepRun {
            step,
            attempt,
            status: StepRunStatus::Pending,
            started_at: None,
            error: None,
        });

        self.runs.len() - 1
    }

    fn start_run(&mut self, index: usize) {
        if let Some(run) = self.runs.get_mut(index) {
            run.status = StepRunStatus::Running;
            run.started_at = Some(Instant::now());
        }
    }

    fn finish_run(&mut self, index: usize, error: Option<EtlError>) {
        if let Some(run) = self.runs.get_mut(index) {
            run.status = match error {
                Some(_) => StepRunStatus::Failed,
                None => StepRunStatus::Succeeded,
            };
            run.error = error;
        }
    }

    /// Marks the table as failed in `step` because of `error`.
    pub fn fail(&mut self, step: Step, error: EtlError) {
        let reason = match error.detail() {
            Some(detail) => format!("{}: {detail}", error.description()),
            None => error.description().to_string(),
        };

        self.error = Some(error);
        self.set(TablePhase::Failed { step, reason });
    }

    fn reset(&mut self) {
        self.runs.clear();
        self.error = None;
        self.set(TablePhase::Pending);
    }

    /// Snapshot of the table for the run report.
    pub fn outcome(&self) -> TableOutcome {
        TableOutcome {
            table: self.table.clone(),
            phase: self.phase.clone(),
            extract_attempts: self.attempts(Step::Extract),
            load_attempts: self.attempts(Step::Load),
            runs: self.runs.clone(),
            error: self.error.clone(),
        }
    }
}

/// Shared, observable state of one table.
///
/// The worker owning the table updates it while other tasks can read it or wait for a phase.
#[derive(Debug, Clone)]
pub struct TableWorkerState {
    inner: Arc<Mutex<TableWorkerStateInner>>,
}

impl TableWorkerState {
    pub fn new(table: TableName) -> Self {
        let inner = TableWorkerStateInner {
            table,
            phase: TablePhase::Pending,
            phase_change: Arc::new(Notify::new()),
            runs: Vec::new(),
            error: None,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Brings the table back to [`TablePhase::Pending`] and forgets the previous attempts.
    pub async fn reset(&self) {
        self.inner.lock().await.reset();
    }

    pub async fn phase(&self) -> TablePhase {
        self.inner.lock().await.phase()
    }

    /// Waits until the table reaches one of `phase_types` or shutdown is signaled.
    pub async fn wait_for_phase_type(
        &self,
        phase_types: &[TablePhaseType],
        mut shutdown_rx: ShutdownRx,
    ) -> ShutdownResult<MutexGuard<'_, TableWorkerStateInner>, ()> {
        loop {
            let inner = self.inner.lock().await;

            let current_phase = inner.phase.as_type();
            if phase_types.contains(&current_phase) {
                return ShutdownResult::Ok(inner);
            }

            // Register for the change while holding the lock so that a change happening right
            // after the lock is released is not missed.
            let phase_change = inner.phase_change.clone();
            let phase_change_notified = phase_change.notified();

            drop(inner);

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    return ShutdownResult::Shutdown(());
                }

                _ = phase_change_notified => {}
            }
        }
    }
}

impl Deref for TableWorkerState {
    type Target = Mutex<TableWorkerStateInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Worker replicating one table: Extract, then Load, each step retried on its own.
#[derive(Debug)]
pub struct TableWorker<S, D, H> {
    pipeline_id: u64,
    table: TableName,
    retry: RetryConfig,
    extractor: Extractor<S, H>,
    loader: Loader<D, H>,
    state: TableWorkerState,
    shutdown_rx: ShutdownRx,
    run_permit: Arc<Semaphore>,
}

impl<S, D, H> TableWorker<S, D, H>
where
    S: Source,
    D: Destination,
    H: HandoffStore,
{
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        pipeline_id: u64,
        table: TableName,
        retry: RetryConfig,
        extractor: Extractor<S, H>,
        loader: Loader<D, H>,
        state: TableWorkerState,
        shutdown_rx: ShutdownRx,
        run_permit: Arc<Semaphore>,
    ) -> Self {
        Self {
            pipeline_id,
            table,
            retry,
            extractor,
            loader,
            state,
            shutdown_rx,
            run_permit,
        }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Spawns the worker into `pool`.
    pub async fn spawn_into_pool(self, pool: &TableWorkerPool) {
        let span = tracing::info_span!(
            "table_worker",
            pipeline_id = self.pipeline_id,
            table = %self.table,
        );

        let table = self.table.clone();
        let future = self.run().instrument(span);

        pool.spawn(table, future).await;
    }

    /// Runs the table pipeline to completion.
    ///
    /// Returns `Ok(())` when the table is done or when the run was shut down before the table
    /// failed, and the final error otherwise. The error is also stored in the table state.
    async fn run(mut self) -> EtlResult<()> {
        // A table holds its permit for the whole Extract -> Load sequence.
        let permit = tokio::select! {
            biased;

            _ = self.shutdown_rx.changed() => {
                info!("shutdown signaled before the table started");
                return Ok(());
            }

            permit = self.run_permit.clone().acquire_owned() => permit,
        };

        // The semaphore is never closed by the pipeline, a closed one means the run is over.
        let Ok(_permit) = permit else {
            return Ok(());
        };

        if is_shutdown_requested(&self.shutdown_rx) {
            info!("shutdown signaled before the table started");
            return Ok(());
        }

        let extracted = run_step(
            Step::Extract,
            &self.state,
            &self.retry,
            &mut self.shutdown_rx,
            || self.extractor.extract(&self.table),
        )
        .await;

        match extracted {
            ShutdownResult::Ok(Ok(_)) => {
                self.state.lock().await.set(TablePhase::Extracted);
            }
            ShutdownResult::Ok(Err(err)) => return Err(err),
            ShutdownResult::Shutdown(()) => return Ok(()),
        }

        let loaded = run_step(
            Step::Load,
            &self.state,
            &self.retry,
            &mut self.shutdown_rx,
            || self.loader.load(&self.table),
        )
        .await;

        match loaded {
            ShutdownResult::Ok(Ok(rows)) => {
                self.state.lock().await.set(TablePhase::Done { rows });
                Ok(())
            }
            ShutdownResult::Ok(Err(err)) => Err(err),
            ShutdownResult::Shutdown(()) => Ok(()),
        }
    }
}

/// Runs `operation` until it succeeds, fails without retry, or `retry.max_attempts` attempts
/// are spent.
///
/// Shutdown is only observed between attempts. A shutdown during the back-off delay fails the
/// table with the last error; a shutdown noticed before the first attempt leaves the phase as is.
async fn run_step<T, F, Fut>(
    step: Step,
    state: &TableWorkerState,
    retry: &RetryConfig,
    shutdown_rx: &mut ShutdownRx,
    mut operation: F,
) -> ShutdownResult<EtlResult<T>, ()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EtlResult<T>>,
{
    let phase = match step {
        Step::Extract => TablePhase::Extracting,
        Step::Load => TablePhase::Loading,
    };

    let mut attempt = 0;
    loop {
        attempt += 1;

        if is_shutdown_requested(shutdown_rx) {
            info!(%step, attempt, "shutdown signaled, not starting a new attempt");
            return ShutdownResult::Shutdown(());
        }

        let run_index = {
            let mut inner = state.lock().await;
            if inner.phase != phase {
                inner.set(phase.clone());
            }

            let index = inner.push_run(step);
            inner.start_run(index);
            index
        };

        info!(%step, attempt, max_attempts = retry.max_attempts, "step attempt started");

        let err = match operation().await {
            Ok(value) => {
                state.lock().await.finish_run(run_index, None);
                return ShutdownResult::Ok(Ok(value));
            }
            Err(err) => err,
        };

        state.lock().await.finish_run(run_index, Some(err.clone()));

        let policy = build_error_handling_policy(&err);
        if !policy.should_retry() {
            error!(
                %step,
                attempt,
                error = %err,
                solution = policy.solution().unwrap_or_default(),
                "step failed with an error that is not retried"
            );

            state.lock().await.fail(step, err.clone());
            return ShutdownResult::Ok(Err(err));
        }

        if attempt >= retry.max_attempts {
            error!(%step, attempt, error = %err, "step failed, no attempts left");

            let err = EtlError::retry_exhausted(err, attempt);
            state.lock().await.fail(step, err.clone());
            return ShutdownResult::Ok(Err(err));
        }

        warn!(
            %step,
            attempt,
            delay_ms = retry.delay_ms,
            error = %err,
            "step failed, retrying after delay"
        );

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!(%step, "shutdown signaled while waiting to retry");

                state.lock().await.fail(step, err.clone());
                return ShutdownResult::Ok(Err(err));
            }

            _ = tokio::time::sleep(retry.delay()) => {}
        }
    }
}
