use fullsync::destination::Destination;
use fullsync::handoff::{ConfiguredHandoffStore, HandoffStore};
use fullsync::pipeline::Pipeline;
use fullsync::source::Source;
use fullsync::state::run::{RunOutcome, RunReport};
use fullsync_config::shared::{
    HandoffConfig, PgConnectionConfig, PipelineConfig, ReplicatorConfig, ScheduleConfig,
    TargetConfig,
};
use fullsync_postgres::destination::PgDestination;
use fullsync_postgres::source::PgSource;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

use crate::scheduler::{Schedule, run_scheduler};

/// How the replicator triggers pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// A single run, right away.
    Once,
    /// Runs at every fire time of the configured schedule.
    Scheduled,
}

/// Starts the replicator with `replicator_config`.
///
/// Returns the outcome of the run in [`RunMode::Once`] and `None` once the schedule loop exits.
pub async fn start_replicator_with_config(
    replicator_config: ReplicatorConfig,
    mode: RunMode,
) -> anyhow::Result<Option<RunOutcome>> {
    info!(?mode, "starting replicator service");

    log_config(&replicator_config);
    install_crypto_provider();

    let source = PgSource::new(replicator_config.source);
    let destination = PgDestination::new(replicator_config.target);
    let handoff = ConfiguredHandoffStore::from_config(&replicator_config.handoff).await?;

    let pipeline = Pipeline::new(replicator_config.pipeline, source, destination, handoff)?;
    let shutdown_handle = spawn_shutdown_listener(&pipeline)?;

    let result = match mode {
        RunMode::Once => run_pipeline(&pipeline).await.map(Some),
        RunMode::Scheduled => {
            let schedule = Schedule::new(&replicator_config.schedule)?;
            let shutdown_rx = pipeline.shutdown_tx().subscribe();

            let pipeline = &pipeline;
            run_scheduler(schedule, shutdown_rx, move |fire_time| async move {
                // A run that could not start is retried at the next fire time.
                if let Err(err) = run_pipeline(pipeline).await {
                    error!(%fire_time, "scheduled run failed: {err:#}");
                }

                Ok(())
            })
            .await
            .map(|_| None)
        }
    };

    // The listener is still waiting for a signal when the replicator ends on its own.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    info!("replicator service completed");

    result
}

/// Runs the pipeline once and logs its report.
///
/// Failed tables are part of the report, only errors that prevent the run itself are returned.
async fn run_pipeline<S, D, H>(pipeline: &Pipeline<S, D, H>) -> anyhow::Result<RunOutcome>
where
    S: Source,
    D: Destination,
    H: HandoffStore,
{
    let report = pipeline.run().await?;
    log_report(&report);

    Ok(report.outcome)
}

fn log_report(report: &RunReport) {
    for table in &report.tables {
        match &table.error {
            Some(err) => error!(
                table = %table.table,
                phase = %table.phase,
                extract_attempts = table.extract_attempts,
                load_attempts = table.load_attempts,
                error = %err,
                "table failed"
            ),
            None => info!(
                table = %table.table,
                phase = %table.phase,
                extract_attempts = table.extract_attempts,
                load_attempts = table.load_attempts,
                "table settled"
            ),
        }
    }

    let duration_ms = (report.finished_at - report.started_at).num_milliseconds();
    info!(
        pipeline_id = report.pipeline_id,
        outcome = %report.outcome,
        duration_ms,
        "run report"
    );
}

/// Installs the process wide rustls crypto provider used by TLS connections.
fn install_crypto_provider() {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// Forwards SIGTERM and SIGINT to the pipeline shutdown signal.
fn spawn_shutdown_listener<S, D, H>(
    pipeline: &Pipeline<S, D, H>,
) -> anyhow::Result<tokio::task::JoinHandle<()>>
where
    S: Source,
    D: Destination,
    H: HandoffStore,
{
    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown_tx = pipeline.shutdown_tx();

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, shutting down pipeline");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, shutting down pipeline");
            }
        }

        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = ?err, "failed to send shutdown signal");
        }
    }))
}

fn log_config(config: &ReplicatorConfig) {
    log_pg_connection_config("source", &config.source);
    log_target_config(&config.target);
    log_pipeline_config(&config.pipeline);
    log_handoff_config(&config.handoff);
    log_schedule_config(&config.schedule);
}

fn log_pg_connection_config(side: &str, config: &PgConnectionConfig) {
    debug!(
        side,
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "postgres connection config"
    );
}

fn log_target_config(config: &TargetConfig) {
    log_pg_connection_config("target", &config.connection);
    debug!(max_batch_rows = config.max_batch_rows, "target config");
}

fn log_pipeline_config(config: &PipelineConfig) {
    debug!(
        pipeline_id = config.id,
        tables = ?config.tables,
        target_schema = config.target_schema,
        retry_max_attempts = config.retry.max_attempts,
        retry_delay_ms = config.retry.delay_ms,
        max_table_workers = config.max_table_workers,
        "pipeline config"
    );
}

fn log_handoff_config(config: &HandoffConfig) {
    match config {
        HandoffConfig::Memory => debug!("using memory handoff store"),
        HandoffConfig::File { path } => {
            debug!(path = %path.display(), "using file handoff store")
        }
    }
}

fn log_schedule_config(config: &ScheduleConfig) {
    debug!(
        start_at = %config.start_at,
        interval_secs = config.interval_secs,
        "schedule config"
    );
}
