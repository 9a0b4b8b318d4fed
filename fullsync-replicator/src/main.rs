//! Replicator service binary.
//!
//! Loads the configuration, initializes tracing and runs the full-load pipeline either once or on
//! its configured schedule until SIGTERM or SIGINT.

use clap::Parser;
use fullsync::state::run::RunOutcome;
use fullsync_config::shared::ReplicatorConfig;
use fullsync_telemetry::tracing::init_tracing_with_pipeline_id;
use std::process::ExitCode;
use tracing::{error, info};

use crate::config::load_replicator_config;
use crate::core::{RunMode, start_replicator_with_config};

mod config;
mod core;
mod scheduler;

#[derive(Debug, Parser)]
#[command(version, about = "Replicates a registry of tables into a warehouse schema")]
struct Args {
    /// Runs the pipeline a single time instead of following the schedule.
    #[arg(long)]
    once: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let replicator_config = load_replicator_config()?;

    let _log_flusher = init_tracing_with_pipeline_id(
        env!("CARGO_BIN_NAME"),
        Some(replicator_config.pipeline.id),
    )?;

    let mode = if args.once {
        RunMode::Once
    } else {
        RunMode::Scheduled
    };

    let outcome = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(replicator_config, mode))?;

    match outcome {
        Some(outcome) if outcome != RunOutcome::Succeeded => {
            error!(%outcome, "replication run did not fully succeed");
            Ok(ExitCode::FAILURE)
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

async fn async_main(
    replicator_config: ReplicatorConfig,
    mode: RunMode,
) -> anyhow::Result<Option<RunOutcome>> {
    match start_replicator_with_config(replicator_config, mode).await {
        Ok(outcome) => {
            info!(?outcome, "replicator finished");
            Ok(outcome)
        }
        Err(err) => {
            error!("{err:#}");
            Err(err)
        }
    }
}
