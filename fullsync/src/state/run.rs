use chrono::{DateTime, Utc};
use std::fmt;
use tokio::time::Instant;

use crate::error::EtlError;
use crate::state::table::{Step, TablePhase, TablePhaseType};
use crate::types::TableName;

/// Status of a single step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One attempt of one step of one table.
#[derive(Debug, Clone)]
pub struct StepRun {
    pub step: Step,
    /// 1-based attempt number within the step.
    pub attempt: u32,
    pub status: StepRunStatus,
    /// Set when the attempt started running.
    pub started_at: Option<Instant>,
    pub error: Option<EtlError>,
}

/// Final state of one table after a run.
#[derive(Debug, Clone)]
pub struct TableOutcome {
    pub table: TableName,
    pub phase: TablePhase,
    pub extract_attempts: u32,
    pub load_attempts: u32,
    /// Every attempt made, in order.
    pub runs: Vec<StepRun>,
    /// Error that made the table fail, if it did.
    pub error: Option<EtlError>,
}

impl TableOutcome {
    pub fn is_done(&self) -> bool {
        self.phase.as_type() == TablePhaseType::Done
    }

    pub fn is_failed(&self) -> bool {
        self.phase.as_type() == TablePhaseType::Failed
    }
}

/// Aggregated result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every table is done.
    Succeeded,
    /// Some tables are done, the others failed.
    PartiallySucceeded,
    /// No table is done.
    Failed,
    /// The run was shut down before every table settled.
    Cancelled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self {
            Self::Succeeded => "succeeded",
            Self::PartiallySucceeded => "partially_succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };

        f.write_str(outcome)
    }
}

/// Per-table report of one pipeline run, tables in registry order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub tables: Vec<TableOutcome>,
}

impl RunReport {
    pub(crate) fn new(
        pipeline_id: u64,
        started_at: DateTime<Utc>,
        tables: Vec<TableOutcome>,
        cancelled: bool,
    ) -> Self {
        let done = tables.iter().filter(|table| table.is_done()).count();
        let outcome = if done == tables.len() {
            RunOutcome::Succeeded
        } else if cancelled {
            RunOutcome::Cancelled
        } else if done == 0 {
            RunOutcome::Failed
        } else {
            RunOutcome::PartiallySucceeded
        };

        Self {
            pipeline_id,
            started_at,
            finished_at: Utc::now(),
            outcome,
            tables,
        }
    }

    pub fn table(&self, table: &TableName) -> Option<&TableOutcome> {
        self.tables.iter().find(|outcome| &outcome.table == table)
    }

    pub fn failed_tables(&self) -> impl Iterator<Item = &TableOutcome> {
        self.tables.iter().filter(|table| table.is_failed())
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    /// Aggregates the errors of every failed table, `None` when no table failed.
    pub fn error(&self) -> Option<EtlError> {
        let errors: Vec<EtlError> = self
            .failed_tables()
            .filter_map(|table| table.error.clone())
            .collect();

        if errors.is_empty() {
            None
        } else {
            Some(errors.into())
        }
    }
}
