use std::fmt;

/// The two steps of a table pipeline, always run in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Extract,
    Load,
}

impl Step {
    pub fn as_static_str(&self) -> &'static str {
        match self {
            Step::Extract => "extract",
            Step::Load => "load",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_static_str())
    }
}

/// Phase of one table within a run.
///
/// ```text
/// Pending -> Extracting -> Extracted -> Loading -> Done
///                 |                        |
///                 +--------> Failed <------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TablePhase {
    /// Not started yet, either waiting for a worker slot or never started because the run was
    /// cancelled.
    Pending,
    /// An extract attempt is running or waiting to be retried.
    Extracting,
    /// The row set is in the handoff store, the load has not started yet.
    Extracted,
    /// A load attempt is running or waiting to be retried.
    Loading,
    /// The destination table was replaced.
    Done {
        rows: usize,
    },
    /// The table gave up in `step`.
    Failed {
        step: Step,
        reason: String,
    },
}

impl TablePhase {
    pub fn as_type(&self) -> TablePhaseType {
        self.into()
    }
}

impl fmt::Display for TablePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Extracting => write!(f, "extracting"),
            Self::Extracted => write!(f, "extracted"),
            Self::Loading => write!(f, "loading"),
            Self::Done { rows } => write!(f, "done({rows} rows)"),
            Self::Failed { step, reason } => write!(f, "failed({step}: {reason})"),
        }
    }
}

/// [`TablePhase`] without its data, for matching and waiting.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TablePhaseType {
    Pending,
    Extracting,
    Extracted,
    Loading,
    Done,
    Failed,
}

impl TablePhaseType {
    /// Returns `true` once the table will not change anymore in this run.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_static_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::Loading => "loading",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TablePhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_static_str())
    }
}

impl<'a> From<&'a TablePhase> for TablePhaseType {
    fn from(phase: &'a TablePhase) -> Self {
        match phase {
            TablePhase::Pending => Self::Pending,
            TablePhase::Extracting => Self::Extracting,
            TablePhase::Extracted => Self::Extracted,
            TablePhase::Loading => Self::Loading,
            TablePhase::Done { .. } => Self::Done,
            TablePhase::Failed { .. } => Self::Failed,
        }
    }
}
