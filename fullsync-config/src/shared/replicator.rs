use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    HandoffConfig, PgConnectionConfig, PipelineConfig, ScheduleConfig, TargetConfig,
    ValidationError,
};

/// Top-level configuration of the replicator binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatorConfig {
    /// Operational database the tables are read from.
    pub source: PgConnectionConfig,
    /// Warehouse the tables are written to.
    pub target: TargetConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
    pub schedule: ScheduleConfig,
}

impl ReplicatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.target.validate()?;
        self.pipeline.validate()?;
        self.handoff.validate()?;
        self.schedule.validate()
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["pipeline.tables"];
}
