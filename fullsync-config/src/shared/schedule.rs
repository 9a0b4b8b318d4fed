use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Recurring trigger for pipeline runs.
///
/// Runs fire at `start_at + k * interval_secs` for every `k >= 0`. Fire times missed while the
/// process was busy or down are not caught up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// First fire time, as an RFC 3339 timestamp.
    pub start_at: DateTime<Utc>,
    /// Seconds between two fire times. Defaults to one day.
    #[serde(default = "ScheduleConfig::default_interval_secs")]
    pub interval_secs: u64,
}

impl ScheduleConfig {
    pub const DEFAULT_INTERVAL_SECS: u64 = 24 * 60 * 60;

    const fn default_interval_secs() -> u64 {
        Self::DEFAULT_INTERVAL_SECS
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::ScheduleIntervalZero);
        }

        Ok(())
    }
}
