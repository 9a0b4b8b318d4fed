use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::ValidationError;

/// Retry policy applied to each Extract and Load step of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per step, the first attempt included.
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between two attempts of the same step, in milliseconds.
    #[serde(default = "RetryConfig::default_delay_ms")]
    pub delay_ms: u64,
}

impl RetryConfig {
    /// One retry after the first attempt.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

    /// Five minutes.
    pub const DEFAULT_DELAY_MS: u64 = 5 * 60 * 1000;

    const fn default_max_attempts() -> u32 {
        Self::DEFAULT_MAX_ATTEMPTS
    }

    const fn default_delay_ms() -> u64 {
        Self::DEFAULT_DELAY_MS
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::RetryMaxAttemptsZero);
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay_ms: Self::DEFAULT_DELAY_MS,
        }
    }
}
