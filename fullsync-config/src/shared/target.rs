use serde::{Deserialize, Serialize};

use crate::shared::{PgConnectionConfig, ValidationError};

/// Settings of the warehouse that receives the replicated tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub connection: PgConnectionConfig,
    /// Maximum number of rows sent in one `INSERT` statement.
    #[serde(default = "TargetConfig::default_max_batch_rows")]
    pub max_batch_rows: usize,
}

impl TargetConfig {
    pub const DEFAULT_MAX_BATCH_ROWS: usize = 1000;

    const fn default_max_batch_rows() -> usize {
        Self::DEFAULT_MAX_BATCH_ROWS
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()?;

        if self.max_batch_rows == 0 {
            return Err(ValidationError::MaxBatchRowsZero);
        }

        Ok(())
    }
}
