use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::shared::{RetryConfig, ValidationError};

/// Configuration of one replication pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Identifier attached to the logs of this pipeline.
    pub id: u64,
    /// Tables to replicate, in registry order. Names may be schema qualified (`sales.orders`).
    pub tables: Vec<String>,
    /// Schema in the target under which every table is written.
    #[serde(default = "PipelineConfig::default_target_schema")]
    pub target_schema: String,
    /// Retry policy shared by every step.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Maximum number of tables replicated at the same time.
    #[serde(default = "PipelineConfig::default_max_table_workers")]
    pub max_table_workers: u16,
}

impl PipelineConfig {
    pub const DEFAULT_TARGET_SCHEMA: &'static str = "RAW";

    pub const DEFAULT_MAX_TABLE_WORKERS: u16 = 4;

    fn default_target_schema() -> String {
        Self::DEFAULT_TARGET_SCHEMA.to_string()
    }

    const fn default_max_table_workers() -> u16 {
        Self::DEFAULT_MAX_TABLE_WORKERS
    }

    /// Validates the table registry, the worker limit and the retry policy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tables.is_empty() {
            return Err(ValidationError::NoTables);
        }

        let mut seen = HashSet::with_capacity(self.tables.len());
        let mut targets = HashMap::with_capacity(self.tables.len());
        for table in &self.tables {
            let valid = !table.is_empty() && table.split('.').all(|part| !part.is_empty());
            if !valid || table.split('.').count() > 2 {
                return Err(ValidationError::InvalidTableName(table.clone()));
            }

            if !seen.insert(table.as_str()) {
                return Err(ValidationError::DuplicateTable(table.clone()));
            }

            // The target table only carries the unqualified name.
            let target = table.rsplit('.').next().unwrap_or(table);
            if let Some(previous) = targets.insert(target, table.as_str()) {
                return Err(ValidationError::DuplicateTargetTable(
                    previous.to_string(),
                    table.clone(),
                    target.to_string(),
                ));
            }
        }

        if self.target_schema.is_empty() {
            return Err(ValidationError::EmptyTargetSchema);
        }

        if self.max_table_workers == 0 {
            return Err(ValidationError::MaxTableWorkersZero);
        }

        self.retry.validate()
    }
}
