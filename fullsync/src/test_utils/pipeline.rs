use fullsync_config::shared::{PipelineConfig, RetryConfig};
use std::time::Duration;

use crate::destination::Destination;
use crate::error::EtlResult;
use crate::handoff::HandoffStore;
use crate::pipeline::Pipeline;
use crate::source::Source;

pub const TEST_PIPELINE_ID: u64 = 1;

/// Builds a pipeline configuration with test defaults: one retry after 100ms and the default
/// target schema.
pub fn test_pipeline_config(tables: &[&str]) -> PipelineConfig {
    PipelineConfig {
        id: TEST_PIPELINE_ID,
        tables: tables.iter().map(|table| table.to_string()).collect(),
        target_schema: PipelineConfig::DEFAULT_TARGET_SCHEMA.to_string(),
        retry: RetryConfig {
            max_attempts: 2,
            delay_ms: 100,
        },
        max_table_workers: PipelineConfig::DEFAULT_MAX_TABLE_WORKERS,
    }
}

/// Fluent builder over [`PipelineConfig`] for tests.
#[derive(Debug, Clone)]
pub struct TestPipelineBuilder {
    config: PipelineConfig,
}

impl TestPipelineBuilder {
    pub fn new(tables: &[&str]) -> Self {
        Self {
            config: test_pipeline_config(tables),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.config.retry = RetryConfig {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        };
        self
    }

    pub fn with_max_table_workers(mut self, max_table_workers: u16) -> Self {
        self.config.max_table_workers = max_table_workers;
        self
    }

    pub fn with_target_schema(mut self, target_schema: &str) -> Self {
        self.config.target_schema = target_schema.to_string();
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn build<S, D, H>(self, source: S, destination: D, handoff: H) -> EtlResult<Pipeline<S, D, H>>
    where
        S: Source,
        D: Destination,
        H: HandoffStore,
    {
        Pipeline::new(self.config, source, destination, handoff)
    }
}
