//! Shared configuration types for fullsync pipelines.

mod base;
mod connection;
mod handoff;
mod pipeline;
mod replicator;
mod retry;
mod schedule;
mod target;

pub use base::ValidationError;
pub use connection::{
    DEFAULT_PG_CONNECTION_OPTIONS, IntoConnectOptions, PgConnectionConfig, PgConnectionOptions,
    TlsConfig,
};
pub use handoff::HandoffConfig;
pub use pipeline::PipelineConfig;
pub use replicator::ReplicatorConfig;
pub use retry::RetryConfig;
pub use schedule::ScheduleConfig;
pub use target::TargetConfig;
