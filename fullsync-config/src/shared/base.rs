use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The table registry is empty.
    #[error("`tables` must contain at least one table")]
    NoTables,
    /// A table name is empty or has an empty schema/table part.
    #[error("table name `{0}` is invalid")]
    InvalidTableName(String),
    /// The same table appears more than once in the registry.
    #[error("table `{0}` is listed more than once")]
    DuplicateTable(String),
    /// Two tables from different schemas would be written to the same target table.
    #[error("tables `{0}` and `{1}` both load into target table `{2}`")]
    DuplicateTargetTable(String, String, String),
    /// The target schema name is empty.
    #[error("`target_schema` cannot be empty")]
    EmptyTargetSchema,
    /// Maximum table workers cannot be zero.
    #[error("`max_table_workers` cannot be zero")]
    MaxTableWorkersZero,
    /// Maximum retry attempts cannot be zero.
    #[error("`retry.max_attempts` cannot be zero")]
    RetryMaxAttemptsZero,
    /// Maximum rows per insert batch cannot be zero.
    #[error("`max_batch_rows` cannot be zero")]
    MaxBatchRowsZero,
    /// The schedule interval cannot be zero.
    #[error("`schedule.interval_secs` cannot be zero")]
    ScheduleIntervalZero,
    /// The file handoff directory is empty.
    #[error("`handoff.path` cannot be empty")]
    EmptyHandoffPath,
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
}
