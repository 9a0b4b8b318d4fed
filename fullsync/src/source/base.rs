use std::future::Future;

use crate::error::EtlResult;
use crate::types::Cell;

/// Result of a read query: column names from the result metadata and every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Operational database that tables are read from.
///
/// A [`Source`] is a cheap handle cloned into every table worker; each extract attempt opens its
/// own [`SourceConnection`] and closes it before returning.
pub trait Source: Clone + Send + Sync + 'static {
    type Connection: SourceConnection;

    /// Returns the name of the source, used in logs.
    fn name() -> &'static str;

    /// Opens a connection.
    ///
    /// Unreachable databases must fail with
    /// [`crate::error::ErrorKind::SourceConnectionFailed`].
    fn connect(&self) -> impl Future<Output = EtlResult<Self::Connection>> + Send;
}

/// An open connection to a [`Source`].
pub trait SourceConnection: Send {
    /// Runs a read-only query and materializes every row.
    ///
    /// Failures of the query itself, e.g. a missing table or a permission error, are reported as
    /// [`crate::error::ErrorKind::SourceQueryFailed`].
    fn query(&mut self, sql: &str) -> impl Future<Output = EtlResult<QueryResult>> + Send;

    /// Closes the connection.
    fn close(self) -> impl Future<Output = EtlResult<()>> + Send;
}
