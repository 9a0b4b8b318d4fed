use std::future::Future;

use crate::error::EtlResult;
use crate::types::RowSet;

/// Warehouse that receives the replicated tables.
///
/// Like [`crate::source::Source`], a destination is a cloneable handle and every load attempt
/// opens and closes its own [`DestinationConnection`].
pub trait Destination: Clone + Send + Sync + 'static {
    type Connection: DestinationConnection;

    /// Returns the name of the destination, used in logs.
    fn name() -> &'static str;

    /// Opens a connection.
    ///
    /// Unreachable targets must fail with
    /// [`crate::error::ErrorKind::DestinationConnectionFailed`].
    fn connect(&self) -> impl Future<Output = EtlResult<Self::Connection>> + Send;
}

/// An open connection to a [`Destination`].
pub trait DestinationConnection: Send {
    /// Creates `schema` when missing. Called once per run before the first replace into it.
    fn prepare_schema(&mut self, schema: &str) -> impl Future<Output = EtlResult<()>> + Send;

    /// Replaces `schema.table` with `row_set`.
    ///
    /// `schema` exists already. The table is created when missing and its previous columns and
    /// rows are discarded. Readers
    /// must observe either the previous table or the new one, never a partial state. Row sets
    /// without columns or rows still leave an existing empty table behind.
    fn replace_table(
        &mut self,
        schema: &str,
        table: &str,
        row_set: &RowSet,
    ) -> impl Future<Output = EtlResult<()>> + Send;

    /// Closes the connection.
    fn close(self) -> impl Future<Output = EtlResult<()>> + Send;
}
