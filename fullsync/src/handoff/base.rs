use std::future::Future;
use std::sync::Arc;

use crate::error::EtlResult;
use crate::types::{RowSet, TableName};

/// Keyed store of extracted row sets, one slot per table.
///
/// A slot is written by a successful Extract, read by the following Load and cleared once the
/// Load commits. Each slot has a single writer and a single reader at a time.
pub trait HandoffStore: Clone + Send + Sync + 'static {
    /// Stores `row_set` for `table`, overwriting any previous slot.
    fn put(
        &self,
        table: &TableName,
        row_set: Arc<RowSet>,
    ) -> impl Future<Output = EtlResult<()>> + Send;

    /// Returns the row set stored for `table` without removing it.
    fn get(&self, table: &TableName)
    -> impl Future<Output = EtlResult<Option<Arc<RowSet>>>> + Send;

    /// Removes the slot of `table`. Clearing an empty slot is not an error.
    fn clear(&self, table: &TableName) -> impl Future<Output = EtlResult<()>> + Send;
}
