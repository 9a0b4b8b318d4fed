use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::EtlResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{EXTRACT__BEFORE_HANDOFF_PUT, etl_fail_point};
use crate::handoff::HandoffStore;
use crate::source::{QueryResult, Source, SourceConnection};
use crate::types::{RowSet, TableName, TableRow, Value};

/// Statement reading every row of `table`.
pub fn full_table_query(table: &TableName) -> String {
    format!("SELECT * FROM {}", table.as_quoted_identifier())
}

/// Reads whole tables from a [`Source`] into the handoff store.
#[derive(Debug, Clone)]
pub struct Extractor<S, H> {
    source: S,
    handoff: H,
}

impl<S, H> Extractor<S, H>
where
    S: Source,
    H: HandoffStore,
{
    pub fn new(source: S, handoff: H) -> Self {
        Self { source, handoff }
    }

    /// Reads every row of `table`, normalizes it and stores it in the table's handoff slot.
    ///
    /// The source connection is opened for this call only and released on every exit path.
    pub async fn extract(&self, table: &TableName) -> EtlResult<Arc<RowSet>> {
        let mut connection = self.source.connect().await?;
        debug!(%table, source = S::name(), "source connection opened");

        // On error the connection is dropped, which releases it.
        let result = connection.query(&full_table_query(table)).await?;

        if let Err(err) = connection.close().await {
            warn!(%table, error = %err, "failed to close the source connection");
        }

        let row_set = Arc::new(normalize(result)?);

        #[cfg(feature = "failpoints")]
        etl_fail_point(EXTRACT__BEFORE_HANDOFF_PUT)?;

        self.handoff.put(table, row_set.clone()).await?;

        info!(
            %table,
            rows = row_set.len(),
            columns = row_set.columns().len(),
            "table extracted"
        );

        Ok(row_set)
    }
}

/// Converts every source cell into a transport-safe value.
fn normalize(result: QueryResult) -> EtlResult<RowSet> {
    let rows = result
        .rows
        .into_iter()
        .map(|cells| TableRow::new(cells.into_iter().map(Value::from).collect()))
        .collect();

    RowSet::try_new(result.column_names, rows)
}
