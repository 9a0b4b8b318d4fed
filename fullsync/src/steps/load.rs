use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bail;
use crate::destination::{Destination, DestinationConnection};
use crate::error::{ErrorKind, EtlResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{LOAD__BEFORE_REPLACE, etl_fail_point};
use crate::handoff::HandoffStore;
use crate::types::TableName;

/// Replaces destination tables with the row sets found in the handoff store.
///
/// Clones share the preparation of the target schema: it is created by the first load that
/// reaches the destination, and the others wait for it instead of racing to create it.
#[derive(Debug, Clone)]
pub struct Loader<D, H> {
    destination: D,
    handoff: H,
    target_schema: String,
    schema_prepared: Arc<Mutex<bool>>,
}

impl<D, H> Loader<D, H>
where
    D: Destination,
    H: HandoffStore,
{
    pub fn new(destination: D, handoff: H, target_schema: impl Into<String>) -> Self {
        Self {
            destination,
            handoff,
            target_schema: target_schema.into(),
            schema_prepared: Arc::new(Mutex::new(false)),
        }
    }

    pub fn target_schema(&self) -> &str {
        &self.target_schema
    }

    /// Replaces `target_schema.<table name>` with the row set extracted for `table` and returns
    /// the number of rows written.
    ///
    /// Fails with [`ErrorKind::HandoffMissing`] before touching the destination when no row set
    /// was extracted. The handoff slot is cleared only once the replace succeeded, so a failed
    /// attempt can be retried with the same data.
    pub async fn load(&self, table: &TableName) -> EtlResult<usize> {
        let Some(row_set) = self.handoff.get(table).await? else {
            bail!(
                ErrorKind::HandoffMissing,
                "No extracted data to load",
                format!("The handoff slot of table `{table}` is empty, it must be extracted first")
            );
        };

        let mut connection = self.destination.connect().await?;
        debug!(%table, destination = D::name(), "destination connection opened");

        #[cfg(feature = "failpoints")]
        etl_fail_point(LOAD__BEFORE_REPLACE)?;

        {
            // Held across the preparation so that concurrent loads wait for it. A failed
            // preparation leaves the flag unset and the next attempt tries again.
            let mut schema_prepared = self.schema_prepared.lock().await;
            if !*schema_prepared {
                connection.prepare_schema(&self.target_schema).await?;
                *schema_prepared = true;
            }
        }

        connection
            .replace_table(&self.target_schema, table.name(), &row_set)
            .await?;

        if let Err(err) = connection.close().await {
            warn!(%table, error = %err, "failed to close the destination connection");
        }

        self.handoff.clear(table).await?;

        info!(
            %table,
            schema = %self.target_schema,
            rows = row_set.len(),
            "table loaded"
        );

        Ok(row_set.len())
    }
}
