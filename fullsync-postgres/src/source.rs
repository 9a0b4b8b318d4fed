use fullsync::error::{ErrorKind, EtlResult};
use fullsync::source::{QueryResult, Source, SourceConnection};
use fullsync::types::Cell;
use fullsync::{bail, etl_error};
use fullsync_config::shared::PgConnectionConfig;
use std::sync::Arc;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, SimpleQueryMessage};
use tracing::debug;

use crate::connect::connect;
use crate::error::{Side, source_error};
use crate::text::TextFormatConverter;

/// Operational Postgres database that tables are read from.
#[derive(Debug, Clone)]
pub struct PgSource {
    config: Arc<PgConnectionConfig>,
}

impl PgSource {
    pub fn new(config: PgConnectionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Source for PgSource {
    type Connection = PgSourceConnection;

    fn name() -> &'static str {
        "postgres"
    }

    async fn connect(&self) -> EtlResult<Self::Connection> {
        let client = connect(&self.config, Side::Source).await?;

        Ok(PgSourceConnection { client })
    }
}

#[derive(Debug)]
pub struct PgSourceConnection {
    client: Client,
}

impl SourceConnection for PgSourceConnection {
    /// Runs `sql` in a read only snapshot.
    ///
    /// Column types come from describing the statement, values from the text protocol so that
    /// every type, including the ones without a binary decoder, can be read.
    async fn query(&mut self, sql: &str) -> EtlResult<QueryResult> {
        let transaction = self
            .client
            .build_transaction()
            .read_only(true)
            .isolation_level(tokio_postgres::IsolationLevel::RepeatableRead)
            .start()
            .await
            .map_err(source_error)?;

        let statement = transaction.prepare(sql).await.map_err(source_error)?;
        let column_names: Vec<String> = statement
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect();
        let column_types: Vec<Type> = statement
            .columns()
            .iter()
            .map(|column| column.type_().clone())
            .collect();

        let messages = transaction.simple_query(sql).await.map_err(source_error)?;

        let mut rows = Vec::new();
        for message in messages {
            let SimpleQueryMessage::Row(row) = message else {
                continue;
            };

            if row.len() != column_types.len() {
                bail!(
                    ErrorKind::InvalidState,
                    "Source row does not match the described columns",
                    format!(
                        "The row has {} values but the statement describes {} columns",
                        row.len(),
                        column_types.len()
                    )
                );
            }

            let mut cells = Vec::with_capacity(column_types.len());
            for (index, typ) in column_types.iter().enumerate() {
                let text = row.try_get(index).map_err(source_error)?;
                let cell = match text {
                    Some(text) => TextFormatConverter::try_from_str(typ, text).map_err(|err| {
                        etl_error!(
                            ErrorKind::ConversionError,
                            "Failed to convert a source value",
                            format!(
                                "Column '{}' of type {} holds an unreadable value",
                                column_names[index],
                                typ.name()
                            ),
                            source: err
                        )
                    })?,
                    None => Cell::Null,
                };
                cells.push(cell);
            }

            rows.push(cells);
        }

        transaction.commit().await.map_err(source_error)?;

        debug!(rows = rows.len(), columns = column_names.len(), "source query completed");

        Ok(QueryResult { column_names, rows })
    }

    async fn close(self) -> EtlResult<()> {
        // The connection task ends once the client is dropped.
        drop(self.client);
        Ok(())
    }
}
