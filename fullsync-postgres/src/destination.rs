use fullsync::destination::{Destination, DestinationConnection};
use fullsync::error::EtlResult;
use fullsync::types::{RowSet, Value};
use fullsync_config::shared::TargetConfig;
use pg_escape::quote_identifier;
use std::fmt::Write;
use std::sync::Arc;
use tokio_postgres::Client;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tracing::{debug, info};
use uuid::Uuid;

use crate::connect::connect;
use crate::error::{Side, destination_error};

/// Maximum number of bind parameters of one statement in the Postgres protocol.
const MAX_BIND_PARAMETERS: usize = u16::MAX as usize;

/// Warehouse reached over the Postgres wire protocol.
#[derive(Debug, Clone)]
pub struct PgDestination {
    config: Arc<TargetConfig>,
}

impl PgDestination {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Destination for PgDestination {
    type Connection = PgDestinationConnection;

    fn name() -> &'static str {
        "postgres"
    }

    async fn connect(&self) -> EtlResult<Self::Connection> {
        let client = connect(&self.config.connection, Side::Destination).await?;

        Ok(PgDestinationConnection {
            client,
            max_batch_rows: self.config.max_batch_rows,
        })
    }
}

#[derive(Debug)]
pub struct PgDestinationConnection {
    client: Client,
    max_batch_rows: usize,
}

impl DestinationConnection for PgDestinationConnection {
    async fn prepare_schema(&mut self, schema: &str) -> EtlResult<()> {
        let statement = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(schema));

        match self.client.batch_execute(&statement).await {
            Ok(()) => {}
            // A concurrent creator committed the schema first.
            Err(err) if err.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                debug!(schema, "target schema created concurrently");
            }
            Err(err) => return Err(destination_error(err)),
        }

        info!(schema, "target schema prepared");

        Ok(())
    }

    /// Writes the rows into a fresh staging table and swaps it with the target in one
    /// transaction. On failure the transaction rolls back and the previous table stays in place.
    async fn replace_table(&mut self, schema: &str, table: &str, row_set: &RowSet) -> EtlResult<()> {
        let columns = infer_column_types(row_set);
        let quoted_schema = quote_identifier(schema);
        let staging_table = format!(
            "{quoted_schema}.{}",
            quote_identifier(&staging_table_name())
        );

        let transaction = self.client.transaction().await.map_err(destination_error)?;

        transaction
            .batch_execute(&create_table_statement(
                &staging_table,
                row_set.columns(),
                &columns,
            ))
            .await
            .map_err(destination_error)?;

        let batch_rows = rows_per_statement(columns.len(), self.max_batch_rows);
        for batch in row_set.rows().chunks(batch_rows) {
            if columns.is_empty() {
                let statement = format!("INSERT INTO {staging_table} DEFAULT VALUES");
                for _ in batch {
                    transaction
                        .execute(statement.as_str(), &[])
                        .await
                        .map_err(destination_error)?;
                }
                continue;
            }

            let statement =
                insert_statement(&staging_table, row_set.columns(), &columns, batch.len());

            let mut parameters: Vec<Box<dyn ToSql + Sync + Send>> =
                Vec::with_capacity(batch.len() * columns.len());
            for row in batch {
                for (value, column_type) in row.values().iter().zip(&columns) {
                    parameters.push(column_type.to_parameter(value));
                }
            }
            let parameter_refs: Vec<&(dyn ToSql + Sync)> = parameters
                .iter()
                .map(|parameter| parameter.as_ref() as &(dyn ToSql + Sync))
                .collect();

            transaction
                .execute(statement.as_str(), &parameter_refs)
                .await
                .map_err(destination_error)?;
        }

        let quoted_table = quote_identifier(table);
        transaction
            .batch_execute(&format!(
                "DROP TABLE IF EXISTS {quoted_schema}.{quoted_table};\n\
                 ALTER TABLE {staging_table} RENAME TO {quoted_table};"
            ))
            .await
            .map_err(destination_error)?;

        transaction.commit().await.map_err(destination_error)?;

        info!(
            schema,
            table,
            rows = row_set.len(),
            columns = row_set.columns().len(),
            "destination table replaced"
        );

        Ok(())
    }

    async fn close(self) -> EtlResult<()> {
        drop(self.client);
        Ok(())
    }
}

/// Postgres type of a destination column, picked from the values it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    DoublePrecision,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::BigInt => "bigint",
            ColumnType::DoublePrecision => "double precision",
            ColumnType::Text => "text",
        }
    }

    /// Widens `self` so that it can also hold `value`.
    fn widen(current: Option<ColumnType>, value: &Value) -> Option<ColumnType> {
        let value_type = match value {
            Value::Null => return current,
            Value::Bool(_) => ColumnType::Boolean,
            Value::I64(_) => ColumnType::BigInt,
            Value::F64(_) => ColumnType::DoublePrecision,
            Value::String(_) => ColumnType::Text,
        };

        let widened = match (current, value_type) {
            (None, value_type) => value_type,
            (Some(current), value_type) if current == value_type => current,
            (Some(ColumnType::BigInt), ColumnType::DoublePrecision)
            | (Some(ColumnType::DoublePrecision), ColumnType::BigInt) => ColumnType::DoublePrecision,
            _ => ColumnType::Text,
        };

        Some(widened)
    }

    fn to_parameter(self, value: &Value) -> Box<dyn ToSql + Sync + Send> {
        match (self, value) {
            (ColumnType::Boolean, Value::Bool(value)) => Box::new(Some(*value)),
            (ColumnType::Boolean, _) => Box::new(None::<bool>),
            (ColumnType::BigInt, Value::I64(value)) => Box::new(Some(*value)),
            (ColumnType::BigInt, _) => Box::new(None::<i64>),
            (ColumnType::DoublePrecision, Value::F64(value)) => Box::new(Some(*value)),
            (ColumnType::DoublePrecision, Value::I64(value)) => Box::new(Some(*value as f64)),
            (ColumnType::DoublePrecision, _) => Box::new(None::<f64>),
            (ColumnType::Text, value) => Box::new(value_to_text(value)),
        }
    }
}

/// Infers one type per column, `text` for columns holding only nulls or mixed values.
pub fn infer_column_types(row_set: &RowSet) -> Vec<ColumnType> {
    let mut types = vec![None; row_set.columns().len()];
    for row in row_set.rows() {
        for (column_type, value) in types.iter_mut().zip(row.values()) {
            *column_type = ColumnType::widen(*column_type, value);
        }
    }

    types
        .into_iter()
        .map(|column_type| column_type.unwrap_or(ColumnType::Text))
        .collect()
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(value) => Some(value.to_string()),
        Value::I64(value) => Some(value.to_string()),
        Value::F64(value) => Some(value.to_string()),
        Value::String(value) => Some(value.clone()),
    }
}

/// Name of a staging table, unique per replace.
fn staging_table_name() -> String {
    format!("_fullsync_staging_{}", Uuid::new_v4().simple())
}

/// Number of rows sent per `INSERT`, bounded by the batch size and the bind parameter limit.
pub fn rows_per_statement(columns: usize, max_batch_rows: usize) -> usize {
    let max_batch_rows = max_batch_rows.max(1);
    if columns == 0 {
        return max_batch_rows;
    }

    max_batch_rows.min(MAX_BIND_PARAMETERS / columns).max(1)
}

pub fn create_table_statement(
    qualified_table: &str,
    column_names: &[String],
    column_types: &[ColumnType],
) -> String {
    let columns = column_names
        .iter()
        .zip(column_types)
        .map(|(name, column_type)| format!("{} {}", quote_identifier(name), column_type.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {qualified_table} ({columns})")
}

/// Builds `INSERT INTO t (..) VALUES ($1::type, ..), ..` for `rows` rows.
pub fn insert_statement(
    qualified_table: &str,
    column_names: &[String],
    column_types: &[ColumnType],
    rows: usize,
) -> String {
    let columns = column_names
        .iter()
        .map(|name| quote_identifier(name).to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut statement = format!("INSERT INTO {qualified_table} ({columns}) VALUES ");
    let mut parameter = 1;
    for row in 0..rows {
        if row > 0 {
            statement.push_str(", ");
        }

        statement.push('(');
        for (index, column_type) in column_types.iter().enumerate() {
            if index > 0 {
                statement.push_str(", ");
            }
            // Writing into a String never fails.
            let _ = write!(statement, "${parameter}::{}", column_type.as_sql());
            parameter += 1;
        }
        statement.push(')');
    }

    statement
}
