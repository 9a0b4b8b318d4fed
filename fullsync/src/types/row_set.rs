use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::types::Value;

/// One row of a [`RowSet`], values in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRow {
    values: Vec<Value>,
}

impl TableRow {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Every row of one table, as extracted from the source.
///
/// Column names are stored once and every row has exactly one value per column; construction
/// fails otherwise. A row set may have no columns and no rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRowSet")]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

#[derive(Deserialize)]
struct RawRowSet {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl TryFrom<RawRowSet> for RowSet {
    type Error = EtlError;

    fn try_from(raw: RawRowSet) -> Result<Self, Self::Error> {
        RowSet::try_new(raw.columns, raw.rows)
    }
}

impl RowSet {
    pub fn try_new(columns: Vec<String>, rows: Vec<TableRow>) -> EtlResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                bail!(
                    ErrorKind::InvalidData,
                    "Duplicate column in row set",
                    format!("Column `{column}` appears more than once")
                );
            }
        }

        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.values.len() != columns.len())
        {
            bail!(
                ErrorKind::InvalidData,
                "Row does not match the row set columns",
                format!(
                    "Row {index} has {} values but the row set has {} columns",
                    row.values.len(),
                    columns.len()
                )
            );
        }

        Ok(Self { columns, rows })
    }

    /// A row set with neither columns nor rows.
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Iterates over the rows as name addressable records.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|row| Record {
            row_set: self,
            row,
        })
    }

    /// Values of one column across every row, in row order.
    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Value>> {
        let index = self.column_index(column)?;
        Some(self.rows.iter().map(move |row| &row.values[index]))
    }
}

/// A row of a [`RowSet`] addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    row_set: &'a RowSet,
    row: &'a TableRow,
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let index = self.row_set.column_index(column)?;
        self.row.values.get(index)
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.row_set
            .columns
            .iter()
            .map(String::as_str)
            .zip(self.row.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn rejects_rows_with_a_different_arity() {
        let err = RowSet::try_new(
            columns(&["id", "nome"]),
            vec![
                TableRow::new(vec![Value::I64(1), "Ana".into()]),
                TableRow::new(vec![Value::I64(2)]),
            ],
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(
            err.detail(),
            Some("Row 1 has 1 values but the row set has 2 columns")
        );
    }

    #[test]
    fn records_look_up_values_by_name() {
        let row_set = RowSet::try_new(
            columns(&["id", "nome"]),
            vec![TableRow::new(vec![Value::I64(7), "Bruno".into()])],
        )
        .unwrap();

        let record = row_set.records().next().unwrap();
        assert_eq!(record.get("nome"), Some(&Value::from("Bruno")));
        assert_eq!(record.get("missing"), None);
        assert_eq!(
            record.iter().map(|(c, _)| c).collect::<Vec<_>>(),
            vec!["id", "nome"]
        );
    }

    #[test]
    fn deserialization_validates_arity() {
        let ok: RowSet =
            serde_json::from_str(r#"{"columns":["a"],"rows":[[1],[null]]}"#).unwrap();
        assert_eq!(ok.len(), 2);

        let bad = serde_json::from_str::<RowSet>(r#"{"columns":["a"],"rows":[[1, 2]]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn empty_row_set_has_no_columns() {
        let empty = RowSet::empty();
        assert!(empty.is_empty());
        assert!(empty.columns().is_empty());
    }
}
