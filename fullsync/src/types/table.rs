use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};

/// Name of one replicated table, optionally qualified by its source schema.
///
/// The target always uses the unqualified [`TableName::name`] under the configured target schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    /// Parses `table` or `schema.table`.
    pub fn parse(value: &str) -> EtlResult<Self> {
        let mut parts = value.split('.');
        let (schema, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (None, name),
            (Some(schema), Some(name), None) => (Some(schema), name),
            _ => bail!(
                ErrorKind::ConfigError,
                "Invalid table name",
                format!("`{value}` has more than two name parts")
            ),
        };

        if name.is_empty() || schema.is_some_and(str::is_empty) {
            bail!(
                ErrorKind::ConfigError,
                "Invalid table name",
                format!("`{value}` has an empty name part")
            );
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        })
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Unqualified table name, also used as the target table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier safe to embed in SQL, each part quoted when needed.
    pub fn as_quoted_identifier(&self) -> String {
        let name = pg_escape::quote_identifier(&self.name);
        match &self.schema {
            Some(schema) => format!("{}.{name}", pg_escape::quote_identifier(schema)),
            None => name.into_owned(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl TryFrom<String> for TableName {
    type Error = EtlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.to_string()
    }
}

/// Ordered, duplicate free list of the tables replicated by a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRegistry {
    tables: Vec<TableName>,
}

impl TableRegistry {
    pub fn new(tables: Vec<TableName>) -> EtlResult<Self> {
        if tables.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Empty table registry",
                "At least one table must be configured for replication"
            );
        }

        let mut seen = HashSet::with_capacity(tables.len());
        let mut targets = HashMap::with_capacity(tables.len());
        for table in &tables {
            if !seen.insert(table) {
                bail!(
                    ErrorKind::ConfigError,
                    "Duplicate table in registry",
                    format!("Table `{table}` is listed more than once")
                );
            }

            if let Some(previous) = targets.insert(table.name(), table) {
                bail!(
                    ErrorKind::ConfigError,
                    "Duplicate target table in registry",
                    format!(
                        "Tables `{previous}` and `{table}` would both replace target table `{}`",
                        table.name()
                    )
                );
            }
        }

        Ok(Self { tables })
    }

    /// Parses every name and builds the registry.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> EtlResult<Self> {
        let tables = names
            .iter()
            .map(|name| TableName::parse(name.as_ref()))
            .collect::<EtlResult<Vec<_>>>()?;

        Self::new(tables)
    }

    pub fn tables(&self) -> &[TableName] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableName> {
        self.tables.iter()
    }
}
