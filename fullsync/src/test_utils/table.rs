use chrono::NaiveDate;

use crate::source::memory::MemorySource;
use crate::types::{Cell, TableName};

pub fn table_name(name: &str) -> TableName {
    TableName::parse(name).unwrap()
}

/// Columns of [`insert_orders`].
pub const ORDERS_COLUMNS: &[&str] = &["id", "customer", "amount", "created_at"];

/// Registers an `orders` table with three rows and a timestamp column.
pub async fn insert_orders(source: &MemorySource, table: &TableName) {
    let created_at = |day, hour| {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
    };

    let rows = vec![
        vec![
            Cell::I32(1),
            Cell::String("alice".to_string()),
            Cell::F64(12.5),
            Cell::Timestamp(created_at(1, 9)),
        ],
        vec![
            Cell::I32(2),
            Cell::String("bob".to_string()),
            Cell::F64(7.0),
            Cell::Timestamp(created_at(2, 14)),
        ],
        vec![
            Cell::I32(3),
            Cell::Null,
            Cell::F64(99.99),
            Cell::Timestamp(created_at(3, 23)),
        ],
    ];

    source.insert_table(table, ORDERS_COLUMNS, rows).await;
}

/// Registers `table` with `rows` rows of a single `id` column.
pub async fn insert_ids(source: &MemorySource, table: &TableName, rows: i64) {
    let rows = (1..=rows).map(|id| vec![Cell::I64(id)]).collect();
    source.insert_table(table, &["id"], rows).await;
}
