use crate::conversions::hex::to_bytea_hex;
use crate::conversions::temporal::{format_date, format_time, format_timestamp, format_timestamptz};
use crate::types::{Cell, Value};

/// Normalizes a source cell into a transport-safe value.
///
/// Integers and floats are widened, temporal values are rendered as ISO-8601 strings and the
/// remaining types use their canonical text form.
impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Null => Value::Null,
            Cell::Bool(value) => Value::Bool(value),
            Cell::I16(value) => Value::I64(value.into()),
            Cell::I32(value) => Value::I64(value.into()),
            Cell::I64(value) => Value::I64(value),
            Cell::F32(value) => Value::F64(value.into()),
            Cell::F64(value) => Value::F64(value),
            Cell::Numeric(value) | Cell::String(value) => Value::String(value),
            Cell::Bytes(value) => Value::String(to_bytea_hex(&value)),
            Cell::Json(value) => Value::String(value.to_string()),
            Cell::Uuid(value) => Value::String(value.to_string()),
            Cell::Date(value) => Value::String(format_date(&value)),
            Cell::Time(value) => Value::String(format_time(&value)),
            Cell::Timestamp(value) => Value::String(format_timestamp(&value)),
            Cell::TimestampTz(value) => Value::String(format_timestamptz(&value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn temporal_cells_become_strings() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let cells = [
            Cell::Date(date),
            Cell::Time(date.and_hms_opt(8, 0, 0).unwrap().time()),
            Cell::Timestamp(date.and_hms_opt(8, 0, 0).unwrap()),
            Cell::TimestampTz(Utc.with_ymd_and_hms(2023, 3, 1, 8, 0, 0).unwrap()),
        ];

        let values: Vec<Value> = cells.into_iter().map(Value::from).collect();
        assert_eq!(
            values,
            vec![
                Value::from("2023-03-01"),
                Value::from("08:00:00"),
                Value::from("2023-03-01T08:00:00"),
                Value::from("2023-03-01T08:00:00Z"),
            ]
        );
    }

    #[test]
    fn scalars_are_widened() {
        assert_eq!(Value::from(Cell::I16(-3)), Value::I64(-3));
        assert_eq!(Value::from(Cell::F32(0.5)), Value::F64(0.5));
        assert_eq!(
            Value::from(Cell::Numeric("12345.6789".into())),
            Value::from("12345.6789")
        );
        assert_eq!(Value::from(Cell::Bytes(vec![0xde, 0xad])), Value::from("\\xdead"));
        assert_eq!(
            Value::from(Cell::Json(serde_json::json!({"a": 1}))),
            Value::from(r#"{"a":1}"#)
        );
        assert_eq!(
            Value::from(Cell::Uuid(Uuid::nil())),
            Value::from("00000000-0000-0000-0000-000000000000")
        );
    }
}
