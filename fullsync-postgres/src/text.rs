//! Parsing of Postgres text-format values into [`Cell`]s.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use fullsync::conversions::bool::parse_bool;
use fullsync::conversions::hex::from_bytea_hex;
use fullsync::conversions::temporal::{
    DATE_FORMAT, TIME_FORMAT, TIMESTAMP_FORMAT, TIMESTAMPTZ_FORMAT_HH_MM, TIMESTAMPTZ_FORMAT_HHMM,
};
use fullsync::error::{ErrorKind, EtlResult};
use fullsync::etl_error;
use fullsync::types::Cell;
use tokio_postgres::types::Type;
use uuid::Uuid;

/// Converts the text rendering of a column value, as returned by the simple query protocol.
///
/// Sessions use the `ISO` datestyle and `UTC` timezone, which the temporal formats rely on. Types
/// without a dedicated [`Cell`], arrays included, are kept as their text.
pub struct TextFormatConverter;

impl TextFormatConverter {
    pub fn try_from_str(typ: &Type, value: &str) -> EtlResult<Cell> {
        let cell = match *typ {
            Type::BOOL => Cell::Bool(parse_bool(value)?),
            Type::CHAR | Type::BPCHAR | Type::VARCHAR | Type::NAME | Type::TEXT => {
                Cell::String(value.to_string())
            }
            Type::INT2 => Cell::I16(value.parse()?),
            Type::INT4 => Cell::I32(value.parse()?),
            Type::INT8 => Cell::I64(value.parse()?),
            Type::OID => Cell::I64(value.parse()?),
            Type::FLOAT4 => Cell::F32(value.parse()?),
            Type::FLOAT8 => Cell::F64(value.parse()?),
            Type::NUMERIC => Cell::Numeric(value.to_string()),
            Type::BYTEA => Cell::Bytes(from_bytea_hex(value)?),
            Type::UUID => Cell::Uuid(Uuid::parse_str(value)?),
            Type::JSON | Type::JSONB => Cell::Json(serde_json::from_str(value).map_err(|err| {
                etl_error!(
                    ErrorKind::ConversionError,
                    "Invalid json value",
                    err,
                    source: err
                )
            })?),
            Type::DATE | Type::TIME | Type::TIMESTAMP | Type::TIMESTAMPTZ
                if is_special_temporal(value) =>
            {
                Cell::String(value.to_string())
            }
            Type::DATE => Cell::Date(NaiveDate::parse_from_str(value, DATE_FORMAT)?),
            Type::TIME => Cell::Time(NaiveTime::parse_from_str(value, TIME_FORMAT)?),
            Type::TIMESTAMP => {
                Cell::Timestamp(NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)?)
            }
            Type::TIMESTAMPTZ => Cell::TimestampTz(parse_timestamptz(value)?),
            _ => Cell::String(value.to_string()),
        };

        Ok(cell)
    }
}

/// Values Postgres renders for dates outside the representable range of ISO strings.
fn is_special_temporal(value: &str) -> bool {
    matches!(value, "infinity" | "-infinity") || value.ends_with(" BC")
}

fn parse_timestamptz(value: &str) -> EtlResult<DateTime<Utc>> {
    let parsed = match DateTime::<FixedOffset>::parse_from_str(value, TIMESTAMPTZ_FORMAT_HHMM) {
        Ok(parsed) => parsed,
        Err(_) => DateTime::<FixedOffset>::parse_from_str(value, TIMESTAMPTZ_FORMAT_HH_MM)?,
    };

    Ok(parsed.with_timezone(&Utc))
}
