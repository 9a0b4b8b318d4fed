use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Parses a Postgres boolean in text format, `t` or `f`.
pub fn parse_bool(s: &str) -> EtlResult<bool> {
    match s {
        "t" => Ok(true),
        "f" => Ok(false),
        _ => bail!(
            ErrorKind::InvalidData,
            "Invalid boolean value",
            format!("Boolean value must be 't' or 'f' (received: {s})")
        ),
    }
}
