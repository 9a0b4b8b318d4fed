use std::fmt::Write;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Renders bytes in the Postgres bytea hex format, `\x` followed by two lowercase digits per byte.
pub fn to_bytea_hex(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(2 + bytes.len() * 2);
    result.push_str("\\x");
    for byte in bytes {
        // Writing to a `String` cannot fail.
        let _ = write!(result, "{byte:02x}");
    }

    result
}

/// Parses the Postgres bytea hex format produced by [`to_bytea_hex`].
pub fn from_bytea_hex(value: &str) -> EtlResult<Vec<u8>> {
    let Some(digits) = value.strip_prefix("\\x") else {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert from bytea hex string to byte array",
            "The prefix '\\x' is missing"
        );
    };

    if digits.len() % 2 != 0 {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert from bytea hex string to byte array",
            "The number of digits is odd"
        );
    }

    let mut result = Vec::with_capacity(digits.len() / 2);
    for i in (0..digits.len()).step_by(2) {
        let Some(pair) = digits.get(i..i + 2) else {
            bail!(
                ErrorKind::ConversionError,
                "Could not convert from bytea hex string to byte array",
                "The string contains non ASCII characters"
            );
        };
        result.push(u8::from_str_radix(pair, 16)?);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_parses_hex() {
        assert_eq!(to_bytea_hex(b"Hello"), "\\x48656c6c6f");
        assert_eq!(to_bytea_hex(&[]), "\\x");
        assert_eq!(from_bytea_hex("\\x48656C6c6f").unwrap(), b"Hello");
    }

    #[test]
    fn rejects_malformed_hex() {
        for input in ["48656c", "\\x123", "\\xzz", "\\xé1"] {
            assert_eq!(
                from_bytea_hex(input).unwrap_err().kind(),
                ErrorKind::ConversionError,
                "{input}"
            );
        }
    }
}
