//! Shorthands for building and returning [`crate::error::EtlError`]s.

/// Builds an [`crate::error::EtlError`].
///
/// Accepts a kind and a static description, then optionally a dynamic detail (anything
/// implementing [`ToString`], or `detail = <owned String>` to avoid a copy) and a `source:`.
///
/// ```ignore
/// etl_error!(ErrorKind::SourceQueryFailed, "Query failed", table_name);
/// etl_error!(ErrorKind::HandoffIoError, "Write failed", detail = message, source: err);
/// ```
#[macro_export]
macro_rules! etl_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::EtlError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::etl_error!($kind, $desc).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::EtlError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::etl_error!($kind, $desc, detail = $detail).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::EtlError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::etl_error!($kind, $desc, $detail).with_source($source)
    };
}

/// Returns early with an [`crate::error::EtlError`] built by [`etl_error!`] from the same
/// arguments.
#[macro_export]
macro_rules! bail {
    ($($args:tt)+) => {
        return ::core::result::Result::Err($crate::etl_error!($($args)+))
    };
}
