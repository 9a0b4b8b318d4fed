//! Named fault injection points, activated from tests through the `fail` crate.

use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Evaluated after the source query succeeded and before the handoff slot is written.
pub const EXTRACT__BEFORE_HANDOFF_PUT: &str = "extract.before_handoff_put";

/// Evaluated after the destination connection is open and before the table is replaced.
pub const LOAD__BEFORE_REPLACE: &str = "load.before_replace";

/// Returns an error when the fail point `name` is configured with `return`.
///
/// The optional parameter selects the retry behavior of the error: `no_retry` (the default) or
/// `timed_retry`.
pub fn etl_fail_point(name: &str) -> EtlResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("timed_retry") => ErrorKind::WithTimedRetry,
            _ => ErrorKind::WithNoRetry,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
