use std::fmt;

use crate::error::{ErrorKind, EtlError};

/// Retry behavior for a classified error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// The step is retried after the configured delay while attempts remain.
    Timed,
    /// The table fails immediately, retrying cannot succeed.
    NoRetry,
}

impl fmt::Display for RetryDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timed => f.write_str("timed_retry"),
            Self::NoRetry => f.write_str("no_retry"),
        }
    }
}

/// How a table worker handles an [`EtlError`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ErrorHandlingPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl ErrorHandlingPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    pub fn should_retry(&self) -> bool {
        self.retry_directive == RetryDirective::Timed
    }

    /// Operator-facing hint logged when the table fails.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }
}

/// Classifies `error`.
///
/// Every step failure is retried with the same policy except the errors for which another
/// attempt would read the same input and fail the same way.
pub fn build_error_handling_policy(error: &EtlError) -> ErrorHandlingPolicy {
    match error.kind() {
        ErrorKind::HandoffMissing => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("The table must be extracted before it is loaded, run the extract step first."),
        ),
        ErrorKind::ConversionError => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("Fix or cast the source value that cannot be converted."),
        ),
        ErrorKind::InvalidData => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("Fix the offending rows in the source table."),
        ),
        ErrorKind::ConfigError => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("Update the replicator configuration."),
        ),

        #[cfg(feature = "failpoints")]
        ErrorKind::WithNoRetry => {
            ErrorHandlingPolicy::new(RetryDirective::NoRetry, Some("Cannot retry this error."))
        }
        #[cfg(feature = "failpoints")]
        ErrorKind::WithTimedRetry => ErrorHandlingPolicy::new(RetryDirective::Timed, None),

        _ => ErrorHandlingPolicy::new(RetryDirective::Timed, None),
    }
}
