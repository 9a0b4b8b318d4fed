//! Classification of driver errors into [`ErrorKind`]s.
//!
//! The same SQLSTATE means different things on each side: a missing table is a query failure
//! when reading and a write failure when replacing.

use fullsync::error::{ErrorKind, EtlError};
use fullsync::etl_error;
use tokio_postgres::error::SqlState;

/// Side of the replication an error happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    fn connection_kind(self) -> ErrorKind {
        match self {
            Side::Source => ErrorKind::SourceConnectionFailed,
            Side::Destination => ErrorKind::DestinationConnectionFailed,
        }
    }

    fn operation_kind(self) -> ErrorKind {
        match self {
            Side::Source => ErrorKind::SourceQueryFailed,
            Side::Destination => ErrorKind::DestinationWriteFailed,
        }
    }
}

/// Picks the kind and description of `err` when it happened on `side`.
pub fn classify(err: &tokio_postgres::Error, side: Side) -> (ErrorKind, &'static str) {
    if err.is_closed() {
        return (side.connection_kind(), "Postgres connection closed");
    }

    let Some(sqlstate) = err.code() else {
        // Errors without a SQLSTATE come from the client or the socket.
        return (side.connection_kind(), "Postgres connection error");
    };

    match *sqlstate {
        SqlState::CONNECTION_EXCEPTION
        | SqlState::CONNECTION_DOES_NOT_EXIST
        | SqlState::CONNECTION_FAILURE
        | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
        | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION => {
            (side.connection_kind(), "Postgres connection failed")
        }

        SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => {
            (side.connection_kind(), "Postgres authentication failed")
        }

        SqlState::INSUFFICIENT_RESOURCES
        | SqlState::OUT_OF_MEMORY
        | SqlState::TOO_MANY_CONNECTIONS
        | SqlState::ADMIN_SHUTDOWN
        | SqlState::CRASH_SHUTDOWN
        | SqlState::CANNOT_CONNECT_NOW
        | SqlState::IDLE_SESSION_TIMEOUT => (side.connection_kind(), "Postgres server unavailable"),

        SqlState::UNDEFINED_TABLE
        | SqlState::UNDEFINED_COLUMN
        | SqlState::UNDEFINED_SCHEMA
        | SqlState::INVALID_SCHEMA_NAME => (side.operation_kind(), "Postgres object not found"),

        SqlState::INSUFFICIENT_PRIVILEGE => (side.operation_kind(), "Postgres permission denied"),

        SqlState::DATA_EXCEPTION
        | SqlState::INVALID_TEXT_REPRESENTATION
        | SqlState::INVALID_DATETIME_FORMAT
        | SqlState::NUMERIC_VALUE_OUT_OF_RANGE
        | SqlState::CHARACTER_NOT_IN_REPERTOIRE
        | SqlState::UNTRANSLATABLE_CHARACTER => {
            (ErrorKind::ConversionError, "Postgres data conversion failed")
        }

        SqlState::T_R_SERIALIZATION_FAILURE
        | SqlState::T_R_DEADLOCK_DETECTED
        | SqlState::LOCK_NOT_AVAILABLE
        | SqlState::QUERY_CANCELED => (side.operation_kind(), "Postgres statement interrupted"),

        _ => (side.operation_kind(), "Postgres statement failed"),
    }
}

/// Converts an error raised while reading from the source.
#[track_caller]
pub fn source_error(err: tokio_postgres::Error) -> EtlError {
    into_etl_error(err, Side::Source)
}

/// Converts an error raised while writing to the destination.
#[track_caller]
pub fn destination_error(err: tokio_postgres::Error) -> EtlError {
    into_etl_error(err, Side::Destination)
}

/// Converts an error raised while connecting, whatever its SQLSTATE.
#[track_caller]
pub(crate) fn connection_error(err: tokio_postgres::Error, side: Side) -> EtlError {
    etl_error!(
        side.connection_kind(),
        "Postgres connection failed",
        err,
        source: err
    )
}

#[track_caller]
fn into_etl_error(err: tokio_postgres::Error, side: Side) -> EtlError {
    let (kind, description) = classify(&err, side);
    let detail = match err.as_db_error() {
        Some(db_error) => format!("{} ({})", db_error.message(), db_error.code().code()),
        None => err.to_string(),
    };

    etl_error!(kind, description, detail = detail, source: err)
}
