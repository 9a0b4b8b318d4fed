//! Postgres-wire connectors: a [`source::PgSource`] reading operational tables and a
//! [`destination::PgDestination`] replacing warehouse tables.

mod connect;
pub mod destination;
pub mod error;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod text;
