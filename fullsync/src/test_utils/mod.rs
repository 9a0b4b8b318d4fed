//! Helpers for testing pipelines against in-memory connectors.
//!
//! [`faults`] wraps any source or destination to inject failures and delays and to record when
//! each attempt happened, [`pipeline`] builds configurations and pipelines with test defaults,
//! and [`table`] holds reusable table fixtures.

pub mod faults;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod pipeline;
pub mod table;
