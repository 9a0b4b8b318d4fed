//! Scheduled full-load replication of a table registry.
//!
//! A [`pipeline::Pipeline`] runs one worker per table. Each worker extracts the whole table from a
//! [`source::Source`] into a [`handoff::HandoffStore`] slot, then replaces the table of the same
//! name under the target schema of a [`destination::Destination`]. Both steps are retried on
//! their own and a failing table never affects the others.
//!
//! ```ignore
//! let pipeline = Pipeline::new(config, source, destination, MemoryHandoffStore::new())?;
//! let report = pipeline.run().await?;
//! for table in report.failed_tables() {
//!     println!("{} failed: {}", table.table, table.phase);
//! }
//! ```

pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod handoff;
mod macros;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod steps;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
