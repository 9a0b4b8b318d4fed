//! Data types flowing through a replication run.
//!
//! [`Cell`] is what a source connector reads, [`Value`] is the transport-safe scalar stored in a
//! [`RowSet`] and handed to the loader.

mod cell;
mod row_set;
mod table;
mod value;

pub use cell::*;
pub use row_set::*;
pub use table::*;
pub use value::*;
