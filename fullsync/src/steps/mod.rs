//! The two steps replicating a table: Extract from the source and Load into the destination.

mod extract;
mod load;

pub use extract::*;
pub use load::*;
