//! Table workers: one task per table running Extract then Load with retries.

pub mod policy;
pub mod pool;
pub mod table;
