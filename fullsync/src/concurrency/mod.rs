//! Coordination primitives shared by the pipeline and its table workers.

pub mod shutdown;
pub mod signal;
