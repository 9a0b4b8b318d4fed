//! Conversions between source representations and transport-safe [`crate::types::Value`]s.

pub mod bool;
pub mod hex;
pub mod temporal;
mod value;
