//! Observable state of tables and runs.

pub mod run;
pub mod table;
