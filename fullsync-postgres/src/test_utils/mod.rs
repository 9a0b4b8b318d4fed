//! Helpers for testing the connectors against a live Postgres server.

pub mod database;
