//! CLI command implementations.

pub mod ingest;
pub mod show;
