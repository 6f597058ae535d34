//! LLM metadata catalog ingestion.
//!
//! Collects LLM runs from an observability platform, aggregates them into
//! pipelines and publishes models, pipelines and their lineage to a metadata
//! catalog.

pub mod artifacts;
pub mod commands;

pub use artifacts::ArtifactBuffer;
