//! Metadata catalog emitter library.
//!
//! Turns models, aggregated pipelines and runs into catalog entity snapshots
//! with deterministic URNs and writes them over the catalog's REST API.
//! Writes are staged, retried with exponential backoff and deduplicated per
//! process; a dry run builds the same payloads without sending them.

mod client;
mod emitter;
mod error;
mod policy;
pub mod snapshot;
pub mod transport;
mod urn;

pub use client::{EmissionClient, EmitSettings};
pub use emitter::MetadataEmitter;
pub use error::EmitError;
pub use policy::FailurePolicy;
pub use snapshot::{EntitySnapshot, Properties, Stage};
pub use transport::{CatalogTransport, HttpTransport};
pub use urn::{EntityKind, Urn};
