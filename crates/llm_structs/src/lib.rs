//! Common entity types for LLM run metadata shared across crates.
//!
//! Models, runs, aggregated pipelines and lineage edges are plain values: they
//! validate on construction and carry no behavior beyond that. Model names are
//! canonicalized by the [`normalize`] rules before they reach any URN.

mod debug;
mod lineage;
mod model;
pub mod normalize;
mod pipeline;
mod run;

pub use debug::*;
pub use lineage::*;
pub use model::*;
pub use normalize::{capabilities_of, family_of, normalize_name, provider_of};
pub use pipeline::*;
pub use run::*;

/// Free-form JSON object used for inputs, outputs, parameters and metadata.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
