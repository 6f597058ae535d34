//! LLM run collector library.
//!
//! Pulls raw run records from an observability platform (`LangSmith`) for a
//! time window and maps them into [`Run`](llm_structs::Run)s, or assembles
//! runs from in-process callback events.

pub mod api;
mod collector;
mod connector;
pub mod observer;

pub use api::client::LangSmithClient;
pub use collector::{RunCollector, distinct_models};
pub use connector::{CollectError, PlatformConnector};
pub use observer::{EventAssembler, RunEvent, RunObserver};
