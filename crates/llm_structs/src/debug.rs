use core::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Kinds of debug artifact a pipeline stage can hand to a [`DebugSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// Raw platform records, as collected.
    RawRecords,
    /// Entity snapshots, as they would be sent to the catalog.
    Snapshots,
}

impl Artifact {
    /// File an artifact stream is dumped to.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::RawRecords => "langsmith_api_output.jsonl",
            Self::Snapshots => "mce_output.jsonl",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RawRecords => "raw_records",
            Self::Snapshots => "snapshots",
        })
    }
}

/// Callback receiving every debug artifact document.
///
/// Stages never write files themselves; the caller decides where documents go.
pub type DebugSink = Arc<dyn Fn(Artifact, &Value) + Send + Sync>;
