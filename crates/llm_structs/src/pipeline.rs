use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::JsonMap;

/// An aggregated, named grouping of runs sharing a project and model.
///
/// Pipelines are re-derived from the current batch of runs on every pass and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    /// Stable id derived from the group key.
    pub id: String,
    /// The group key, `<project>_<normalized model>`.
    pub name: String,
    /// Distinct run types seen in the group, in first-seen order.
    pub components: Vec<String>,
    pub config: JsonMap,
    pub metadata: PipelineMetadata,
}

/// Rollup statistics and the representative run of a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetadata {
    pub project: String,
    pub model_name: String,
    pub provider: String,
    pub total_runs: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub avg_latency: f64,
    pub error_rate: f64,
    pub success_rate: f64,
    pub first_run_time: DateTime<Utc>,
    pub latest_run_time: DateTime<Utc>,
    pub latest_run: RepresentativeRun,
}

/// The most recently started run of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepresentativeRun {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub inputs: JsonMap,
    pub outputs: JsonMap,
}
