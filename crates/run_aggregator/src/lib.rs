//! Run aggregator crate.
//!
//! Collapses repeated single-call runs into one [`Pipeline`] per
//! `(project, normalized model)` so the catalog tracks pipelines instead of
//! thousands of near-duplicate invocations.
//!
//! Aggregation never fails: every run belongs to exactly one group and every
//! metric it reads has a zero default.

use std::collections::BTreeMap;

use llm_structs::{
    JsonMap, Pipeline, PipelineMetadata, RepresentativeRun, Run, family_of, normalize_name,
    provider_of,
};
use serde_json::json;
use uuid::Uuid;

pub mod stats;

pub use stats::{MetricHistory, MetricSummary, ModelStats, RunStats, TrendBucket};

/// Returns the group key of a run: `<project>_<normalized model name>`.
///
/// The model name comes from the run's execution metadata, which is where
/// platform records carry it, not from the run's `model` field.
#[must_use]
pub fn group_key(run: &Run) -> String {
    format!("{}_{}", run.project(), normalize_name(run.model_name()))
}

/// Groups runs by [`group_key`] and summarizes each group as a pipeline.
///
/// Output is ordered by `latest_run_time`, most recent first; pipelines with
/// the same latest time are ordered by name.
#[must_use]
pub fn aggregate(runs: &[Run]) -> Vec<Pipeline> {
    let mut groups: BTreeMap<String, Vec<&Run>> = BTreeMap::new();
    for run in runs {
        groups.entry(group_key(run)).or_default().push(run);
    }

    let mut pipelines: Vec<Pipeline> = groups
        .into_iter()
        .filter_map(|(key, members)| summarize(key, &members))
        .collect();

    pipelines.sort_by(|a, b| {
        b.metadata
            .latest_run_time
            .cmp(&a.metadata.latest_run_time)
            .then_with(|| a.name.cmp(&b.name))
    });

    pipelines
}

/// Builds the pipeline a single run would aggregate into.
#[must_use]
pub fn pipeline_for_run(run: &Run) -> Pipeline {
    let key = group_key(run);
    summarize(key, &[run]).unwrap_or_else(|| unreachable!("a one-run group is never empty"))
}

/// Selects the most recently started run; ties keep the earliest in input order.
fn representative<'a>(members: &[&'a Run]) -> Option<&'a Run> {
    let mut latest: Option<&Run> = None;
    for &run in members {
        if latest.is_none_or(|current| run.start_time > current.start_time) {
            latest = Some(run);
        }
    }
    latest
}

#[expect(
    clippy::cast_precision_loss,
    reason = "group sizes are far below 2^52"
)]
fn summarize(key: String, members: &[&Run]) -> Option<Pipeline> {
    let latest = representative(members)?;
    let first_run_time = members.iter().map(|run| run.start_time).min()?;
    let latest_run_time = latest.start_time;

    let total_runs = members.len();
    let total_tokens = members
        .iter()
        .fold(0_u64, |sum, run| sum.saturating_add(run.total_tokens()));
    let total_cost: f64 = members.iter().map(|run| run.metrics.cost).sum();
    let total_latency: f64 = members.iter().map(|run| run.metrics.latency).sum();
    let failures = members.iter().filter(|run| run.has_error()).count();

    let avg_latency = total_latency / total_runs as f64;
    let error_rate = failures as f64 / total_runs as f64;

    let project = latest.project().to_string();
    let model_name = normalize_name(latest.model_name());
    let provider = provider_of(&model_name);

    let mut components: Vec<String> = Vec::new();
    for run_type in members.iter().filter_map(|run| run.run_type()) {
        if !components.iter().any(|known| known == run_type) {
            components.push(run_type.to_string());
        }
    }

    let mut config = JsonMap::new();
    config.insert("project".to_string(), json!(project));
    config.insert("model_name".to_string(), json!(model_name));
    config.insert("provider".to_string(), json!(provider));
    config.insert("model_family".to_string(), json!(family_of(&model_name)));

    Some(Pipeline {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
        name: key,
        components,
        config,
        metadata: PipelineMetadata {
            project,
            model_name,
            provider,
            total_runs,
            total_tokens,
            total_cost,
            avg_latency,
            error_rate,
            success_rate: 1.0 - error_rate,
            first_run_time,
            latest_run_time,
            latest_run: RepresentativeRun {
                id: latest.id.clone(),
                start_time: latest.start_time,
                end_time: latest.end_time,
                inputs: latest.inputs.clone(),
                outputs: latest.outputs.clone(),
            },
        },
    })
}
