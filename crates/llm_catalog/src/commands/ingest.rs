//! Ingest command - publishes models, pipelines and runs to the catalog.

use anyhow::{Context, Result};
use catalog_emitter::{
    CatalogTransport, EmissionClient, EmitError, EmitSettings, FailurePolicy, HttpTransport,
    MetadataEmitter, Urn,
};
use chrono::{DateTime, TimeDelta, Utc};
use config::Config;
use lineage_tracker::LineageGraph;
use llm_structs::EdgeType;
use run_aggregator::{MetricHistory, MetricSummary, ModelStats, RunStats, TrendBucket, aggregate};
use run_collector::{LangSmithClient, PlatformConnector, RunCollector, distinct_models};
use tracing::info;

use crate::artifacts::ArtifactBuffer;

/// What one ingest pass covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub project: String,
    pub window_days: u32,
    pub limit: usize,
    pub batch_size: usize,
    /// Also emit every run as its own dataset entity.
    pub raw_runs: bool,
    pub policy: FailurePolicy,
}

impl IngestOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            project: config.langchain_project.clone(),
            window_days: config.window_days,
            limit: config.limit,
            batch_size: config.batch_size,
            raw_runs: false,
            policy: FailurePolicy::from_hard_fail(config.hard_fail),
        }
    }
}

/// Outcome of an ingest pass.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub models_emitted: usize,
    pub pipelines_emitted: usize,
    pub runs_emitted: usize,
    pub edges_emitted: usize,
    /// Emissions that failed under the soft policy.
    pub failed: usize,
    /// URNs of every emitted entity, in emission order.
    pub urns: Vec<String>,
    pub lineage: LineageGraph,
    pub run_stats: RunStats,
    pub model_stats: ModelStats,
    /// Latency of the collected runs, in seconds.
    pub latency: MetricSummary,
    pub latency_trend: Vec<TrendBucket>,
}

impl IngestSummary {
    /// Settles an entity emission and returns its URN if it was written.
    fn entity(
        &mut self,
        policy: FailurePolicy,
        result: Result<Urn, EmitError>,
        what: &str,
    ) -> Result<Option<Urn>, EmitError> {
        let urn = result.as_ref().ok().cloned();
        let settled = policy.settle(result, what)?;

        if settled.is_empty() {
            self.failed += 1;
        } else {
            self.urns.push(settled);
        }

        Ok(urn)
    }

    fn edge(
        &mut self,
        policy: FailurePolicy,
        result: Result<(), EmitError>,
        what: &str,
    ) -> Result<(), EmitError> {
        if policy.settle_unit(result, what)? {
            self.edges_emitted += 1;
        } else {
            self.failed += 1;
        }
        Ok(())
    }
}

/// Runs the ingest command against the configured platform and catalog.
///
/// # Errors
///
/// Returns an error if the clients cannot be created, an emission fails under
/// the hard-fail policy, or the debug artifacts cannot be written.
pub async fn execute(config: &Config, options: &IngestOptions) -> Result<IngestSummary> {
    let api_key = config
        .langsmith_api_key
        .as_deref()
        .context("LANGSMITH_API_KEY environment variable not set")?;

    let buffer = ArtifactBuffer::new();

    let connector = LangSmithClient::new(&config.langchain_endpoint, api_key)
        .context("Failed to create LangSmith client")?;
    let collector = RunCollector::new(connector).with_debug_sink(buffer.sink());

    let transport = HttpTransport::new(&config.gms_url, config.token.as_deref())
        .context("Failed to create catalog transport")?;
    let settings = EmitSettings {
        max_retries: config.max_retries,
        retry_delay: config.retry_delay,
        stage_delay: config.stage_delay,
        dry_run: config.dry_run,
    };
    let client = EmissionClient::new(transport, settings).with_debug_sink(buffer.sink());
    let mut emitter = MetadataEmitter::new(client, &config.platform, &config.env);

    info!(
        gms_url = %config.gms_url,
        project = %options.project,
        dry_run = config.dry_run,
        "Starting ingest"
    );

    let summary = run(&collector, &mut emitter, options, Utc::now()).await?;

    if let Some(dir) = &config.debug_dir {
        let store = config::local_store(dir)?;
        buffer.flush(store.as_ref()).await?;
    }

    Ok(summary)
}

/// Collects runs up to `now`, aggregates them and emits everything.
///
/// # Errors
///
/// Returns the first emission error under [`FailurePolicy::Hard`].
pub async fn run<C, T>(
    collector: &RunCollector<C>,
    emitter: &mut MetadataEmitter<T>,
    options: &IngestOptions,
    now: DateTime<Utc>,
) -> Result<IngestSummary>
where
    C: PlatformConnector,
    T: CatalogTransport,
{
    let policy = options.policy;
    let mut summary = IngestSummary::default();

    let start = now - TimeDelta::days(i64::from(options.window_days));
    let runs = collector
        .collect(&options.project, start, Some(now), options.limit)
        .await;

    let models = distinct_models(&runs);
    info!(runs = runs.len(), models = models.len(), "Collected");

    for model in &models {
        let result = emitter.emit_model(model).await;
        if summary
            .entity(policy, result, &model.qualified_name())
            .context("Failed to emit model")?
            .is_some()
        {
            summary.models_emitted += 1;
        }
    }

    let pipelines = aggregate(&runs);
    let batch_count = pipelines.len().div_ceil(options.batch_size.max(1));

    for (index, batch) in pipelines.chunks(options.batch_size.max(1)).enumerate() {
        info!(batch = index + 1, of = batch_count, pipelines = batch.len(), "Emitting batch");

        for pipeline in batch {
            let result = emitter.emit_chain(pipeline).await;
            let Some(pipeline_urn) = summary
                .entity(policy, result, &pipeline.name)
                .context("Failed to emit pipeline")?
            else {
                continue;
            };
            summary.pipelines_emitted += 1;

            let linked = match emitter.pipeline_model_urn(pipeline) {
                Ok(model_urn) => {
                    emitter
                        .emit_lineage(&pipeline_urn, &model_urn, EdgeType::Uses)
                        .await
                }
                Err(e) => Err(e),
            };
            summary
                .edge(policy, linked, &pipeline.name)
                .context("Failed to emit pipeline lineage")?;
        }
    }

    if options.raw_runs {
        for run in &runs {
            let result = emitter.emit_raw_run(run).await;
            if summary
                .entity(policy, result, &run.id)
                .context("Failed to emit run")?
                .is_some()
            {
                summary.runs_emitted += 1;
            }
        }
    }

    summary.lineage = emitter.lineage().graph();
    summary.run_stats = RunStats::from_runs(&runs);
    summary.model_stats = ModelStats::from_models(&models);

    let mut history = MetricHistory::new();
    for run in &runs {
        history.record_run(run);
    }
    summary.latency = history.summary("latency", None);
    summary.latency_trend = history.hourly_trend("latency");

    info!(
        models = summary.models_emitted,
        pipelines = summary.pipelines_emitted,
        runs = summary.runs_emitted,
        edges = summary.edges_emitted,
        failed = summary.failed,
        "Ingest complete"
    );

    Ok(summary)
}

/// Prints the statistics of an ingest pass.
pub fn print_summary(summary: &IngestSummary) {
    let runs = &summary.run_stats;
    let models = &summary.model_stats;

    println!("\nIngest Summary");
    println!("==============");
    println!("  Models emitted:    {}", summary.models_emitted);
    println!("  Pipelines emitted: {}", summary.pipelines_emitted);
    println!("  Runs emitted:      {}", summary.runs_emitted);
    println!("  Lineage edges:     {}", summary.lineage.edges.len());
    println!("  Failed emissions:  {}", summary.failed);

    println!("\nRun Statistics");
    println!("  Total runs:      {}", runs.total_runs);
    println!("  Success rate:    {:.1}%", runs.success_rate * 100.0);
    println!("  Average latency: {:.3}s", runs.average_latency);
    println!("  Total cost:      ${:.4}", runs.total_cost);
    for (error, count) in &runs.error_distribution {
        println!("    {error}: {count}");
    }

    let latency = &summary.latency;
    println!("\nLatency");
    println!(
        "  mean {:.3}s, median {:.3}s, min {:.3}s, max {:.3}s, stddev {:.3}s",
        latency.mean, latency.median, latency.min, latency.max, latency.stddev
    );
    for bucket in &summary.latency_trend {
        println!(
            "    {}  {:.3}s over {} runs",
            bucket.interval_start.format("%Y-%m-%d %H:00"),
            bucket.mean,
            bucket.count
        );
    }

    println!("\nModel Statistics");
    println!("  Total models: {}", models.total_models);
    for (provider, count) in &models.by_provider {
        println!("    {provider}: {count}");
    }
    for (capability, count) in &models.by_capability {
        println!("    [{capability}] {count}");
    }
}
