use lineage_tracker::LineageTracker;
use llm_structs::{EdgeType, Model, Pipeline, Run};
use run_aggregator::pipeline_for_run;
use tracing::info;

use crate::client::EmissionClient;
use crate::snapshot::{EntitySnapshot, Properties};
use crate::transport::CatalogTransport;
use crate::{EmitError, EntityKind, Urn};

/// Maps models, pipelines and runs onto catalog snapshots and URNs.
///
/// Every method returns the raw emission result; whether a failure aborts
/// the batch is decided by the caller's [`FailurePolicy`](crate::FailurePolicy).
pub struct MetadataEmitter<T> {
    client: EmissionClient<T>,
    platform: String,
    env: String,
    lineage: LineageTracker,
}

impl<T: CatalogTransport> MetadataEmitter<T> {
    #[must_use]
    pub fn new(client: EmissionClient<T>, platform: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            client,
            platform: platform.into(),
            env: env.into(),
            lineage: LineageTracker::new(),
        }
    }

    /// Continues a lineage record from an earlier pass.
    #[must_use]
    pub fn with_lineage(mut self, lineage: LineageTracker) -> Self {
        self.lineage = lineage;
        self
    }

    #[must_use]
    pub const fn client(&self) -> &EmissionClient<T> {
        &self.client
    }

    /// Edges emitted so far.
    #[must_use]
    pub const fn lineage(&self) -> &LineageTracker {
        &self.lineage
    }

    /// URN of an entity on this emitter's platform and environment.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::InvalidUrn`] if the name cannot be part of a URN.
    pub fn urn(&self, kind: EntityKind, name: &str) -> Result<Urn, EmitError> {
        Urn::new(kind, &self.platform, name, &self.env)
    }

    /// URN of the model a pipeline runs on.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::InvalidUrn`] if the model name cannot be part of a URN.
    pub fn pipeline_model_urn(&self, pipeline: &Pipeline) -> Result<Urn, EmitError> {
        let name = format!(
            "{}/{}",
            pipeline.metadata.provider, pipeline.metadata.model_name
        );
        self.urn(EntityKind::MlModel, &name)
    }

    /// Emits a model as `mlModel` `<provider>/<name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URN is invalid or the write fails.
    pub async fn emit_model(&mut self, model: &Model) -> Result<Urn, EmitError> {
        let urn = self.urn(EntityKind::MlModel, &model.qualified_name())?;

        let properties = Properties::new(
            model.qualified_name(),
            format!("{} {} Language Model", model.provider(), model.name()),
        )
        .with("provider", model.provider())
        .with("model_family", model.family())
        .with("capabilities", serde_json::to_string(model.capabilities())?)
        .with("parameters", serde_json::to_string(model.parameters())?)
        .with("metadata", serde_json::to_string(model.metadata())?);

        self.client
            .emit(&EntitySnapshot::entity(urn, &properties))
            .await
    }

    /// Emits an aggregated pipeline as `mlModel` named after its group key.
    ///
    /// # Errors
    ///
    /// Returns an error if the URN is invalid or the write fails.
    pub async fn emit_chain(&mut self, pipeline: &Pipeline) -> Result<Urn, EmitError> {
        let urn = self.urn(EntityKind::MlModel, &pipeline.name)?;
        let meta = &pipeline.metadata;

        let properties = Properties::new(&pipeline.name, format!("LLM pipeline {}", pipeline.name))
            .with("pipeline_id", &pipeline.id)
            .with("project", &meta.project)
            .with("model_name", &meta.model_name)
            .with("provider", &meta.provider)
            .with("components", serde_json::to_string(&pipeline.components)?)
            .with("config", serde_json::to_string(&pipeline.config)?)
            .with("total_runs", meta.total_runs)
            .with("total_tokens", meta.total_tokens)
            .with("total_cost", meta.total_cost)
            .with("avg_latency", meta.avg_latency)
            .with("error_rate", meta.error_rate)
            .with("success_rate", meta.success_rate)
            .with("first_run_time", meta.first_run_time.to_rfc3339())
            .with("latest_run_time", meta.latest_run_time.to_rfc3339())
            .with("latest_run_id", &meta.latest_run.id)
            .with("latest_run", serde_json::to_string(&meta.latest_run)?);

        self.client
            .emit(&EntitySnapshot::entity(urn, &properties))
            .await
    }

    /// Emits the pipeline a single run aggregates into, and links it to the
    /// run's model.
    ///
    /// # Errors
    ///
    /// Returns the first failing emission.
    pub async fn emit_run(&mut self, run: &Run) -> Result<Urn, EmitError> {
        let pipeline = pipeline_for_run(run);
        let urn = self.emit_chain(&pipeline).await?;

        if let Some(model) = &run.model {
            let model_urn = self.emit_model(model).await?;
            self.emit_lineage(&urn, &model_urn, EdgeType::Uses).await?;
        }

        Ok(urn)
    }

    /// Emits one run as a `dataset` named `runs/<id>`, linked to its model.
    ///
    /// # Errors
    ///
    /// Returns the first failing emission.
    pub async fn emit_raw_run(&mut self, run: &Run) -> Result<Urn, EmitError> {
        let name = format!("runs/{}", run.id);
        let urn = self.urn(EntityKind::Dataset, &name)?;

        let status = if run.has_error() { "failed" } else { "completed" };
        let properties = Properties::new(&name, format!("LLM Run {}", run.id))
            .with("run_id", &run.id)
            .with("status", status)
            .with("project", run.project())
            .with("model", run.model.as_ref().map_or("unknown", Model::name))
            .with("start_time", run.start_time.to_rfc3339())
            .with(
                "end_time",
                run.end_time.map_or_else(|| "none".to_string(), |end| end.to_rfc3339()),
            )
            .with("parent_id", run.parent_id.as_deref().unwrap_or("none"))
            .with("inputs", serde_json::to_string(&run.inputs)?)
            .with("outputs", serde_json::to_string(&run.outputs)?)
            .with("metrics", serde_json::to_string(&run.metrics)?)
            .with("error", run.error.as_deref().unwrap_or("none"));

        let urn = self
            .client
            .emit(&EntitySnapshot::entity(urn, &properties))
            .await?;

        if let Some(model) = &run.model {
            let model_urn = self.emit_model(model).await?;
            self.emit_lineage(&urn, &model_urn, EdgeType::Uses).await?;
        }

        Ok(urn)
    }

    /// Writes a lineage edge as two aspects, one on each endpoint, so the
    /// relationship is discoverable from either side, and records it.
    ///
    /// # Errors
    ///
    /// Returns the first failing write; the edge is recorded only when both
    /// writes succeed.
    pub async fn emit_lineage(
        &mut self,
        source: &Urn,
        target: &Urn,
        edge_type: EdgeType,
    ) -> Result<(), EmitError> {
        let forward = EntitySnapshot::lineage_update(source.clone()).with_lineage(target, edge_type);
        let reverse = EntitySnapshot::lineage_update(target.clone()).with_lineage(source, edge_type);

        self.client.emit(&forward).await?;
        self.client.emit(&reverse).await?;

        let known = self
            .lineage
            .downstream(source.as_str())
            .iter()
            .any(|edge| edge.target_id == target.as_str() && edge.edge_type == edge_type);

        if !known {
            info!(source = %source, target = %target, %edge_type, "Recorded lineage");
            self.lineage
                .add_edge(source.as_str(), target.as_str(), edge_type, None);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use llm_structs::JsonMap;
    use serde_json::json;

    use super::*;
    use crate::client::EmitSettings;
    use crate::client::tests::{FakeCatalog, fast_settings};

    fn emitter(settings: EmitSettings) -> MetadataEmitter<FakeCatalog> {
        MetadataEmitter::new(
            EmissionClient::new(FakeCatalog::default(), settings),
            "llm",
            "PROD",
        )
    }

    fn model(name: &str) -> Model {
        Model::from_raw_name(name, JsonMap::new(), JsonMap::new())
    }

    fn run(id: &str, model_name: &str) -> Run {
        let mut run = Run::new(id, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        run.model = Some(model(model_name));
        run.metadata.insert("project".to_string(), json!("proj"));
        run.metadata.insert("run_type".to_string(), json!("llm"));
        run.metadata.insert(
            "execution_metadata".to_string(),
            json!({ "model_name": model_name }),
        );
        run
    }

    fn ingested_calls(emitter: &MetadataEmitter<FakeCatalog>) -> usize {
        emitter.client().transport().calls()
    }

    #[tokio::test]
    async fn test_emit_model_is_idempotent() {
        let mut emitter = emitter(fast_settings());

        let first = emitter.emit_model(&model("gpt-4-0613")).await.unwrap();
        let calls = ingested_calls(&emitter);
        let second = emitter.emit_model(&model("gpt-4")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls, 2, "existence and properties stages");
        assert_eq!(ingested_calls(&emitter), calls);
        assert_eq!(
            first.as_str(),
            "urn:li:mlModel:(urn:li:dataPlatform:llm,OpenAI/gpt-4,PROD)"
        );
    }

    #[tokio::test]
    async fn test_dry_run_isolation() {
        let settings = EmitSettings {
            dry_run: true,
            ..fast_settings()
        };
        let mut dry = emitter(settings);
        let live_urn = emitter(fast_settings())
            .urn(EntityKind::MlModel, "OpenAI/gpt-4")
            .unwrap();

        let mut urns = Vec::new();
        for _ in 0..100 {
            urns.push(dry.emit_model(&model("gpt-4")).await.unwrap());
        }

        assert_eq!(ingested_calls(&dry), 0);
        assert_eq!(urns.len(), 100);
        assert!(urns.iter().all(|urn| *urn == live_urn));

        let recorded = dry.client().recorded();
        assert_eq!(recorded.len(), 100);
        let body = &recorded[99]["entity"]["value"][EntityKind::MlModel.snapshot_type()];
        assert_eq!(body["urn"], json!(live_urn.as_str()));
    }

    #[tokio::test]
    async fn test_emit_run_links_pipeline_to_model() {
        let mut emitter = emitter(fast_settings());

        let urn = emitter.emit_run(&run("r1", "gpt-4-0613")).await.unwrap();

        assert_eq!(
            urn.as_str(),
            "urn:li:mlModel:(urn:li:dataPlatform:llm,proj_gpt-4,PROD)"
        );

        let model_urn = emitter.urn(EntityKind::MlModel, "OpenAI/gpt-4").unwrap();
        let downstream = emitter.lineage().downstream(urn.as_str());
        assert_eq!(downstream.len(), 1);
        assert_eq!(downstream[0].target_id, model_urn.as_str());
        assert_eq!(downstream[0].edge_type, EdgeType::Uses);
        assert_eq!(emitter.lineage().upstream(model_urn.as_str()).len(), 1);
    }

    #[tokio::test]
    async fn test_emit_raw_run() {
        let mut emitter = emitter(EmitSettings {
            dry_run: true,
            ..fast_settings()
        });
        let mut failed = run("r-9", "claude-3-opus");
        failed.error = Some("boom".to_string());

        let urn = emitter.emit_raw_run(&failed).await.unwrap();

        assert_eq!(urn.kind(), EntityKind::Dataset);
        assert_eq!(
            urn.as_str(),
            "urn:li:dataset:(urn:li:dataPlatform:llm,runs/r-9,PROD)"
        );

        let first = &emitter.client().recorded()[0];
        let aspects = &first["entity"]["value"][EntityKind::Dataset.snapshot_type()]["aspects"];
        assert_eq!(
            aspects[1]["com.linkedin.dataset.DatasetProperties"]["customProperties"]["status"],
            json!("failed")
        );
        assert_eq!(emitter.lineage().len(), 1);
    }

    #[tokio::test]
    async fn test_emit_lineage_writes_both_endpoints() {
        let mut emitter = emitter(fast_settings());
        let a = emitter.urn(EntityKind::MlModel, "a").unwrap();
        let b = emitter.urn(EntityKind::MlModel, "b").unwrap();

        emitter.emit_lineage(&a, &b, EdgeType::PartOf).await.unwrap();
        emitter.emit_lineage(&a, &b, EdgeType::PartOf).await.unwrap();

        // existence + lineage on each endpoint, once
        assert_eq!(ingested_calls(&emitter), 4);
        assert_eq!(emitter.lineage().len(), 1);
        assert_eq!(emitter.lineage().downstream(a.as_str())[0].target_id, b.as_str());
        assert_eq!(emitter.lineage().upstream(b.as_str())[0].source_id, a.as_str());
    }

    #[tokio::test]
    async fn test_invalid_urn_makes_no_call() {
        let mut emitter = emitter(fast_settings());
        let mut bad = run("r1", "gpt-4");
        bad.metadata.insert("project".to_string(), json!("a,b"));

        let result = emitter.emit_run(&bad).await;

        assert!(matches!(result, Err(EmitError::InvalidUrn(_))));
        assert_eq!(ingested_calls(&emitter), 0);
    }
}
