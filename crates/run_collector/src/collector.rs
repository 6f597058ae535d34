use chrono::{DateTime, Utc};
use llm_structs::{Artifact, DebugSink, Model, Run, RunRecord};
use tracing::{info, warn};

use crate::connector::PlatformConnector;

/// Pulls raw run records from a platform connector and maps them into runs.
pub struct RunCollector<C> {
    connector: C,
    sink: Option<DebugSink>,
}

impl<C: PlatformConnector> RunCollector<C> {
    pub const fn new(connector: C) -> Self {
        Self {
            connector,
            sink: None,
        }
    }

    /// Forwards every raw record to `sink` before it is mapped.
    #[must_use]
    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Collects at most `limit` runs of `project` started inside `[start, end]`.
    ///
    /// Malformed records are logged and skipped. When the platform cannot be
    /// reached the result is empty; the failure is visible only in the logs.
    pub async fn collect(
        &self,
        project: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<Run> {
        let records = match self.connector.fetch_runs(project, start, end, limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(project, error = %e, "Failed to fetch runs, continuing with none");
                return Vec::new();
            }
        };

        let mut runs = Vec::with_capacity(records.len().min(limit));
        let mut skipped = 0_usize;

        for value in records.into_iter().take(limit) {
            if let Some(sink) = &self.sink {
                sink(Artifact::RawRecords, &value);
            }

            let record = match serde_json::from_value::<RunRecord>(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable run record");
                    skipped += 1;
                    continue;
                }
            };

            match Run::from_record(record, project) {
                Ok(run) => runs.push(run),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed run record");
                    skipped += 1;
                }
            }
        }

        info!(project, runs = runs.len(), skipped, "Collected runs");

        runs
    }

    /// Collects runs and returns the distinct models they used.
    pub async fn collect_models(
        &self,
        project: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<Model> {
        distinct_models(&self.collect(project, start, end, limit).await)
    }
}

/// Distinct models of `runs` by `(provider, name)`, in first-seen order.
#[must_use]
pub fn distinct_models(runs: &[Run]) -> Vec<Model> {
    let mut models: Vec<Model> = Vec::new();

    for model in runs.iter().filter_map(|run| run.model.as_ref()) {
        if !models.iter().any(|known| known.key() == model.key()) {
            models.push(model.clone());
        }
    }

    models
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::TimeZone;
    use serde_json::{Value, json};

    use super::*;
    use crate::connector::CollectError;

    struct FakeConnector {
        records: Result<Vec<Value>, u16>,
    }

    impl PlatformConnector for FakeConnector {
        async fn fetch_runs(
            &self,
            _project: &str,
            _start: DateTime<Utc>,
            _end: Option<DateTime<Utc>>,
            _limit: usize,
        ) -> Result<Vec<Value>, CollectError> {
            self.records.clone().map_err(|status| CollectError::Status {
                status,
                body: String::new(),
            })
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn record(id: &str, model: &str) -> Value {
        json!({
            "id": id,
            "run_type": "llm",
            "start_time": "2024-05-01T12:00:00Z",
            "extra": {"invocation_params": {"model_name": model}},
        })
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let collector = RunCollector::new(FakeConnector {
            records: Ok(vec![
                record("a", "gpt-4"),
                json!({"id": "no-start"}),
                json!("not an object"),
                record("b", "gpt-4"),
            ]),
        });

        let runs = collector.collect("proj", start(), None, 10).await;

        let ids: Vec<&str> = runs.iter().map(|run| run.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(runs[0].project(), "proj");
    }

    #[tokio::test]
    async fn test_unreachable_platform_yields_empty() {
        let collector = RunCollector::new(FakeConnector { records: Err(503) });

        assert!(collector.collect("proj", start(), None, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_limit_and_debug_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let collector = RunCollector::new(FakeConnector {
            records: Ok(vec![record("a", "gpt-4"), record("b", "gpt-4"), record("c", "gpt-4")]),
        })
        .with_debug_sink(Arc::new(move |artifact, value| {
            sink_seen.lock().unwrap().push((artifact, value.clone()));
        }));

        let runs = collector.collect("proj", start(), None, 2).await;

        assert_eq!(runs.len(), 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(artifact, _)| *artifact == Artifact::RawRecords));
    }

    #[tokio::test]
    async fn test_collect_models_distinct_in_first_seen_order() {
        let collector = RunCollector::new(FakeConnector {
            records: Ok(vec![
                record("a", "claude-3-opus-20240229"),
                record("b", "gpt-4-0613"),
                record("c", "claude-3-opus"),
                json!({"id": "d", "start_time": "2024-05-01T12:00:00Z"}),
            ]),
        });

        let models = collector.collect_models("proj", start(), None, 10).await;

        let names: Vec<&str> = models.iter().map(Model::name).collect();
        assert_eq!(names, vec!["claude-3-opus", "gpt-4"]);
    }
}
