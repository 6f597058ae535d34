//! Run events pushed by in-process LLM callbacks.
//!
//! Callback hooks fire on whatever task the instrumented application uses.
//! [`RunObserver`] turns each hook into a [`RunEvent`] on a bounded channel and
//! [`EventAssembler`] pairs them back into [`Run`]s on the consumer side, so
//! the batch pipeline never sees the callback's timing model.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use llm_structs::{JsonMap, Model, Run, RunMetrics, TokenUsage};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connector::CollectError;

/// One lifecycle step of an observed LLM call.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        run_id: String,
        project: String,
        model_name: Option<String>,
        inputs: JsonMap,
        parent_id: Option<String>,
        at: DateTime<Utc>,
    },
    Ended {
        run_id: String,
        outputs: JsonMap,
        token_usage: TokenUsage,
        cost: f64,
        at: DateTime<Utc>,
    },
    Failed {
        run_id: String,
        error: String,
        at: DateTime<Utc>,
    },
}

impl RunEvent {
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::Started { run_id, .. } | Self::Ended { run_id, .. } | Self::Failed { run_id, .. } => {
                run_id
            }
        }
    }
}

/// Creates a connected observer/assembler pair over a channel holding at
/// most `capacity` undelivered events.
#[must_use]
pub fn channel(capacity: usize) -> (RunObserver, EventAssembler) {
    let (tx, rx) = mpsc::channel(capacity);
    (RunObserver { tx }, EventAssembler::new(rx))
}

/// Cloneable handle the callback hooks report through.
#[derive(Debug, Clone)]
pub struct RunObserver {
    tx: mpsc::Sender<RunEvent>,
}

impl RunObserver {
    /// Reports the start of an LLM call.
    ///
    /// # Errors
    ///
    /// Returns an error if the assembler has been dropped.
    pub async fn on_llm_start(
        &self,
        run_id: &str,
        project: &str,
        model_name: Option<&str>,
        inputs: JsonMap,
        parent_id: Option<&str>,
    ) -> Result<(), CollectError> {
        self.send(RunEvent::Started {
            run_id: run_id.to_string(),
            project: project.to_string(),
            model_name: model_name.map(str::to_string),
            inputs,
            parent_id: parent_id.map(str::to_string),
            at: Utc::now(),
        })
        .await
    }

    /// Reports a successful completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the assembler has been dropped.
    pub async fn on_llm_end(
        &self,
        run_id: &str,
        outputs: JsonMap,
        token_usage: TokenUsage,
        cost: f64,
    ) -> Result<(), CollectError> {
        self.send(RunEvent::Ended {
            run_id: run_id.to_string(),
            outputs,
            token_usage,
            cost,
            at: Utc::now(),
        })
        .await
    }

    /// Reports a failed call.
    ///
    /// # Errors
    ///
    /// Returns an error if the assembler has been dropped.
    pub async fn on_llm_error(&self, run_id: &str, error: &str) -> Result<(), CollectError> {
        self.send(RunEvent::Failed {
            run_id: run_id.to_string(),
            error: error.to_string(),
            at: Utc::now(),
        })
        .await
    }

    /// Pushes a pre-built event, waiting while the channel is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the assembler has been dropped.
    pub async fn send(&self, event: RunEvent) -> Result<(), CollectError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CollectError::ObserverClosed)
    }
}

struct Pending {
    project: String,
    model_name: Option<String>,
    inputs: JsonMap,
    parent_id: Option<String>,
    started: DateTime<Utc>,
}

/// Consumer side: pairs start and end events into runs.
pub struct EventAssembler {
    rx: mpsc::Receiver<RunEvent>,
    pending: IndexMap<String, Pending>,
}

impl EventAssembler {
    fn new(rx: mpsc::Receiver<RunEvent>) -> Self {
        Self {
            rx,
            pending: IndexMap::new(),
        }
    }

    /// Waits for the next completed run, in completion order.
    ///
    /// Returns `None` once every observer handle is dropped and the channel is
    /// drained. Ends without a matching start are logged and skipped.
    pub async fn next_run(&mut self) -> Option<Run> {
        while let Some(event) = self.rx.recv().await {
            if let Some(run) = self.apply(event) {
                return Some(run);
            }
        }
        None
    }

    /// Drains the channel until it closes and returns every completed run.
    pub async fn collect(&mut self) -> Vec<Run> {
        let mut runs = Vec::new();
        while let Some(run) = self.next_run().await {
            runs.push(run);
        }

        if !self.pending.is_empty() {
            warn!(active = self.pending.len(), "Runs still active when the event channel closed");
        }

        runs
    }

    /// Ids of started runs that have not ended yet, in start order.
    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    fn apply(&mut self, event: RunEvent) -> Option<Run> {
        match event {
            RunEvent::Started {
                run_id,
                project,
                model_name,
                inputs,
                parent_id,
                at,
            } => {
                debug!(%run_id, "Run started");
                self.pending.insert(
                    run_id,
                    Pending {
                        project,
                        model_name,
                        inputs,
                        parent_id,
                        started: at,
                    },
                );
                None
            }
            RunEvent::Ended {
                run_id,
                outputs,
                token_usage,
                cost,
                at,
            } => {
                let pending = self.take_pending(&run_id)?;
                let mut run = assemble(run_id, pending, at, None);
                run.outputs = outputs;
                run.metrics.token_usage = token_usage;
                run.metrics.cost = cost;
                Some(run)
            }
            RunEvent::Failed { run_id, error, at } => {
                let pending = self.take_pending(&run_id)?;
                Some(assemble(run_id, pending, at, Some(error)))
            }
        }
    }

    fn take_pending(&mut self, run_id: &str) -> Option<Pending> {
        let pending = self.pending.shift_remove(run_id);
        if pending.is_none() {
            warn!(run_id, "Skipping end event without a matching start");
        }
        pending
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "run durations are far below 2^52 milliseconds"
)]
fn assemble(run_id: String, pending: Pending, ended: DateTime<Utc>, error: Option<String>) -> Run {
    let end_time = ended.max(pending.started);

    let mut run = Run::new(run_id, pending.started);
    run.end_time = Some(end_time);
    run.inputs = pending.inputs;
    run.parent_id = pending.parent_id;
    run.metrics = RunMetrics {
        latency: (end_time - pending.started).num_milliseconds() as f64 / 1000.0,
        ..RunMetrics::for_outcome(error.is_some())
    };
    run.error = error;
    run.model = pending
        .model_name
        .as_deref()
        .map(|name| Model::from_raw_name(name, JsonMap::new(), JsonMap::new()));

    let mut execution_metadata = JsonMap::new();
    if let Some(name) = pending.model_name {
        execution_metadata.insert("model_name".to_string(), json!(name));
    }
    run.metadata.insert("project".to_string(), json!(pending.project));
    run.metadata.insert("run_type".to_string(), json!("llm"));
    run.metadata
        .insert("execution_metadata".to_string(), Value::Object(execution_metadata));

    run
}
