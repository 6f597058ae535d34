//! Single LLM executions and the mapping from raw platform records.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{JsonMap, Model};

/// Project assumed when a run does not name one.
pub const DEFAULT_PROJECT: &str = "default";

/// Invocation parameters copied onto a run's [`Model`].
const MODEL_PARAMETERS: &[&str] = &[
    "temperature",
    "max_tokens",
    "top_p",
    "frequency_penalty",
    "presence_penalty",
];

/// Reasons a raw record cannot become a [`Run`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RunError {
    #[error("run record has no id")]
    MissingId,

    #[error("run {id} has no start time")]
    MissingStartTime { id: String },

    #[error("run {id} has an unparseable {field}: {value}")]
    InvalidTimestamp {
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("run {id} ends before it starts")]
    EndBeforeStart { id: String },
}

/// Token counts for one run. Missing counts are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Builds usage from optional counts, deriving the total when absent.
    #[must_use]
    pub fn new(prompt: Option<u64>, completion: Option<u64>, total: Option<u64>) -> Self {
        let prompt_tokens = prompt.unwrap_or(0);
        let completion_tokens = completion.unwrap_or(0);

        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: total.unwrap_or(prompt_tokens.saturating_add(completion_tokens)),
        }
    }
}

/// Per-run metrics. Every field is always present; absent values are zero so
/// aggregation arithmetic never meets a null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Wall-clock latency in seconds.
    pub latency: f64,
    pub token_usage: TokenUsage,
    pub cost: f64,
    pub error_rate: f64,
    pub success_rate: f64,
    /// Platform-specific extras, passed through untouched.
    #[serde(default)]
    pub custom: JsonMap,
}

impl RunMetrics {
    /// Metrics for a single run that either failed or succeeded.
    #[must_use]
    pub fn for_outcome(failed: bool) -> Self {
        let error_rate = if failed { 1.0 } else { 0.0 };

        Self {
            error_rate,
            success_rate: 1.0 - error_rate,
            ..Self::default()
        }
    }
}

/// One LLM execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub model: Option<Model>,
    pub inputs: JsonMap,
    pub outputs: JsonMap,
    pub metrics: RunMetrics,
    /// First line of the failure message, if the run failed.
    pub error: Option<String>,
    pub parent_id: Option<String>,
    /// Execution metadata: `project`, `run_type`, `name`, `tags` and an
    /// `execution_metadata` object holding the platform's model hints.
    pub metadata: JsonMap,
}

impl Run {
    /// Creates a successful run with empty payloads.
    #[must_use]
    pub fn new(id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time: None,
            model: None,
            inputs: JsonMap::new(),
            outputs: JsonMap::new(),
            metrics: RunMetrics::for_outcome(false),
            error: None,
            parent_id: None,
            metadata: JsonMap::new(),
        }
    }

    /// Checks the run's invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty or `end_time` precedes `start_time`.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.id.is_empty() {
            return Err(RunError::MissingId);
        }

        if let Some(end_time) = self.end_time
            && end_time < self.start_time
        {
            return Err(RunError::EndBeforeStart {
                id: self.id.clone(),
            });
        }

        Ok(())
    }

    /// Maps a raw platform record into a run, filling documented defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the record has no id, no parseable start time, or
    /// ends before it starts.
    pub fn from_record(record: RunRecord, project: &str) -> Result<Self, RunError> {
        let id = record
            .id
            .as_ref()
            .and_then(value_to_string)
            .filter(|id| !id.is_empty())
            .ok_or(RunError::MissingId)?;

        let start_raw = record
            .start_time
            .as_deref()
            .ok_or_else(|| RunError::MissingStartTime { id: id.clone() })?;
        let start_time =
            parse_timestamp(start_raw).ok_or_else(|| RunError::InvalidTimestamp {
                id: id.clone(),
                field: "start_time",
                value: start_raw.to_string(),
            })?;

        let end_time = match record.end_time.as_deref() {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                RunError::InvalidTimestamp {
                    id: id.clone(),
                    field: "end_time",
                    value: raw.to_string(),
                }
            })?),
            None => None,
        };

        let error = record.error_message();
        let model_name = record.model_name_hint();
        let model = model_name
            .as_deref()
            .map(|name| Model::from_raw_name(name, record.model_parameters(), model_source(&record)));

        let latency = match end_time {
            Some(end_time) => duration_seconds(start_time, end_time),
            None => record.latency.unwrap_or(0.0),
        };

        let metrics = RunMetrics {
            latency,
            token_usage: TokenUsage::new(
                record.prompt_tokens,
                record.completion_tokens,
                record.total_tokens,
            ),
            cost: record.total_cost.as_ref().and_then(value_to_f64).unwrap_or(0.0),
            ..RunMetrics::for_outcome(error.is_some())
        };

        let mut execution_metadata = JsonMap::new();
        if let Some(name) = &model_name {
            execution_metadata.insert("model_name".to_string(), json!(name));
        }
        if let Some(params) = record.invocation_params() {
            execution_metadata.insert("invocation_params".to_string(), params.clone());
        }

        let mut metadata = JsonMap::new();
        metadata.insert("project".to_string(), json!(project));
        metadata.insert(
            "run_type".to_string(),
            json!(record.run_type.as_deref().unwrap_or("unknown")),
        );
        if let Some(name) = &record.name {
            metadata.insert("name".to_string(), json!(name));
        }
        metadata.insert(
            "tags".to_string(),
            json!(record.tags.clone().unwrap_or_default()),
        );
        if let Some(feedback) = &record.feedback_stats {
            metadata.insert("feedback_stats".to_string(), feedback.clone());
        }
        metadata.insert(
            "execution_metadata".to_string(),
            Value::Object(execution_metadata),
        );

        let run = Self {
            id,
            start_time,
            end_time,
            model,
            inputs: record.inputs.unwrap_or_default(),
            outputs: record.outputs.unwrap_or_default(),
            metrics,
            error,
            parent_id: record.parent_run_id,
            metadata,
        };

        run.validate()?;
        Ok(run)
    }

    /// Project this run belongs to.
    #[must_use]
    pub fn project(&self) -> &str {
        self.metadata
            .get("project")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROJECT)
    }

    /// Raw model name recorded in the run's execution metadata.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.metadata
            .get("execution_metadata")
            .and_then(|meta| meta.get("model_name"))
            .and_then(Value::as_str)
    }

    /// Platform run type (`llm`, `chain`, ...).
    #[must_use]
    pub fn run_type(&self) -> Option<&str> {
        self.metadata.get("run_type").and_then(Value::as_str)
    }

    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.metrics.token_usage.total_tokens
    }

    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A raw run record as returned by the platform API.
///
/// Every field is optional; [`Run::from_record`] is the one place that turns
/// absence into defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunRecord {
    pub id: Option<Value>,
    pub name: Option<String>,
    pub run_type: Option<String>,
    pub status: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Opaque extra parameters (`invocation_params`, `metadata`).
    pub extra: Option<Value>,
    pub serialized: Option<Value>,
    pub error: Option<String>,
    pub inputs: Option<JsonMap>,
    pub outputs: Option<JsonMap>,
    pub parent_run_id: Option<String>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    /// Number or decimal string.
    pub total_cost: Option<Value>,
    pub latency: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub feedback_stats: Option<Value>,
    pub child_run_ids: Option<Vec<String>>,
}

impl RunRecord {
    /// Extracts the model identifier from the extra parameters, falling back
    /// to the serialized SDK class name.
    #[must_use]
    pub fn model_name_hint(&self) -> Option<String> {
        const POINTERS: &[&str] = &[
            "/invocation_params/model_name",
            "/invocation_params/model",
            "/metadata/ls_model_name",
        ];

        let from_extra = self.extra.as_ref().and_then(|extra| {
            POINTERS
                .iter()
                .filter_map(|pointer| extra.pointer(pointer).and_then(Value::as_str))
                .find(|name| !name.trim().is_empty())
        });

        let from_serialized = || {
            let serialized = self.serialized.as_ref()?;
            serialized
                .get("id")
                .and_then(Value::as_array)
                .and_then(|path| path.last())
                .and_then(Value::as_str)
                .or_else(|| serialized.get("name").and_then(Value::as_str))
        };

        from_extra.or_else(from_serialized).map(str::to_string)
    }

    fn invocation_params(&self) -> Option<&Value> {
        self.extra.as_ref()?.get("invocation_params")
    }

    fn model_parameters(&self) -> JsonMap {
        let mut parameters = JsonMap::new();

        if let Some(params) = self.invocation_params() {
            for key in MODEL_PARAMETERS {
                if let Some(value) = params.get(*key) {
                    parameters.insert((*key).to_string(), value.clone());
                }
            }
        }

        parameters
    }

    fn error_message(&self) -> Option<String> {
        match self.error.as_deref().map(str::trim) {
            Some(error) if !error.is_empty() => {
                Some(error.lines().next().unwrap_or(error).to_string())
            }
            _ if self.status.as_deref() == Some("error") => Some("error".to_string()),
            _ => None,
        }
    }
}

fn model_source(record: &RunRecord) -> JsonMap {
    let mut metadata = JsonMap::new();
    metadata.insert("source".to_string(), json!("langsmith"));

    if let Some(provider) = record
        .extra
        .as_ref()
        .and_then(|extra| extra.pointer("/metadata/ls_provider"))
    {
        metadata.insert("ls_provider".to_string(), provider.clone());
    }

    metadata
}

/// Parses RFC 3339 timestamps as well as the naive UTC timestamps
/// (`2024-05-01T12:00:00.123456`) the platform API emits.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[expect(
    clippy::cast_precision_loss,
    reason = "run durations are far below 2^52 milliseconds"
)]
fn duration_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
