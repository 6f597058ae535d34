//! Descriptive statistics over collected runs and models.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use llm_structs::{Model, Run};
use serde::Serialize;

const HOUR_SECONDS: i64 = 3600;

/// Batch-level run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total_runs: usize,
    pub success_rate: f64,
    /// Mean latency over runs that reported one.
    pub average_latency: f64,
    pub total_cost: f64,
    /// Error kind to occurrence count. The kind is the first line of the
    /// message, cut at its first `:`.
    pub error_distribution: BTreeMap<String, usize>,
}

impl RunStats {
    #[expect(clippy::cast_precision_loss, reason = "run counts are far below 2^52")]
    #[must_use]
    pub fn from_runs(runs: &[Run]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }

        let successful = runs.iter().filter(|run| !run.has_error()).count();

        let latencies: Vec<f64> = runs
            .iter()
            .map(|run| run.metrics.latency)
            .filter(|latency| *latency > 0.0)
            .collect();
        let average_latency = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        let mut error_distribution = BTreeMap::new();
        for error in runs.iter().filter_map(|run| run.error.as_deref()) {
            let kind = error_kind(error);
            *error_distribution.entry(kind.to_string()).or_insert(0) += 1;
        }

        Self {
            total_runs: runs.len(),
            success_rate: successful as f64 / runs.len() as f64,
            average_latency,
            total_cost: runs.iter().map(|run| run.metrics.cost).sum(),
            error_distribution,
        }
    }
}

fn error_kind(message: &str) -> &str {
    let line = message.lines().next().unwrap_or_default();
    line.split(':').next().unwrap_or(line).trim()
}

/// Counts of collected models by provider and capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    pub total_models: usize,
    pub by_provider: BTreeMap<String, usize>,
    pub by_capability: BTreeMap<String, usize>,
}

impl ModelStats {
    #[must_use]
    pub fn from_models(models: &[Model]) -> Self {
        let mut stats = Self {
            total_models: models.len(),
            ..Self::default()
        };

        for model in models {
            *stats
                .by_provider
                .entry(model.provider().to_string())
                .or_insert(0) += 1;

            for capability in model.capabilities() {
                *stats.by_capability.entry(capability.clone()).or_insert(0) += 1;
            }
        }

        stats
    }
}

/// Summary of one numeric metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; zero for fewer than two values.
    pub stddev: f64,
}

/// Mean of a metric within one hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendBucket {
    pub interval_start: DateTime<Utc>,
    pub mean: f64,
    pub count: usize,
}

/// Timestamped history of the numeric metrics of many runs.
#[derive(Debug, Clone, Default)]
pub struct MetricHistory {
    series: BTreeMap<String, Vec<(DateTime<Utc>, f64)>>,
}

impl MetricHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single observation.
    pub fn record(&mut self, name: &str, timestamp: DateTime<Utc>, value: f64) {
        self.series
            .entry(name.to_string())
            .or_default()
            .push((timestamp, value));
    }

    /// Records `latency`, `cost` and `total_tokens` of a run at its start time.
    #[expect(clippy::cast_precision_loss, reason = "token counts are far below 2^52")]
    pub fn record_run(&mut self, run: &Run) {
        self.record("latency", run.start_time, run.metrics.latency);
        self.record("cost", run.start_time, run.metrics.cost);
        self.record("total_tokens", run.start_time, run.total_tokens() as f64);
    }

    /// Summarizes a metric, optionally restricted to observations newer than
    /// `now - window`. Unknown metrics summarize to all zeros.
    #[must_use]
    pub fn summary(&self, name: &str, window: Option<(DateTime<Utc>, TimeDelta)>) -> MetricSummary {
        let mut values: Vec<f64> = self
            .series
            .get(name)
            .into_iter()
            .flatten()
            .filter(|(timestamp, _)| {
                window.is_none_or(|(now, window)| *timestamp >= now - window)
            })
            .map(|(_, value)| *value)
            .collect();

        summarize(&mut values)
    }

    /// Hourly means of a metric, oldest bucket first.
    #[expect(clippy::cast_precision_loss, reason = "bucket sizes are far below 2^52")]
    #[must_use]
    pub fn hourly_trend(&self, name: &str) -> Vec<TrendBucket> {
        let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();

        for (timestamp, value) in self.series.get(name).into_iter().flatten() {
            let seconds = timestamp.timestamp();
            let start = seconds - seconds.rem_euclid(HOUR_SECONDS);
            buckets.entry(start).or_default().push(*value);
        }

        buckets
            .into_iter()
            .filter_map(|(start, values)| {
                Some(TrendBucket {
                    interval_start: DateTime::from_timestamp(start, 0)?,
                    mean: values.iter().sum::<f64>() / values.len() as f64,
                    count: values.len(),
                })
            })
            .collect()
    }
}

#[expect(clippy::cast_precision_loss, reason = "sample sizes are far below 2^52")]
fn summarize(values: &mut [f64]) -> MetricSummary {
    if values.is_empty() {
        return MetricSummary::default();
    }

    values.sort_by(f64::total_cmp);

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let median = if count.is_multiple_of(2) {
        f64::midpoint(values[count / 2 - 1], values[count / 2])
    } else {
        values[count / 2]
    };
    let stddev = if count > 1 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    MetricSummary {
        count,
        mean,
        median,
        min: values[0],
        max: values[count - 1],
        stddev,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use llm_structs::JsonMap;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_002_800 + seconds, 0).unwrap()
    }

    #[test]
    fn test_run_stats() {
        let mut ok = Run::new("ok", at(0));
        ok.metrics.latency = 2.0;
        ok.metrics.cost = 0.1;
        let mut failed = Run::new("failed", at(1));
        failed.error = Some("RateLimitError: slow down".to_string());
        failed.metrics.cost = 0.2;
        let mut failed_again = Run::new("failed-again", at(2));
        failed_again.error = Some("RateLimitError: again".to_string());
        failed_again.metrics.latency = 4.0;

        let stats = RunStats::from_runs(&[ok, failed, failed_again]);

        assert_eq!(stats.total_runs, 3);
        assert!((stats.success_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((stats.average_latency - 3.0).abs() < f64::EPSILON);
        assert!((stats.total_cost - 0.3).abs() < 1e-9);
        assert_eq!(stats.error_distribution.get("RateLimitError"), Some(&2));
    }

    #[test]
    fn test_error_kind_uses_first_line() {
        let mut multi_line = Run::new("a", at(0));
        multi_line.error = Some("Timeout waiting for model\nTraceback: ...".to_string());
        let mut plain = Run::new("b", at(1));
        plain.error = Some("Timeout waiting for model".to_string());

        let stats = RunStats::from_runs(&[multi_line, plain]);

        assert_eq!(
            stats.error_distribution,
            BTreeMap::from([("Timeout waiting for model".to_string(), 2)])
        );
    }

    #[test]
    fn test_run_stats_empty() {
        assert_eq!(RunStats::from_runs(&[]), RunStats::default());
    }

    #[test]
    fn test_model_stats() {
        let models = [
            Model::from_raw_name("gpt-4", JsonMap::new(), JsonMap::new()),
            Model::from_raw_name("gpt-4o", JsonMap::new(), JsonMap::new()),
            Model::from_raw_name("claude-2", JsonMap::new(), JsonMap::new()),
        ];

        let stats = ModelStats::from_models(&models);

        assert_eq!(stats.total_models, 3);
        assert_eq!(stats.by_provider.get("OpenAI"), Some(&2));
        assert_eq!(stats.by_provider.get("Anthropic"), Some(&1));
        assert_eq!(stats.by_capability.get("text-generation"), Some(&3));
        assert_eq!(stats.by_capability.get("vision"), Some(&1));
        assert_eq!(
            stats.by_capability.keys().cloned().collect::<BTreeSet<_>>(),
            BTreeSet::from([
                "chat".to_string(),
                "function-calling".to_string(),
                "text-generation".to_string(),
                "vision".to_string(),
            ])
        );
    }

    #[test]
    fn test_metric_summary() {
        let mut history = MetricHistory::new();
        for (offset, value) in [(0, 1.0), (10, 3.0), (20, 2.0), (30, 6.0)] {
            history.record("latency", at(offset), value);
        }

        let summary = history.summary("latency", None);
        assert_eq!(summary.count, 4);
        assert!((summary.mean - 3.0).abs() < f64::EPSILON);
        assert!((summary.median - 2.5).abs() < f64::EPSILON);
        assert!((summary.min - 1.0).abs() < f64::EPSILON);
        assert!((summary.max - 6.0).abs() < f64::EPSILON);
        assert!(summary.stddev > 0.0);

        let windowed = history.summary("latency", Some((at(30), TimeDelta::seconds(15))));
        assert_eq!(windowed.count, 2);

        assert_eq!(history.summary("missing", None), MetricSummary::default());
    }

    #[test]
    fn test_hourly_trend() {
        let mut history = MetricHistory::new();
        let mut run = Run::new("r", at(0));
        run.metrics.latency = 2.0;
        history.record_run(&run);
        history.record("latency", at(60), 4.0);
        history.record("latency", at(HOUR_SECONDS), 10.0);

        let trend = history.hourly_trend("latency");
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].count, 2);
        assert!((trend[0].mean - 3.0).abs() < f64::EPSILON);
        assert_eq!(trend[1].count, 1);
    }
}
