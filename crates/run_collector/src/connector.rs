use core::future::Future;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Failures talking to an upstream observability platform.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("platform request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("platform rate limit exceeded")]
    RateLimited,

    #[error("project {0:?} not found")]
    ProjectNotFound(String),

    #[error("run event channel is closed")]
    ObserverClosed,
}

impl CollectError {
    /// Whether a request failing with this error may succeed when repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Source of raw run records.
///
/// Records are returned as opaque JSON; turning them into runs is the
/// collector's job so that every platform shares one mapping.
pub trait PlatformConnector {
    /// Fetches at most `limit` raw run records of `project` started inside
    /// `[start, end]`.
    fn fetch_runs(
        &self,
        project: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Value>, CollectError>> + Send;
}
