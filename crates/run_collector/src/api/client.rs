//! Rate-limited HTTP client for the `LangSmith` API.

use core::num::NonZeroU32;
use core::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::models::{RunQuery, RunQueryResponse, Session};
use crate::connector::{CollectError, PlatformConnector};

/// Rate limit: 10 requests per second
const RATE_LIMIT_PER_SECOND: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// Largest page the runs query accepts
const MAX_PAGE_SIZE: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Rate-limited client for the `LangSmith` API.
pub struct LangSmithClient {
    client: Client,
    endpoint: String,
    api_key: String,
    limiter: DefaultDirectRateLimiter,
}

impl LangSmithClient {
    /// Creates a new client with rate limiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, CollectError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            limiter: RateLimiter::direct(Quota::per_second(RATE_LIMIT_PER_SECOND)),
        })
    }

    /// Resolves a project name to its session id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no session has that name.
    pub async fn resolve_session(&self, project: &str) -> Result<String, CollectError> {
        let url = format!("{}/sessions", self.endpoint);

        let sessions: Vec<Session> = self
            .send_json(|| self.client.get(&url).query(&[("name", project)]))
            .await?;

        sessions
            .iter()
            .find(|session| session.name.as_deref() == Some(project))
            .or_else(|| sessions.first())
            .map(|session| session.id.clone())
            .ok_or_else(|| CollectError::ProjectNotFound(project.to_string()))
    }

    /// Pages through root runs of a session until `limit` records are
    /// gathered or the platform reports no further page.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn query_runs(
        &self,
        session_id: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Value>, CollectError> {
        let url = format!("{}/runs/query", self.endpoint);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        while records.len() < limit {
            let query = RunQuery {
                session: vec![session_id.to_string()],
                start_time: start,
                end_time: end,
                is_root: true,
                limit: (limit - records.len()).min(MAX_PAGE_SIZE),
                cursor: cursor.take(),
            };

            let page: RunQueryResponse = self
                .send_json(|| self.client.post(&url).json(&query))
                .await?;

            debug!(records = page.runs.len(), "Received run page");

            let next = page.next_cursor().map(str::to_string);
            let exhausted = page.runs.is_empty();
            records.extend(page.runs);

            match next {
                Some(next) if !exhausted => cursor = Some(next),
                _ => break,
            }
        }

        records.truncate(limit);
        Ok(records)
    }

    /// Sends an authenticated request, retrying while the platform rate-limits us.
    async fn send_json<T: DeserializeOwned>(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, CollectError> {
        (|| async {
            self.limiter.until_ready().await;

            let response = build().header("x-api-key", &self.api_key).send().await?;
            let status = response.status();

            // Only retry on 429 Too Many Requests
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(CollectError::RateLimited);
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CollectError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            Ok(response.json::<T>().await?)
        })
        .retry(
            ExponentialBuilder::default()
                .with_max_times(3)
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(8)),
        )
        .when(CollectError::is_retryable)
        .notify(|error, delay| warn!(%error, ?delay, "Rate limited, will retry"))
        .await
    }
}

impl PlatformConnector for LangSmithClient {
    async fn fetch_runs(
        &self,
        project: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Value>, CollectError> {
        let session_id = self.resolve_session(project).await?;

        info!(project, %session_id, limit, "Fetching runs");

        let records = self.query_runs(&session_id, start, end, limit).await?;

        info!(project, records = records.len(), "Fetched runs");

        Ok(records)
    }
}
