//! Staged, retried and deduplicated writes to the catalog.

use core::time::Duration;
use std::collections::HashSet;

use backon::{ExponentialBuilder, Retryable};
use llm_structs::{Artifact, DebugSink};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::snapshot::{EntitySnapshot, Stage};
use crate::transport::CatalogTransport;
use crate::{EmitError, Urn};

/// Knobs of the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitSettings {
    /// Write attempts per stage, including the first.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
    /// Pause between the stages of one entity.
    pub stage_delay: Duration,
    /// Construct and record payloads without sending them.
    pub dry_run: bool,
}

impl Default for EmitSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            stage_delay: Duration::from_millis(500),
            dry_run: false,
        }
    }
}

/// Writes entity snapshots through a [`CatalogTransport`].
///
/// Each snapshot is written as up to three stages (existence, properties,
/// lineage), in order, with a pause between them. A failed stage is retried
/// with exponential backoff; stages already accepted are not rolled back.
/// Successfully written snapshots are remembered for the lifetime of the
/// client, and writing one again is a no-op.
pub struct EmissionClient<T> {
    transport: T,
    settings: EmitSettings,
    emitted: HashSet<String>,
    recorded: Vec<Value>,
    sink: Option<DebugSink>,
}

impl<T: CatalogTransport> EmissionClient<T> {
    #[must_use]
    pub fn new(transport: T, settings: EmitSettings) -> Self {
        Self {
            transport,
            settings,
            emitted: HashSet::new(),
            recorded: Vec::new(),
            sink: None,
        }
    }

    /// Forwards every constructed payload to `sink`.
    #[must_use]
    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &EmitSettings {
        &self.settings
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.settings.dry_run
    }

    /// Payloads a dry run would have sent, in emission order.
    #[must_use]
    pub fn recorded(&self) -> &[Value] {
        &self.recorded
    }

    /// Whether a snapshot with this key has been written.
    #[must_use]
    pub fn is_emitted(&self, key: &str) -> bool {
        self.emitted.contains(key)
    }

    /// Writes a snapshot and returns its URN.
    ///
    /// In dry-run mode the payload is only recorded; retries and dedup are
    /// bypassed and the returned URN is the one a live write would return.
    ///
    /// # Errors
    ///
    /// Returns the first terminal error of any stage, or
    /// [`EmitError::RetriesExhausted`] when a stage keeps failing.
    pub async fn emit(&mut self, snapshot: &EntitySnapshot) -> Result<Urn, EmitError> {
        let urn = snapshot.urn().clone();
        let payload = snapshot.to_payload();

        if self.settings.dry_run {
            info!(%urn, %payload, "Dry run: would emit snapshot");
            self.forward(&payload);
            self.recorded.push(payload);
            return Ok(urn);
        }

        let key = snapshot.key();
        if self.emitted.contains(&key) {
            debug!(%urn, "Already emitted, skipping");
            return Ok(urn);
        }

        self.forward(&payload);

        for (index, (stage, stage_payload)) in snapshot.stages().into_iter().enumerate() {
            if index > 0 && !self.settings.stage_delay.is_zero() {
                tokio::time::sleep(self.settings.stage_delay).await;
            }

            self.write(&urn, stage, &stage_payload).await?;
        }

        info!(%urn, "Emitted snapshot");
        self.emitted.insert(key);

        Ok(urn)
    }

    /// Reads an entity back from the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub async fn lookup(&self, urn: &str) -> Result<Option<Value>, EmitError> {
        self.transport.get_entity(urn).await
    }

    fn forward(&self, payload: &Value) {
        if let Some(sink) = &self.sink {
            sink(Artifact::Snapshots, payload);
        }
    }

    /// Waits between write attempts: `retry_delay`, then doubling, capped at
    /// eight times `retry_delay`, for `max_retries - 1` retries.
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.settings.retry_delay)
            .with_max_delay(self.settings.retry_delay.saturating_mul(8))
            .with_max_times(self.settings.max_retries.max(1) - 1)
    }

    async fn write(&self, urn: &Urn, stage: Stage, payload: &Value) -> Result<(), EmitError> {
        let attempts = self.settings.max_retries.max(1);

        let result = (|| self.transport.ingest(payload))
            .retry(self.backoff())
            .when(EmitError::is_retryable)
            .notify(|error, delay| {
                warn!(%urn, ?stage, %error, ?delay, "Stage write failed, retrying");
            })
            .await;

        match result {
            Ok(()) => {
                debug!(%urn, ?stage, "Stage written");
                Ok(())
            }
            Err(error) if error.is_retryable() => Err(EmitError::RetriesExhausted {
                attempts,
                source: Box::new(error),
            }),
            Err(error) => Err(error),
        }
    }
}
