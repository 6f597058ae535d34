//! In-memory buffer for debug artifacts, flushed to JSON-lines files.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use llm_structs::{Artifact, DebugSink};
use object_store::path::Path;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use tracing::info;

/// Collects the documents handed to a [`DebugSink`] in arrival order.
#[derive(Clone, Default)]
pub struct ArtifactBuffer {
    documents: Arc<Mutex<Vec<(Artifact, String)>>>,
}

impl ArtifactBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink appending every document to this buffer as compact JSON.
    #[must_use]
    pub fn sink(&self) -> DebugSink {
        let documents = Arc::clone(&self.documents);
        Arc::new(move |artifact, value| {
            documents
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((artifact, value.to_string()));
        })
    }

    /// Number of buffered documents of one kind.
    #[must_use]
    pub fn count(&self, artifact: Artifact) -> usize {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(kind, _)| *kind == artifact)
            .count()
    }

    /// Renders one artifact stream, one document per line.
    fn render(&self, artifact: Artifact) -> String {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(kind, _)| *kind == artifact)
            .fold(String::new(), |mut out, (_, line)| {
                out.push_str(line);
                out.push('\n');
                out
            })
    }

    /// Writes every non-empty artifact stream to its file in `store`.
    /// Returns the number of files written.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub async fn flush(&self, store: &dyn ObjectStore) -> anyhow::Result<usize> {
        let mut written = 0;

        for artifact in [Artifact::RawRecords, Artifact::Snapshots] {
            let body = self.render(artifact);
            if body.is_empty() {
                continue;
            }

            let path = Path::from(artifact.file_name());
            store
                .put(&path, PutPayload::from(body.into_bytes()))
                .await
                .with_context(|| format!("Failed to write {path}"))?;

            info!(%artifact, %path, "Wrote debug artifact");
            written += 1;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_flush_writes_jsonl_per_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = config::local_store(dir.path()).unwrap();

        let buffer = ArtifactBuffer::new();
        let sink = buffer.sink();
        sink(Artifact::RawRecords, &json!({"id": "a"}));
        sink(Artifact::Snapshots, &json!({"entity": {}}));
        sink(Artifact::RawRecords, &json!({"id": "b"}));

        assert_eq!(buffer.count(Artifact::RawRecords), 2);
        assert_eq!(buffer.flush(store.as_ref()).await.unwrap(), 2);

        let raw = std::fs::read_to_string(dir.path().join("langsmith_api_output.jsonl")).unwrap();
        assert_eq!(raw, "{\"id\":\"a\"}\n{\"id\":\"b\"}\n");

        let snapshots = std::fs::read_to_string(dir.path().join("mce_output.jsonl")).unwrap();
        assert_eq!(snapshots.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_empty_streams_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = config::local_store(dir.path()).unwrap();

        let buffer = ArtifactBuffer::new();
        buffer.sink()(Artifact::Snapshots, &json!({}));

        assert_eq!(buffer.flush(store.as_ref()).await.unwrap(), 1);
        assert!(!dir.path().join("langsmith_api_output.jsonl").exists());
    }
}
