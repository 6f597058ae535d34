/// Failures emitting an entity to the catalog.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The request never produced a response (connection, timeout).
    #[error("catalog request failed: {0}")]
    Transport(String),

    #[error("catalog responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to serialize entity snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid URN input: {0}")]
    InvalidUrn(String),

    #[error("emission failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<EmitError>,
    },
}

impl EmitError {
    /// Whether repeating the request may succeed: transport failures,
    /// server errors, timeouts and throttling.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Serialization(_) | Self::InvalidUrn(_) | Self::RetriesExhausted { .. } => false,
        }
    }
}

impl From<reqwest::Error> for EmitError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
