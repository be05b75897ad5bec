use thiserror::Error;

/// Errors raised while talking to a model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request could not be sent or the connection broke.
    #[error("provider transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The event stream carried something we could not interpret.
    #[error("malformed provider stream: {0}")]
    Stream(String),

    /// A stream payload was not the JSON we expected.
    #[error("failed to decode provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The provider reported an error inside the stream.
    #[error("provider error: {0}")]
    Provider(String),

    /// The API key environment variable is missing.
    #[error("missing environment variable {0}")]
    MissingApiKey(String),

    #[error("invalid provider configuration: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether opening the stream again may succeed.
    ///
    /// Only connection-level failures are retried: transport errors and the
    /// HTTP statuses that signal overload or a transient server fault.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
