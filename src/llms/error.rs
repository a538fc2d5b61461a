use thiserror::Error;

/// Typed error for backend requests.
///
/// `Api` carries the message the backend reported, shown to the user as is.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing or invalid API key
    #[error("{0}")]
    Auth(String),
    /// Network-level failure (DNS, connection, TLS)
    #[error("Network error: {0}")]
    Network(String),
    /// Backend answered with a non-success status
    #[error("{message}")]
    Api { status: u16, message: String },
    /// Error reading the streaming body
    #[error("Stream read error: {0}")]
    StreamRead(String),
    /// Failed to parse a response body
    #[error("Parse error: {0}")]
    Parse(String),
    /// Stopped by the user
    #[error("cancelled")]
    Cancelled,
    /// Rejected before any network activity
    #[error("{0}")]
    Precondition(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Network(e.to_string())
    }
}
