//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// Delivery errors carry enough detail (status code, response body,
/// destination type) to diagnose a failed invocation without re-running it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported destination type: {0}")]
    UnsupportedDestinationType(String),

    #[error("Unsupported HTTP content type: {0}")]
    UnsupportedContentType(String),

    #[error("Unsupported callback payload: {0}")]
    UnsupportedPayload(String),

    #[error("Unsupported source mode: {0}")]
    UnsupportedSourceMode(String),

    #[error("Unsupported media format: {0}")]
    UnsupportedMediaFormat(String),

    #[error("Too many redirects (limit {limit})")]
    RedirectLimitExceeded { limit: u32 },

    #[error("Remote endpoint rejected delivery with status {status}: {body}")]
    RemoteRejection { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Storage write error: {0}")]
    StorageWrite(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl Error {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
