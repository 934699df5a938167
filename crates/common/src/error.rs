//! Common error types for connectivity monitor components.

use std::fmt;

/// A specialized Result type for connectivity monitor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for connectivity monitor operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new malformed record error.
    pub fn malformed(msg: impl fmt::Display) -> Self {
        Error::MalformedRecord(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new transport error.
    pub fn transport(msg: impl fmt::Display) -> Self {
        Error::Transport(msg.to_string())
    }

    /// Whether this error came from an unparsable log line.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedRecord(_))
    }
}
