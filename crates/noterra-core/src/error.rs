//! Error types for noterra.

use thiserror::Error;

/// Result type alias using noterra's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for noterra operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found. Also used for cross-owner access so that
    /// "belongs to someone else" is indistinguishable from "never existed".
    #[error("Not found: {0}")]
    NotFound(String),

    /// No valid session or API credential on the request.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Malformed input shape (e.g. attaching foreign notes to a context).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Model returned output that failed extraction or verification.
    #[error("Malformed model output: {0}")]
    ModelOutput(String),

    /// No balanced JSON object could be located in model output.
    #[error("No JSON object found in text")]
    NoJsonFound,

    /// Model or transport error during generation.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
