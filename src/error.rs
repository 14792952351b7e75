//! Error types shared by the widget, its HTTP backend and the server.

use thiserror::Error;

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// Filesystem error (uploads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The language model could not produce a reply.
    #[error("LLM error: {0}")]
    Llm(String),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
