//! Error types for directory endpoint operations.

use thiserror::Error;

/// Error type for all directory client operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Network or transport-level HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The directory returned a non-success HTTP status.
    #[error("Directory error: {status} - {message}")]
    Api {
        /// The HTTP status code returned by the endpoint.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint could not be reached when building the client.
    #[error("Connect error: {0}")]
    Connect(String),

    /// The export stream delivered data that could not be decoded.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The configured address cannot be turned into an endpoint URL.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Convenience Result type alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
