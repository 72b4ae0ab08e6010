//! Error types for Trackboard SDK

use thiserror::Error;

/// Result type alias for Trackboard SDK operations
pub type Result<T> = std::result::Result<T, TrackboardError>;

/// Trackboard SDK error types
#[derive(Error, Debug)]
pub enum TrackboardError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Token cannot be sent as a header
    #[error("Invalid auth token: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    /// Missing or rejected bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server had no chart to serve and could not build one
    #[error("Chart unavailable: {0}")]
    Unavailable(String),

    /// Any other non-success response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
}
