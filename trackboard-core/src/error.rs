use std::time::Duration;
use thiserror::Error;

/// Failure producing a new dataset.
///
/// Cloneable so one in-flight refresh can hand the same outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Refresh task aborted: {0}")]
    Aborted(String),
}

/// Read or write against a cache backend failed
#[derive(Debug, Error)]
pub enum CacheIoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Failure surfaced by the read path
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    /// The refresh failed and there was nothing cached to fall back on
    #[error("No data available: {reason}")]
    NoDataAvailable { reason: FetchError },
}

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;
