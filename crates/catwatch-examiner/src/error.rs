//! Error types for the examiner.

use catwatch_storage::StorageError;
use thiserror::Error;

/// Examiner error type.
#[derive(Debug, Error)]
pub enum ExaminerError {
    /// HTTP request to a local or cloud service failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A confirmation source answered with unusable data.
    #[error("Source error: {0}")]
    Source(String),

    /// An external call did not finish in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type for examiner operations.
pub type Result<T> = std::result::Result<T, ExaminerError>;
