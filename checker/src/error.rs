//! Checker error types

use shared::SharedError;
use thiserror::Error;

/// Result type for checker operations
pub type CheckerResult<T> = Result<T, CheckerError>;

/// Errors that escape the pipeline boundary.
///
/// Lookup failures are not represented here: they are classified per
/// identifier and end up in the run report instead.
#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("File operation failed: {operation} on {path}")]
    FileError { operation: String, path: String },

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CheckerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }
}
