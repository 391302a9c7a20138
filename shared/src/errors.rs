//! Shared error types for the bridge account checker

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Invalid identifier: {input:?}")]
    InvalidIdentifier { input: String },

    #[error("Unknown direction: {input}")]
    UnknownDirection { input: String },

    #[error("Unknown rotation strategy: {input}")]
    UnknownStrategy { input: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
