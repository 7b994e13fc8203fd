//! Model error type.

use thiserror::Error;

/// Result type used across the job model.
pub type ModelResult<T> = Result<T, ModelError>;

/// Failure to interpret a value as part of the job model.
///
/// Keep this focused on parsing/validation of model values. Store and queue
/// failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Unknown job category name.
    #[error("unknown job category: {0}")]
    InvalidCategory(String),

    /// Unknown job status name.
    #[error("unknown job status: {0}")]
    InvalidStatus(String),

    /// A job key could not be used (empty, or carries a foreign prefix).
    #[error("invalid job key: {0}")]
    InvalidKey(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl ModelError {
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
