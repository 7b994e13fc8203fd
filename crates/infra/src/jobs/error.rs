//! Queue engine error taxonomy.

use quarry_core::JobCategory;

use crate::backend::BackendError;

/// Category label used when a lookup did not name one.
pub const NOT_SPECIFIED: &str = "not_specified";

/// Queue engine error.
///
/// Transient connection drops during a blocking fetch never surface here:
/// `fetch` reconnects and reports "no job" instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("job with key: {key} and category: {category} does not exist")]
    NotFound { key: String, category: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("not supported: {0}")]
    Unsupported(&'static str),

    #[error("invalid queue config: {0}")]
    Config(String),
}

impl QueueError {
    pub fn not_found(category: Option<JobCategory>, key: impl Into<String>) -> Self {
        Self::NotFound {
            key: key.into(),
            category: category.map_or_else(|| NOT_SPECIFIED.to_string(), |c| c.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound { .. })
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
