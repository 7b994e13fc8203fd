//! Boundaries to the domain: search/report dispatch and the list repository.
//!
//! The queue never interprets results; it stores whatever the dispatcher
//! returns (as JSON text) or the failure message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quarry_core::{JobCategory, ListData, ListId, ProfileListId, ProtocolRequest};

/// Report flavour computed for a list-refresh category.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Community,
    MostRetweeted,
    TopContent,
}

impl HandlerKind {
    pub fn for_category(category: JobCategory) -> Option<Self> {
        match category {
            JobCategory::Influencer => Some(HandlerKind::Community),
            JobCategory::Tweet => Some(HandlerKind::MostRetweeted),
            JobCategory::Content => Some(HandlerKind::TopContent),
            _ => None,
        }
    }
}

/// Search request shape expected by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum SearchRequest {
    Keyword {
        keywords: Vec<String>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    ProfileList {
        profile_list_id: ProfileListId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl SearchRequest {
    /// Private lists search by keyword; public lists by their profile list.
    pub fn for_list(list: &ListData, now: DateTime<Utc>) -> Result<Self, ProcessingFailure> {
        let (from, to) = list.window(now);

        if list.private {
            return Ok(SearchRequest::Keyword {
                keywords: list.keywords.clone(),
                from,
                to,
            });
        }

        let profile_list_id = list
            .profile_list_id
            .ok_or(ProcessingFailure::MissingProfileList(list.id))?;

        Ok(SearchRequest::ProfileList {
            profile_list_id,
            from,
            to,
        })
    }
}

/// Failure reported by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DispatchError {
    pub message: String,
}

impl DispatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by the list repository.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("list not found: {0}")]
    NotFound(ListId),

    #[error("repository error: {0}")]
    Storage(String),
}

/// Anything that makes a single job fail without stopping its worker.
///
/// The message becomes the job's result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingFailure {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("public list {0} has no profile list")]
    MissingProfileList(ListId),

    #[error("job carries no {0} payload")]
    MissingPayload(&'static str),

    #[error("result could not be serialized: {0}")]
    Result(String),
}

/// Executes the domain work for a job. May be slow and may fail; failures
/// are recorded on the job, never retried here.
pub trait Dispatcher: Send + Sync {
    fn dispatch_search(
        &self,
        request: &SearchRequest,
        handler: HandlerKind,
    ) -> Result<serde_json::Value, DispatchError>;

    fn dispatch_request(&self, request: &ProtocolRequest) -> Result<serde_json::Value, DispatchError>;
}

/// Authoritative source of list data.
pub trait ListRepository: Send + Sync {
    fn get_by_id(&self, id: ListId) -> Result<ListData, RepositoryError>;

    fn update_list(&self, list: &ListData) -> Result<(), RepositoryError>;

    /// Store a computed report for a list.
    fn add_digest(
        &self,
        id: ListId,
        category: JobCategory,
        serialized_result: &str,
    ) -> Result<(), RepositoryError>;
}
