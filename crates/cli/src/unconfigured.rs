//! Collaborators used when the binary runs without a domain integration.
//!
//! Every call fails, so jobs are marked failed with a clear message instead
//! of silently succeeding.

use std::sync::Arc;

use quarry_core::{JobCategory, ListData, ListId, ProtocolRequest};
use quarry_infra::collaborators::{
    DispatchError, Dispatcher, HandlerKind, ListRepository, RepositoryError, SearchRequest,
};
use quarry_infra::workers::Collaborators;

#[derive(Debug, Default, Clone, Copy)]
pub struct Unconfigured;

impl Dispatcher for Unconfigured {
    fn dispatch_search(
        &self,
        _request: &SearchRequest,
        _handler: HandlerKind,
    ) -> Result<serde_json::Value, DispatchError> {
        Err(DispatchError::new("no dispatcher configured"))
    }

    fn dispatch_request(&self, _request: &ProtocolRequest) -> Result<serde_json::Value, DispatchError> {
        Err(DispatchError::new("no dispatcher configured"))
    }
}

impl ListRepository for Unconfigured {
    fn get_by_id(&self, _id: ListId) -> Result<ListData, RepositoryError> {
        Err(RepositoryError::Storage("no list repository configured".to_string()))
    }

    fn update_list(&self, _list: &ListData) -> Result<(), RepositoryError> {
        Err(RepositoryError::Storage("no list repository configured".to_string()))
    }

    fn add_digest(&self, _id: ListId, _category: JobCategory, _serialized_result: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Storage("no list repository configured".to_string()))
    }
}

pub fn unconfigured_collaborators() -> Collaborators {
    Collaborators::new(Arc::new(Unconfigured), Arc::new(Unconfigured))
}
