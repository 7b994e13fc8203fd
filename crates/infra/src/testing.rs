//! Test doubles for the domain collaborators and the process supervisor.

use std::collections::HashMap;
use std::sync::Mutex;

use quarry_core::{JobCategory, ListData, ListId, ProtocolRequest};

use crate::collaborators::{DispatchError, Dispatcher, HandlerKind, ListRepository, RepositoryError, SearchRequest};
use crate::workers::{ProcessHandle, ProcessSupervisor, SpawnError};

/// Dispatcher returning one canned outcome and recording every call.
pub struct FakeDispatcher {
    outcome: Result<serde_json::Value, DispatchError>,
    searches: Mutex<Vec<(SearchRequest, HandlerKind)>>,
    requests: Mutex<Vec<ProtocolRequest>>,
}

impl FakeDispatcher {
    pub fn succeeding(result: serde_json::Value) -> Self {
        Self::with_outcome(Ok(result))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_outcome(Err(DispatchError::new(message)))
    }

    fn with_outcome(outcome: Result<serde_json::Value, DispatchError>) -> Self {
        Self {
            outcome,
            searches: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn searches(&self) -> Vec<(SearchRequest, HandlerKind)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<ProtocolRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Dispatcher for FakeDispatcher {
    fn dispatch_search(
        &self,
        request: &SearchRequest,
        handler: HandlerKind,
    ) -> Result<serde_json::Value, DispatchError> {
        self.searches.lock().unwrap().push((request.clone(), handler));
        self.outcome.clone()
    }

    fn dispatch_request(&self, request: &ProtocolRequest) -> Result<serde_json::Value, DispatchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone()
    }
}

/// In-memory list repository.
#[derive(Default)]
pub struct FakeRepository {
    lists: Mutex<HashMap<ListId, ListData>>,
    digests: Mutex<Vec<(ListId, JobCategory, String)>>,
    updates: Mutex<usize>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, list: ListData) {
        self.lists.lock().unwrap().insert(list.id, list);
    }

    pub fn get(&self, id: ListId) -> Option<ListData> {
        self.lists.lock().unwrap().get(&id).cloned()
    }

    pub fn digests(&self) -> Vec<(ListId, JobCategory, String)> {
        self.digests.lock().unwrap().clone()
    }

    pub fn updates(&self) -> usize {
        *self.updates.lock().unwrap()
    }
}

impl ListRepository for FakeRepository {
    fn get_by_id(&self, id: ListId) -> Result<ListData, RepositoryError> {
        self.get(id).ok_or(RepositoryError::NotFound(id))
    }

    fn update_list(&self, list: &ListData) -> Result<(), RepositoryError> {
        *self.updates.lock().unwrap() += 1;
        self.insert(list.clone());
        Ok(())
    }

    fn add_digest(
        &self,
        id: ListId,
        category: JobCategory,
        serialized_result: &str,
    ) -> Result<(), RepositoryError> {
        self.digests
            .lock()
            .unwrap()
            .push((id, category, serialized_result.to_string()));
        Ok(())
    }
}

/// Supervisor that records spawn requests without starting anything.
#[derive(Default)]
pub struct RecordingSupervisor {
    fail: bool,
    spawned: Mutex<Vec<(JobCategory, String)>>,
}

impl RecordingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn spawned(&self) -> Vec<(JobCategory, String)> {
        self.spawned.lock().unwrap().clone()
    }
}

impl ProcessSupervisor for RecordingSupervisor {
    fn spawn(&self, category: JobCategory, name: &str) -> Result<ProcessHandle, SpawnError> {
        if self.fail {
            return Err(SpawnError::Io(std::io::Error::other("spawn refused")));
        }
        self.spawned.lock().unwrap().push((category, name.to_string()));
        Ok(ProcessHandle {
            category,
            name: name.to_string(),
            pid: None,
        })
    }
}
