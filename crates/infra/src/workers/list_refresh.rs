//! List refresh: recompute a monitored list's report.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use quarry_core::{Job, JobCategory, ListData};

use super::worker::{TickOutcome, TickStrategy};
use crate::backend::Backend;
use crate::collaborators::{Dispatcher, HandlerKind, ListRepository, ProcessingFailure, SearchRequest};
use crate::jobs::{JobQueue, QueueError};

/// Tick strategy for the list-refresh categories.
///
/// Per job: refresh the list from the repository, search, record the digest.
/// Collaborator failures mark the job failed and never stop the worker.
pub struct ListRefreshStrategy {
    category: JobCategory,
    handler: HandlerKind,
    dispatcher: Arc<dyn Dispatcher>,
    repository: Arc<dyn ListRepository>,
}

impl ListRefreshStrategy {
    /// Returns `None` for categories that do not carry list data.
    pub fn new(
        category: JobCategory,
        dispatcher: Arc<dyn Dispatcher>,
        repository: Arc<dyn ListRepository>,
    ) -> Option<Self> {
        Some(Self {
            category,
            handler: HandlerKind::for_category(category)?,
            dispatcher,
            repository,
        })
    }

    /// Fresh list data, search, digest. Leaves the refreshed list in `list`
    /// and returns the serialized result.
    fn refresh(&self, list: &mut ListData, ran_at: DateTime<Utc>) -> Result<String, ProcessingFailure> {
        *list = self.repository.get_by_id(list.id)?;

        let request = SearchRequest::for_list(list, ran_at)?;
        let result = self.dispatcher.dispatch_search(&request, self.handler)?;
        let serialized =
            serde_json::to_string(&result).map_err(|e| ProcessingFailure::Result(e.to_string()))?;

        list.last_updated = ran_at;
        self.repository.update_list(list)?;
        self.repository.add_digest(list.id, self.category, &serialized)?;

        Ok(serialized)
    }

    fn process<B: Backend>(&self, queue: &JobQueue<B>, job: &mut Job) -> Result<(), QueueError> {
        let Some(mut list) = job.list_data().cloned() else {
            warn!(job_key = %job.key, "list job without list data");
            job.mark_failed(ProcessingFailure::MissingPayload("list").to_string());
            return queue.update(job);
        };
        let ran_at = Utc::now();

        match self.refresh(&mut list, ran_at) {
            Ok(result) => {
                job.update_list_data(list);
                job.mark_done(result);
                debug!(job_key = %job.key, "list refreshed");
            }
            Err(failure) => {
                warn!(job_key = %job.key, error = %failure, "list refresh failed");
                list.last_updated = ran_at;
                if let Err(err) = self.repository.update_list(&list) {
                    warn!(job_key = %job.key, error = %err, "could not record failed refresh");
                }
                job.update_list_data(list);
                job.mark_failed(failure.to_string());
            }
        }

        queue.update(job)
    }
}

impl<B: Backend> TickStrategy<B> for ListRefreshStrategy {
    fn on_tick(&mut self, queue: &JobQueue<B>) -> Result<TickOutcome, QueueError> {
        let Some(mut job) = queue.fetch(self.category)? else {
            return Ok(TickOutcome::Idle);
        };

        self.process(queue, &mut job)?;
        queue.release_from_processing(&job)?;
        Ok(TickOutcome::Processed)
    }
}
