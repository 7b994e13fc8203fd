//! Protocol calls: forward a stored request to the dispatcher.

use std::sync::Arc;

use tracing::{debug, warn};

use quarry_core::{Job, JobCategory};

use super::worker::{TickOutcome, TickStrategy};
use crate::backend::Backend;
use crate::collaborators::{Dispatcher, ProcessingFailure};
use crate::jobs::{JobQueue, QueueError};

pub struct ProtocolCallStrategy {
    dispatcher: Arc<dyn Dispatcher>,
}

impl ProtocolCallStrategy {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { dispatcher }
    }

    fn call(&self, job: &Job) -> Result<String, ProcessingFailure> {
        let request = job
            .payload
            .as_request()
            .ok_or(ProcessingFailure::MissingPayload("protocol request"))?;
        let response = self.dispatcher.dispatch_request(request)?;
        serde_json::to_string(&response).map_err(|e| ProcessingFailure::Result(e.to_string()))
    }
}

impl<B: Backend> TickStrategy<B> for ProtocolCallStrategy {
    fn on_tick(&mut self, queue: &JobQueue<B>) -> Result<TickOutcome, QueueError> {
        let Some(mut job) = queue.fetch(JobCategory::ProtocolCall)? else {
            return Ok(TickOutcome::Idle);
        };

        match self.call(&job) {
            Ok(response) => {
                debug!(job_key = %job.key, "protocol call completed");
                job.mark_done(response);
            }
            Err(failure) => {
                warn!(job_key = %job.key, error = %failure, "protocol call failed");
                job.mark_failed(failure.to_string());
            }
        }

        queue.update(&job)?;
        queue.release_from_processing(&job)?;
        Ok(TickOutcome::Processed)
    }
}
