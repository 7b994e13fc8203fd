//! Rescheduler: puts finished list jobs back in line once their refresh
//! interval has elapsed.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use quarry_core::{Job, JobStatus};

use super::worker::{TickOutcome, TickStrategy};
use crate::backend::Backend;
use crate::jobs::{JobQueue, QueueError};

pub const DEFAULT_RESCHEDULE_INTERVAL: Duration = Duration::from_secs(60);

fn refresh_due(job: &Job, now: DateTime<Utc>) -> bool {
    job.status == JobStatus::Done && job.list_data().is_some_and(|list| list.refresh_due(now))
}

/// Requeue every done job whose list is due at `now`. Returns how many were
/// pushed back to waiting.
///
/// Failed and in-flight jobs are left alone, as are jobs without list data.
pub fn sweep<B: Backend>(queue: &JobQueue<B>, now: DateTime<Utc>) -> Result<usize, QueueError> {
    let mut requeued = 0;

    for mut job in queue.all_jobs()? {
        if !refresh_due(&job, now) {
            continue;
        }
        queue.push_to_waiting(&mut job)?;
        debug!(category = %job.category, job_key = %job.key, "job rescheduled");
        requeued += 1;
    }

    if requeued > 0 {
        info!(requeued, "due jobs rescheduled");
    }
    Ok(requeued)
}

/// Tick strategy of the `rescheduler` category.
#[derive(Debug, Clone)]
pub struct ReschedulerStrategy {
    interval: Duration,
}

impl ReschedulerStrategy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for ReschedulerStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_RESCHEDULE_INTERVAL)
    }
}

impl<B: Backend> TickStrategy<B> for ReschedulerStrategy {
    fn on_tick(&mut self, queue: &JobQueue<B>) -> Result<TickOutcome, QueueError> {
        sweep(queue, Utc::now())?;
        thread::sleep(self.interval);
        Ok(TickOutcome::Idle)
    }
}
