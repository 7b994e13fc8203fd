//! Pool controller: keeps one category's worker count at a target and reaps
//! jobs past a maximum age.
//!
//! Several controllers may run at once without coordination. Duplicate
//! scale actions are possible and correct themselves on later ticks.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use quarry_core::JobCategory;

use super::supervisor::ProcessSupervisor;
use super::worker::{TickOutcome, TickStrategy, new_worker_name};
use crate::backend::Backend;
use crate::jobs::{JobQueue, QueueError};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);
pub const DEFAULT_CONTROL_INTERVAL: Duration = Duration::from_secs(30);

/// What one `confirm_workers` call did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScaleReport {
    /// Live registry entries seen before acting.
    pub observed: usize,
    pub spawned: usize,
    pub spawn_failures: usize,
    pub removed: usize,
}

/// Delete every job of `category` older than `max_age`, whatever its status.
///
/// In-progress jobs are deleted too. Their references stay in the
/// processing list until the owning worker releases them.
pub fn clean_jobs<B: Backend>(
    queue: &JobQueue<B>,
    max_age: Duration,
    category: JobCategory,
) -> Result<usize, QueueError> {
    let now = Utc::now();
    let mut reaped = 0;

    for job in queue.jobs_for(category)? {
        let expired = job
            .age(now)
            .to_std()
            .is_ok_and(|age| age > max_age);
        if expired {
            queue.remove(&job)?;
            debug!(%category, job_key = %job.key, status = %job.status, "job reaped");
            reaped += 1;
        }
    }

    if reaped > 0 {
        info!(%category, reaped, "expired jobs removed");
    }
    Ok(reaped)
}

/// Move the number of registered workers of `category` toward `desired`.
///
/// Scale-up spawns detached workers with fresh names; scale-down deletes
/// registry entries and lets their workers exit on their next iteration.
/// Spawn failures are logged and counted, never raised.
pub fn confirm_workers<B: Backend>(
    queue: &JobQueue<B>,
    supervisor: &dyn ProcessSupervisor,
    desired: usize,
    category: JobCategory,
) -> Result<ScaleReport, QueueError> {
    let observed = queue.list_workers(category)?.len();
    let mut report = ScaleReport {
        observed,
        ..ScaleReport::default()
    };

    if observed < desired {
        for _ in observed..desired {
            let name = new_worker_name();
            match supervisor.spawn(category, &name) {
                Ok(handle) => {
                    debug!(%category, worker = %handle.name, pid = ?handle.pid, "worker spawned");
                    report.spawned += 1;
                }
                Err(err) => {
                    warn!(%category, worker = %name, error = %err, "worker spawn failed");
                    report.spawn_failures += 1;
                }
            }
        }
    } else {
        for _ in desired..observed {
            if queue.remove_arbitrary_worker(category)?.is_none() {
                break;
            }
            report.removed += 1;
        }
    }

    if report.spawned + report.removed + report.spawn_failures > 0 {
        info!(
            %category,
            observed,
            desired,
            spawned = report.spawned,
            removed = report.removed,
            spawn_failures = report.spawn_failures,
            "worker pool adjusted"
        );
    }
    Ok(report)
}

/// Tick strategy of the `reliability` category: one managed category per
/// controller.
pub struct PoolControllerStrategy {
    managed: JobCategory,
    desired: usize,
    max_age: Duration,
    interval: Duration,
    supervisor: Arc<dyn ProcessSupervisor>,
}

impl PoolControllerStrategy {
    pub fn new(managed: JobCategory, desired: usize, supervisor: Arc<dyn ProcessSupervisor>) -> Self {
        Self {
            managed,
            desired,
            max_age: DEFAULT_MAX_AGE,
            interval: DEFAULT_CONTROL_INTERVAL,
            supervisor,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn managed(&self) -> JobCategory {
        self.managed
    }
}

impl<B: Backend> TickStrategy<B> for PoolControllerStrategy {
    fn on_tick(&mut self, queue: &JobQueue<B>) -> Result<TickOutcome, QueueError> {
        if let Err(err) = clean_jobs(queue, self.max_age, self.managed) {
            warn!(category = %self.managed, error = %err, "job reaping failed");
        }

        confirm_workers(queue, self.supervisor.as_ref(), self.desired, self.managed)?;

        thread::sleep(self.interval);
        Ok(TickOutcome::Idle)
    }
}
