//! The worker loop shared by every category.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{Span, debug, error, info, info_span, warn};
use uuid::Uuid;

use quarry_core::JobCategory;

use crate::backend::Backend;
use crate::jobs::{JobQueue, QueueError};

/// What one tick did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A job was handled (successfully or not); counts toward the quota.
    Processed,
    /// Nothing to do this time (timeout, reconnect, control sweep).
    Idle,
}

/// Category-specific step run once per loop iteration.
///
/// Job-level failures must be recorded on the job and reported as
/// `Processed`. An `Err` terminates the worker.
pub trait TickStrategy<B: Backend>: Send {
    fn on_tick(&mut self, queue: &JobQueue<B>) -> Result<TickOutcome, QueueError>;
}

/// Generate a default worker name.
pub fn new_worker_name() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A registered consumer of one category.
///
/// `unregistered -> registered/consuming -> deregistered`. Stopping is
/// cooperative: the registry entry is checked once per iteration, so a tick
/// in flight (including a blocking fetch) always completes first.
pub struct Worker<B: Backend> {
    name: String,
    category: JobCategory,
    queue: JobQueue<B>,
    strategy: Box<dyn TickStrategy<B>>,
    processed: u64,
}

impl<B: Backend> Worker<B> {
    pub fn new(
        name: Option<String>,
        category: JobCategory,
        queue: JobQueue<B>,
        strategy: Box<dyn TickStrategy<B>>,
    ) -> Self {
        Self {
            name: name.unwrap_or_else(new_worker_name),
            category,
            queue,
            strategy,
            processed: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> JobCategory {
        self.category
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn queue(&self) -> &JobQueue<B> {
        &self.queue
    }

    /// Register, run ticks until `max_jobs` are processed (or forever when
    /// `None`) or the registry entry disappears, then deregister.
    ///
    /// With a registry TTL, a heartbeat thread keeps the entry alive while a
    /// tick runs, however long the tick takes.
    ///
    /// Returns the number of processed jobs. An error from a tick stops the
    /// loop and is returned after a best-effort deregistration.
    pub fn consume(&mut self, max_jobs: Option<u64>) -> Result<u64, QueueError> {
        let span = info_span!("worker", category = %self.category, worker = %self.name);
        let _entered = span.enter();

        self.queue.config().validate()?;
        self.queue.register_worker(self.category, &self.name)?;
        info!(max_jobs = ?max_jobs, "worker started");

        let Self {
            name,
            category,
            queue,
            strategy,
            processed,
        } = self;
        let category = *category;

        let outcome = match queue.config().worker_ttl {
            Some(ttl) => thread::scope(|scope| {
                let (stop_tx, stop_rx) = mpsc::channel::<()>();
                let heartbeat_span = Span::current();
                let (queue, name) = (&*queue, name.as_str());
                scope.spawn(move || {
                    let _entered = heartbeat_span.enter();
                    heartbeat(queue, category, name, heartbeat_period(ttl), stop_rx);
                });

                let outcome = run(queue, category, name, strategy.as_mut(), processed, max_jobs);
                drop(stop_tx);
                outcome
            }),
            None => run(queue, category, name.as_str(), strategy.as_mut(), processed, max_jobs),
        };

        if let Err(err) = self.queue.deregister_worker(self.category, &self.name) {
            warn!(error = %err, "could not deregister worker");
        }
        match &outcome {
            Ok(processed) => info!(processed, "worker stopped"),
            Err(err) => error!(error = %err, processed = self.processed, "worker terminated"),
        }

        self.queue.close();
        outcome
    }
}

fn run<B: Backend>(
    queue: &JobQueue<B>,
    category: JobCategory,
    name: &str,
    strategy: &mut dyn TickStrategy<B>,
    processed: &mut u64,
    max_jobs: Option<u64>,
) -> Result<u64, QueueError> {
    loop {
        if max_jobs.is_some_and(|max| *processed >= max) {
            info!("job quota reached");
            break;
        }

        if !queue.touch_worker(category, name)? {
            info!("registry entry removed; stopping");
            break;
        }

        if strategy.on_tick(queue)? == TickOutcome::Processed {
            *processed += 1;
        }
    }

    Ok(*processed)
}

/// Three refreshes per TTL, so one slow refresh does not let the entry lapse.
fn heartbeat_period(ttl: Duration) -> Duration {
    (ttl / 3).max(Duration::from_millis(1))
}

/// Refresh the registry entry every `period` until `stop` fires or hangs up.
///
/// Stops on its own once the entry is gone: refreshing never recreates it.
fn heartbeat<B: Backend>(
    queue: &JobQueue<B>,
    category: JobCategory,
    name: &str,
    period: Duration,
    stop: mpsc::Receiver<()>,
) {
    while let Err(RecvTimeoutError::Timeout) = stop.recv_timeout(period) {
        match queue.touch_worker(category, name) {
            Ok(true) => {}
            Ok(false) => {
                debug!("registry entry gone; heartbeat stopped");
                return;
            }
            Err(err) => warn!(error = %err, "registry heartbeat failed"),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Worker<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("processed", &self.processed)
            .finish_non_exhaustive()
    }
}
