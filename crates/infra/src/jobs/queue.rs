//! Queue engine: waiting/processing lists per category on top of the job store.
//!
//! ## Flow
//!
//! - `submit`: persist record (status `waiting`), LPUSH its reference
//! - `fetch`: BRPOPLPUSH waiting -> processing (one atomic move), load the
//!   record, persist status `in_progress`
//! - `release_from_processing`: LREM one reference once handling finished
//!
//! There is no transaction spanning these steps. A crash between the move
//! and the status write leaves the record saying `waiting` while its
//! reference sits in the processing list: delivery is at-least-once.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use quarry_core::{Job, JobCategory};

use super::error::QueueError;
use super::keys;
use super::store::JobStore;
use crate::backend::{Backend, BackendError};

/// Queue engine tuning.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Upper bound of one blocking fetch; zero blocks indefinitely.
    pub block_timeout: Duration,
    /// Expiry of worker registry entries; `None` stores bare markers.
    pub worker_ttl: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            block_timeout: Duration::from_secs(5),
            worker_ttl: Some(Duration::from_secs(60)),
        }
    }
}

impl QueueConfig {
    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }

    /// Check that a registered worker can keep its entry alive.
    ///
    /// A blocking fetch holds the store connection, so a heartbeat refresh
    /// may wait up to `block_timeout` and must still land within the TTL.
    pub fn validate(&self) -> Result<(), QueueError> {
        let Some(ttl) = self.worker_ttl else {
            return Ok(());
        };
        if ttl.is_zero() {
            return Err(QueueError::Config("worker TTL must be positive".to_string()));
        }
        if self.block_timeout.is_zero() || self.block_timeout * 2 >= ttl {
            return Err(QueueError::Config(format!(
                "block timeout {:?} must be positive and under half the worker TTL {:?}",
                self.block_timeout, ttl
            )));
        }
        Ok(())
    }

    pub fn with_worker_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.worker_ttl = ttl;
        self
    }
}

/// Job queue over a shared store.
#[derive(Debug, Clone)]
pub struct JobQueue<B> {
    store: JobStore<B>,
    config: QueueConfig,
}

impl<B: Backend> JobQueue<B> {
    pub fn new(backend: B, config: QueueConfig) -> Self {
        Self {
            store: JobStore::new(backend),
            config,
        }
    }

    pub fn store(&self) -> &JobStore<B> {
        &self.store
    }

    pub fn backend(&self) -> &B {
        self.store.backend()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Persist a job and push it onto its category's waiting list.
    #[instrument(skip(self, job), fields(category = %job.category, job_key = %job.key), err)]
    pub fn submit(&self, job: &mut Job) -> Result<(), QueueError> {
        self.push_to_waiting(job)?;
        debug!("job submitted");
        Ok(())
    }

    /// Submit several jobs. Each is enqueued independently; on error, jobs
    /// before the failing one stay queued.
    pub fn submit_all(&self, jobs: &mut [Job]) -> Result<(), QueueError> {
        jobs.iter_mut().try_for_each(|job| self.submit(job))
    }

    /// Push an existing (typically finished) job back onto the waiting list.
    #[instrument(skip(self, job), fields(category = %job.category, job_key = %job.key), err)]
    pub fn requeue(&self, job: &mut Job) -> Result<(), QueueError> {
        let previous = job.status;
        self.push_to_waiting(job)?;
        info!(%previous, "job requeued");
        Ok(())
    }

    /// The enqueue primitive: status `waiting`, persist, LPUSH the reference.
    pub fn push_to_waiting(&self, job: &mut Job) -> Result<(), QueueError> {
        job.mark_waiting();
        self.store.put(job)?;
        self.backend().lpush(
            &keys::waiting_list(job.category),
            &keys::job_key(job.category, &job.key),
        )?;
        Ok(())
    }

    /// Take the next job of `category`, moving it to the processing list.
    ///
    /// Returns `Ok(None)` when the wait times out or the connection dropped
    /// (after reconnecting); callers simply loop.
    pub fn fetch(&self, category: JobCategory) -> Result<Option<Job>, QueueError> {
        let waiting = keys::waiting_list(category);
        let processing = keys::processing_list(category);

        let reference =
            match self
                .backend()
                .brpoplpush(&waiting, &processing, self.config.block_timeout)
            {
                Ok(Some(reference)) => reference,
                Ok(None) => return Ok(None),
                Err(BackendError::Connection(reason)) => {
                    warn!(%category, %reason, "connection lost while waiting for a job; reconnecting");
                    if let Err(err) = self.backend().reconnect() {
                        warn!(%category, error = %err, "reconnect failed; will retry lazily");
                    }
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            };

        let mut job = match self.store.get(Some(category), &reference) {
            Ok(job) => job,
            Err(err) => {
                if err.is_not_found() {
                    // The record was removed (e.g. reaped) while referenced.
                    self.backend().lrem(&processing, 1, &reference)?;
                }
                warn!(%category, %reference, error = %err, "fetched reference has no usable record");
                return Err(err);
            }
        };

        job.mark_in_progress();
        self.store.put(&job)?;
        debug!(%category, job_key = %job.key, "job fetched");
        Ok(Some(job))
    }

    /// Remove exactly one reference to `job` from its processing list.
    pub fn release_from_processing(&self, job: &Job) -> Result<(), QueueError> {
        let removed = self.backend().lrem(
            &keys::processing_list(job.category),
            1,
            &keys::job_key(job.category, &job.key),
        )?;
        if removed == 0 {
            debug!(category = %job.category, job_key = %job.key, "job was not in processing list");
        }
        Ok(())
    }

    /// Re-persist a record without touching either list.
    pub fn update(&self, job: &Job) -> Result<(), QueueError> {
        self.store.put(job)
    }

    /// Delete the stored record only. References must already be released.
    pub fn remove(&self, job: &Job) -> Result<(), QueueError> {
        self.store.delete(job.category, &job.key)
    }

    /// Requeue in-progress jobs that outlived a liveness window.
    ///
    /// Not implemented: stalled in-progress jobs are only ever removed by the
    /// pool controller's age-based reaper. Completed jobs are requeued by the
    /// rescheduler.
    pub fn requeue_stale(&self, _window: Duration) -> Result<usize, QueueError> {
        Err(QueueError::Unsupported(
            "requeue of stalled in-progress jobs",
        ))
    }

    pub fn waiting_len(&self, category: JobCategory) -> Result<usize, QueueError> {
        Ok(self.backend().llen(&keys::waiting_list(category))?)
    }

    pub fn processing_len(&self, category: JobCategory) -> Result<usize, QueueError> {
        Ok(self.backend().llen(&keys::processing_list(category))?)
    }

    pub fn ping(&self) -> Result<(), QueueError> {
        Ok(self.backend().ping()?)
    }

    pub fn close(&self) {
        self.backend().close();
    }

    /// Every stored job.
    pub fn all_jobs(&self) -> Result<Vec<Job>, QueueError> {
        self.scan(&format!("{}{}*", keys::JOB_PREFIX, keys::DIVIDER))
    }

    /// Jobs whose `<category>-<key>` part starts with `prefix`.
    pub fn all_jobs_by_category_prefix(&self, prefix: &str) -> Result<Vec<Job>, QueueError> {
        self.scan(&format!("{}{}{prefix}*", keys::JOB_PREFIX, keys::DIVIDER))
    }

    /// Jobs whose key ends with `suffix`.
    pub fn all_jobs_by_suffix(&self, suffix: &str) -> Result<Vec<Job>, QueueError> {
        self.scan(&format!("{}{}*{suffix}", keys::JOB_PREFIX, keys::DIVIDER))
    }

    /// Every job of one category.
    pub fn jobs_for(&self, category: JobCategory) -> Result<Vec<Job>, QueueError> {
        self.all_jobs_by_category_prefix(&format!("{category}{}", keys::DIVIDER))
    }

    /// Load every record matching `pattern`.
    ///
    /// Not a snapshot: records may vanish between listing and loading. The
    /// first record that cannot be loaded aborts the scan.
    fn scan(&self, pattern: &str) -> Result<Vec<Job>, QueueError> {
        let found = self.backend().keys(pattern)?;
        let mut jobs = Vec::with_capacity(found.len());

        for key in found {
            match self.store.get(None, &key) {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    warn!(%pattern, %key, error = %err, "scan aborted");
                    return Err(match err {
                        QueueError::Serialization(_) => QueueError::not_found(None, key),
                        other => other,
                    });
                }
            }
        }

        Ok(jobs)
    }
}
