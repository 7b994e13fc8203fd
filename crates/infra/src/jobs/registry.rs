//! Worker registry: one `worker-<category>-<name>` marker per live worker.
//!
//! Entries are polled, not pushed. Deleting an entry is how a worker is
//! asked to stop; it notices on its next loop iteration. With a configured
//! TTL, entries of crashed workers expire on their own.

use tracing::{debug, info};

use quarry_core::JobCategory;

use super::error::QueueError;
use super::keys;
use super::queue::JobQueue;
use crate::backend::Backend;

const MARKER: &str = "1";

impl<B: Backend> JobQueue<B> {
    /// Create (or re-create) the registry entry of a worker.
    pub fn register_worker(&self, category: JobCategory, name: &str) -> Result<(), QueueError> {
        let key = keys::worker_key(category, name);
        match self.config().worker_ttl {
            Some(ttl) => self.backend().set_with_ttl(&key, MARKER, ttl)?,
            None => self.backend().set(&key, MARKER)?,
        }
        debug!(%category, worker = name, "worker registered");
        Ok(())
    }

    pub fn deregister_worker(&self, category: JobCategory, name: &str) -> Result<(), QueueError> {
        self.backend().delete(&keys::worker_key(category, name))?;
        debug!(%category, worker = name, "worker deregistered");
        Ok(())
    }

    pub fn worker_exists(&self, category: JobCategory, name: &str) -> Result<bool, QueueError> {
        Ok(self.backend().exists(&keys::worker_key(category, name))?)
    }

    /// Liveness check used by the worker loop.
    ///
    /// With a TTL, also pushes the entry's expiry forward. An entry that was
    /// deleted is never recreated.
    pub fn touch_worker(&self, category: JobCategory, name: &str) -> Result<bool, QueueError> {
        let key = keys::worker_key(category, name);
        let alive = match self.config().worker_ttl {
            Some(ttl) => self.backend().expire(&key, ttl)?,
            None => self.backend().exists(&key)?,
        };
        Ok(alive)
    }

    /// Registry keys of every worker of `category`.
    pub fn list_workers(&self, category: JobCategory) -> Result<Vec<String>, QueueError> {
        Ok(self.backend().keys(&keys::worker_pattern(category))?)
    }

    /// Registry keys of every worker.
    pub fn list_all_workers(&self) -> Result<Vec<String>, QueueError> {
        Ok(self.backend().keys(&keys::all_workers_pattern())?)
    }

    /// Remove one registry entry of `category`, chosen without any ordering
    /// guarantee (the last key of a pattern scan).
    ///
    /// Only the marker is deleted; the worker exits on its next iteration.
    pub fn remove_arbitrary_worker(&self, category: JobCategory) -> Result<Option<String>, QueueError> {
        let Some(victim) = self.list_workers(category)?.pop() else {
            return Ok(None);
        };
        self.backend().delete(&victim)?;
        info!(%category, worker = %victim, "worker asked to stop");
        Ok(Some(victim))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::jobs::QueueConfig;

    #[test]
    fn register_list_and_deregister() {
        let queue = JobQueue::new(InMemoryBackend::new(), QueueConfig::default());
        queue.register_worker(JobCategory::Tweet, "a").unwrap();
        queue.register_worker(JobCategory::Tweet, "b").unwrap();
        queue.register_worker(JobCategory::Content, "c").unwrap();

        assert!(queue.worker_exists(JobCategory::Tweet, "a").unwrap());
        assert_eq!(queue.list_workers(JobCategory::Tweet).unwrap().len(), 2);
        assert_eq!(queue.list_all_workers().unwrap().len(), 3);

        queue.deregister_worker(JobCategory::Tweet, "a").unwrap();
        assert!(!queue.worker_exists(JobCategory::Tweet, "a").unwrap());
        assert_eq!(
            queue.list_workers(JobCategory::Tweet).unwrap(),
            vec!["worker-tweet-b".to_string()]
        );
    }

    #[test]
    fn remove_arbitrary_worker_only_touches_its_category() {
        let queue = JobQueue::new(InMemoryBackend::new(), QueueConfig::default());
        queue.register_worker(JobCategory::Content, "c").unwrap();
        assert_eq!(queue.remove_arbitrary_worker(JobCategory::Tweet).unwrap(), None);

        queue.register_worker(JobCategory::Tweet, "t").unwrap();
        assert_eq!(
            queue.remove_arbitrary_worker(JobCategory::Tweet).unwrap().as_deref(),
            Some("worker-tweet-t")
        );
        assert!(queue.worker_exists(JobCategory::Content, "c").unwrap());
    }

    #[test]
    fn entries_expire_unless_touched() {
        let ttl = Duration::from_millis(150);
        let queue = JobQueue::new(
            InMemoryBackend::new(),
            QueueConfig::default().with_worker_ttl(Some(ttl)),
        );
        queue.register_worker(JobCategory::Tweet, "alive").unwrap();
        queue.register_worker(JobCategory::Tweet, "crashed").unwrap();

        for _ in 0..5 {
            std::thread::sleep(Duration::from_millis(50));
            assert!(queue.touch_worker(JobCategory::Tweet, "alive").unwrap());
        }
        assert!(!queue.worker_exists(JobCategory::Tweet, "crashed").unwrap());
    }

    #[test]
    fn touch_does_not_resurrect_removed_entries() {
        let queue = JobQueue::new(InMemoryBackend::new(), QueueConfig::default());
        queue.register_worker(JobCategory::Tweet, "w").unwrap();
        queue.deregister_worker(JobCategory::Tweet, "w").unwrap();
        assert!(!queue.touch_worker(JobCategory::Tweet, "w").unwrap());
        assert!(!queue.worker_exists(JobCategory::Tweet, "w").unwrap());
    }

    #[test]
    fn bare_markers_without_ttl() {
        let queue = JobQueue::new(
            InMemoryBackend::new(),
            QueueConfig::default().with_worker_ttl(None),
        );
        queue.register_worker(JobCategory::Reliability, "ctl").unwrap();
        assert!(queue.touch_worker(JobCategory::Reliability, "ctl").unwrap());
    }
}
