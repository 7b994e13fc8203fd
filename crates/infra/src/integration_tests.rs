//! Integration tests for the full job pipeline.
//!
//! Tests: submit -> fetch -> strategy -> release, plus the control loops
//!
//! Verifies:
//! - A job in flight is owned by exactly one worker
//! - Statuses move forward under normal flow
//! - Crashed deliveries are recovered by reaping and resubmission
//! - The pool converges to its target
//! - Control loops stay registered across ticks longer than the registry TTL

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use chrono::{Duration as ChronoDuration, Utc};

    use quarry_core::{Job, JobCategory, JobKey, JobPayload, JobStatus, ListData, ListId, ProtocolRequest};

    use crate::backend::{Backend, InMemoryBackend};
    use crate::jobs::{JobQueue, QueueConfig, QueueError, keys};
    use crate::testing::{FakeDispatcher, FakeRepository, RecordingSupervisor};
    use crate::workers::{
        Collaborators, ListRefreshStrategy, PoolControllerStrategy, ProtocolCallStrategy, ReschedulerStrategy,
        ThreadSupervisor, TickStrategy, Worker, clean_jobs, confirm_workers, rescheduler, strategy_for,
    };

    type SharedQueue = JobQueue<Arc<InMemoryBackend>>;

    fn shared_queue() -> SharedQueue {
        JobQueue::new(
            InMemoryBackend::arc(),
            QueueConfig::default().with_block_timeout(Duration::from_millis(20)),
        )
    }

    fn collaborators() -> Collaborators {
        Collaborators::new(
            Arc::new(FakeDispatcher::succeeding(serde_json::json!({ "ok": true }))),
            Arc::new(FakeRepository::new()),
        )
    }

    /// Registry TTL shorter than one control tick.
    fn short_ttl_queue() -> SharedQueue {
        JobQueue::new(
            InMemoryBackend::arc(),
            QueueConfig::default()
                .with_block_timeout(Duration::from_millis(10))
                .with_worker_ttl(Some(Duration::from_millis(150))),
        )
    }

    fn consume_in_background(
        queue: &SharedQueue,
        category: JobCategory,
        name: &str,
        strategy: Box<dyn TickStrategy<Arc<InMemoryBackend>>>,
    ) -> thread::JoinHandle<Result<u64, QueueError>> {
        let mut worker = Worker::new(Some(name.to_string()), category, queue.clone(), strategy);
        thread::spawn(move || worker.consume(None))
    }

    fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn in_flight_job_is_owned_by_one_worker() {
        let queue = shared_queue();
        let mut job = Job::with_key(JobKey::new("solo").unwrap(), JobCategory::Tweet, JobPayload::Plain);
        queue.submit(&mut job).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || queue.fetch(JobCategory::Tweet).unwrap())
            })
            .collect();
        let fetched: Vec<Job> = handles.into_iter().filter_map(|h| h.join().unwrap()).collect();

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].key, job.key);
        assert_eq!(queue.waiting_len(JobCategory::Tweet).unwrap(), 0);
        assert_eq!(queue.processing_len(JobCategory::Tweet).unwrap(), 1);
    }

    #[test]
    fn statuses_move_forward_through_a_worker() {
        let queue = shared_queue();
        let dispatcher = Arc::new(FakeDispatcher::succeeding(serde_json::json!("pong")));

        let mut job = Job::protocol_call(
            JobKey::new("ping").unwrap(),
            ProtocolRequest::new().with_param("op", "ping"),
        );
        queue.submit(&mut job).unwrap();
        let status = || queue.store().get(Some(JobCategory::ProtocolCall), "ping").unwrap().status;
        assert_eq!(status(), JobStatus::Waiting);

        let mut worker = Worker::new(
            None,
            JobCategory::ProtocolCall,
            queue.clone(),
            Box::new(ProtocolCallStrategy::new(dispatcher)),
        );
        assert_eq!(worker.consume(Some(1)).unwrap(), 1);

        assert_eq!(status(), JobStatus::Done);
        assert!(queue.list_all_workers().unwrap().is_empty());
        assert_eq!(queue.processing_len(JobCategory::ProtocolCall).unwrap(), 0);
    }

    #[test]
    fn crashed_delivery_is_recovered_by_reaping_and_resubmission() {
        let queue = shared_queue();
        let category = JobCategory::ProtocolCall;
        let mut job = Job::protocol_call(JobKey::new("lost").unwrap(), ProtocolRequest::new())
            .created_at(Utc::now() - ChronoDuration::minutes(10));
        queue.submit(&mut job).unwrap();

        // Crash after the atomic move, before the status write.
        let moved = queue
            .backend()
            .brpoplpush(&keys::waiting_list(category), &keys::processing_list(category), Duration::ZERO)
            .unwrap();
        assert_eq!(moved.as_deref(), Some("job-protocol_call-lost"));
        let stored = queue.store().get(Some(category), "lost").unwrap();
        assert_eq!(stored.status, JobStatus::Waiting);
        assert_eq!(queue.waiting_len(category).unwrap(), 0);

        assert_eq!(clean_jobs(&queue, Duration::from_secs(300), category).unwrap(), 1);

        let mut again = Job::protocol_call(JobKey::new("lost").unwrap(), ProtocolRequest::new());
        queue.submit(&mut again).unwrap();
        let mut worker = Worker::new(
            None,
            category,
            queue.clone(),
            strategy_for(category, &collaborators()).unwrap(),
        );
        assert_eq!(worker.consume(Some(1)).unwrap(), 1);

        let stored = queue.store().get(Some(category), "lost").unwrap();
        assert_eq!(stored.status, JobStatus::Done);
    }

    #[test]
    fn reaping_ignores_status() {
        let queue = shared_queue();
        let category = JobCategory::Content;
        let aged = |key: &str| {
            Job::with_key(JobKey::new(key).unwrap(), category, JobPayload::Plain)
                .created_at(Utc::now() - ChronoDuration::minutes(10))
        };

        let mut in_progress = aged("in-progress");
        queue.submit(&mut in_progress).unwrap();
        queue.fetch(category).unwrap().unwrap();
        let mut waiting = aged("waiting");
        queue.submit(&mut waiting).unwrap();
        let mut done = aged("done");
        done.mark_done("{}");
        queue.update(&done).unwrap();
        let mut failed = aged("failed");
        failed.mark_failed("boom");
        queue.update(&failed).unwrap();

        assert_eq!(clean_jobs(&queue, Duration::from_secs(5 * 60), category).unwrap(), 4);
        assert!(queue.jobs_for(category).unwrap().is_empty());
    }

    #[test]
    fn fetching_a_reaped_job_drops_its_reference() {
        let queue = shared_queue();
        let mut job = Job::with_key(JobKey::new("gone").unwrap(), JobCategory::Tweet, JobPayload::Plain);
        queue.submit(&mut job).unwrap();
        queue.remove(&job).unwrap();

        let err = queue.fetch(JobCategory::Tweet).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(queue.processing_len(JobCategory::Tweet).unwrap(), 0);
    }

    #[test]
    fn dropped_connection_during_fetch_reconnects_quietly() {
        let queue = shared_queue();
        queue.backend().inject_connection_drop();

        assert!(queue.fetch(JobCategory::Content).unwrap().is_none());
        assert_eq!(queue.backend().reconnects(), 1);
    }

    #[test]
    fn pool_converges_to_target() {
        let queue = shared_queue();
        let category = JobCategory::Content;
        let running = Arc::new(AtomicUsize::new(0));

        let supervisor = {
            let queue = queue.clone();
            let running = running.clone();
            let collaborators = collaborators();
            ThreadSupervisor::new(move |category, name| {
                running.fetch_add(1, Ordering::SeqCst);
                if let Some(strategy) = strategy_for(category, &collaborators) {
                    let mut worker = Worker::new(Some(name), category, queue.clone(), strategy);
                    let _ = worker.consume(None);
                }
                running.fetch_sub(1, Ordering::SeqCst);
            })
        };

        let report = confirm_workers(&queue, &supervisor, 3, category).unwrap();
        assert_eq!(report.spawned, 3);
        wait_until("3 registered workers", || queue.list_workers(category).unwrap().len() == 3);

        let report = confirm_workers(&queue, &supervisor, 5, category).unwrap();
        assert_eq!(report.spawned, 2);
        wait_until("5 registered workers", || queue.list_workers(category).unwrap().len() == 5);

        let report = confirm_workers(&queue, &supervisor, 2, category).unwrap();
        assert_eq!(report.removed, 3);
        assert_eq!(queue.list_workers(category).unwrap().len(), 2);
        wait_until("3 workers to exit", || running.load(Ordering::SeqCst) == 2);

        confirm_workers(&queue, &supervisor, 0, category).unwrap();
        supervisor.join_all().unwrap();
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn list_job_is_refreshed_then_rescheduled_when_due() {
        let queue = shared_queue();
        let repository = Arc::new(FakeRepository::new());
        let dispatcher = Arc::new(FakeDispatcher::succeeding(serde_json::json!({ "top": [] })));

        let hourly = ListData::new(ListId::new(), "hourly")
            .private_with_keywords(vec!["rust".to_string()])
            .with_schedule(3600);
        let slow = ListData::new(ListId::new(), "slow")
            .private_with_keywords(vec!["queue".to_string()])
            .with_schedule(3 * 3600);
        repository.insert(hourly.clone());
        repository.insert(slow.clone());

        let mut jobs = vec![
            Job::list_refresh(JobKey::new("hourly").unwrap(), JobCategory::Tweet, hourly),
            Job::list_refresh(JobKey::new("slow").unwrap(), JobCategory::Tweet, slow),
        ];
        queue.submit_all(&mut jobs).unwrap();

        let strategy = ListRefreshStrategy::new(JobCategory::Tweet, dispatcher, repository.clone()).unwrap();
        let mut worker = Worker::new(None, JobCategory::Tweet, queue.clone(), Box::new(strategy));
        assert_eq!(worker.consume(Some(2)).unwrap(), 2);
        assert_eq!(repository.digests().len(), 2);

        let two_hours_later = Utc::now() + ChronoDuration::hours(2);
        assert_eq!(rescheduler::sweep(&queue, two_hours_later).unwrap(), 1);

        let hourly = queue.store().get(Some(JobCategory::Tweet), "hourly").unwrap();
        let slow = queue.store().get(Some(JobCategory::Tweet), "slow").unwrap();
        assert_eq!(hourly.status, JobStatus::Waiting);
        assert_eq!(slow.status, JobStatus::Done);
        assert_eq!(
            queue.backend().list(&keys::waiting_list(JobCategory::Tweet)).unwrap(),
            vec!["job-tweet-hourly".to_string()]
        );
    }

    #[test]
    fn rescheduler_stays_registered_across_ticks_longer_than_the_ttl() {
        let queue = short_ttl_queue();
        let category = JobCategory::Rescheduler;
        let strategy = ReschedulerStrategy::new(Duration::from_millis(200));
        let handle = consume_in_background(&queue, category, "sweeper", Box::new(strategy));

        wait_until("rescheduler registration", || queue.worker_exists(category, "sweeper").unwrap());
        for _ in 0..5 {
            thread::sleep(Duration::from_millis(200));
            assert!(!handle.is_finished(), "rescheduler stopped on its own");
            assert!(queue.worker_exists(category, "sweeper").unwrap());
        }

        queue.deregister_worker(category, "sweeper").unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), 0);
        assert!(!queue.worker_exists(category, "sweeper").unwrap());
    }

    #[test]
    fn pool_controller_stays_registered_across_ticks_longer_than_the_ttl() {
        let queue = short_ttl_queue();
        let category = JobCategory::Reliability;
        let supervisor = Arc::new(RecordingSupervisor::new());
        let strategy = PoolControllerStrategy::new(JobCategory::Content, 1, supervisor.clone())
            .with_interval(Duration::from_millis(200));
        let handle = consume_in_background(&queue, category, "controller", Box::new(strategy));

        // Recorded spawns never register, so every tick asks for one more.
        wait_until("four control ticks", || supervisor.spawned().len() >= 4);
        assert!(!handle.is_finished(), "controller stopped on its own");
        assert!(queue.worker_exists(category, "controller").unwrap());

        queue.deregister_worker(category, "controller").unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), 0);
        assert!(!queue.worker_exists(category, "controller").unwrap());
        assert!(supervisor.spawned().iter().all(|(spawned, _)| *spawned == JobCategory::Content));
    }

    #[test]
    fn stale_requeue_is_explicitly_unsupported() {
        let queue = shared_queue();
        assert!(queue.requeue_stale(Duration::from_secs(60)).is_err());
    }
}
