//! Subcommand execution against any store backend.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use tracing::info;

use quarry_core::{Job, JobCategory, JobKey, JobPayload};
use quarry_infra::backend::{Backend, RedisBackend};
use quarry_infra::jobs::{JobQueue, keys};
use quarry_infra::workers::{
    Collaborators, CommandSupervisor, PoolControllerStrategy, ProcessSupervisor, ReschedulerStrategy, Worker,
    strategy_for,
};

use crate::args::{Cli, Command, StoreArgs};

/// Connect to the configured store and run one subcommand.
pub fn run(cli: Cli, collaborators: Collaborators) -> anyhow::Result<()> {
    let store = &cli.store;
    let backend = RedisBackend::connect(&store.redis_host, store.redis_port, store.redis_database)
        .with_context(|| format!("invalid store address {}:{}", store.redis_host, store.redis_port))?;
    let config = store.queue_config();
    config.validate().context("check --block-timeout-secs against --worker-ttl-secs")?;
    let queue = JobQueue::new(backend, config);

    let mut stdout = std::io::stdout().lock();
    execute(cli.command, store, queue, &collaborators, &mut stdout)
}

/// Run one subcommand on an open queue, writing user-facing output to `out`.
pub fn execute<B: Backend + 'static>(
    command: Command,
    store: &StoreArgs,
    queue: JobQueue<B>,
    collaborators: &Collaborators,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Consume {
            category,
            name,
            max_jobs,
        } => {
            let strategy = strategy_for(category, collaborators)
                .ok_or_else(|| anyhow!("{category} workers are started with `quarry control`"))?;
            let mut worker = Worker::new(name, category, queue, strategy);
            let processed = worker.consume(max_jobs)?;
            writeln!(out, "{processed}")?;
        }
        Command::Control {
            category,
            workers,
            max_age_secs,
            interval_secs,
            name,
        } => {
            if category.is_control() {
                bail!("{category} is a control category and has no worker pool");
            }
            let program = std::env::current_exe().context("cannot locate the quarry executable")?;
            let supervisor: Arc<dyn ProcessSupervisor> =
                Arc::new(CommandSupervisor::new(program).with_base_args(store.forward_args()));
            let strategy = PoolControllerStrategy::new(category, workers, supervisor)
                .with_max_age(Duration::from_secs(max_age_secs))
                .with_interval(Duration::from_secs(interval_secs));

            info!(managed = %category, workers, "pool controller starting");
            Worker::new(name, JobCategory::Reliability, queue, Box::new(strategy)).consume(None)?;
        }
        Command::Reschedule { interval_secs } => {
            let strategy = ReschedulerStrategy::new(Duration::from_secs(interval_secs));
            Worker::new(None, JobCategory::Rescheduler, queue, Box::new(strategy)).consume(None)?;
        }
        Command::Submit { category, payload, key } => {
            let payload: JobPayload = serde_json::from_str(&payload).context("invalid job payload")?;
            if payload.as_list().is_some() && !category.is_list_refresh() {
                bail!("{category} jobs cannot carry list data");
            }
            let key = match key {
                Some(key) => JobKey::new(key)?,
                None => JobKey::generate(),
            };
            let mut job = Job::with_key(key, category, payload);
            queue.submit(&mut job)?;
            writeln!(out, "{}", keys::job_key(job.category, &job.key))?;
        }
        Command::Workers { category } => {
            let registered = match category {
                Some(category) => queue.list_workers(category)?,
                None => queue.list_all_workers()?,
            };
            for key in registered {
                writeln!(out, "{key}")?;
            }
        }
        Command::Jobs { prefix } => {
            let jobs = match prefix {
                Some(prefix) => queue.all_jobs_by_category_prefix(&prefix)?,
                None => queue.all_jobs()?,
            };
            for job in jobs {
                writeln!(out, "{}", serde_json::to_string(&job)?)?;
            }
        }
        Command::Ping => {
            queue.ping()?;
            writeln!(out, "PONG")?;
        }
    }
    Ok(())
}
