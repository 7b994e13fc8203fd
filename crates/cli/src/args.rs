//! Command line and environment configuration.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use quarry_core::JobCategory;
use quarry_infra::backend::Database;
use quarry_infra::jobs::QueueConfig;
use quarry_observability::{LogConfig, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "Job queue workers, pool controller and rescheduler on a shared Redis store")]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Store connection and queue tuning, shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    #[arg(long, global = true, default_value = "127.0.0.1", env = "REDIS_HOST")]
    pub redis_host: String,

    #[arg(long, global = true, default_value = "6379", env = "REDIS_PORT")]
    pub redis_port: u16,

    /// Logical database: search, list or test
    #[arg(long, global = true, default_value = "test", env = "REDIS_DATABASE")]
    pub redis_database: Database,

    /// Upper bound of one blocking fetch, in seconds; under half the worker TTL (0 waits forever, TTL 0 only)
    #[arg(long, global = true, default_value = "5", env = "QUARRY_BLOCK_TIMEOUT_SECS")]
    pub block_timeout_secs: u64,

    /// Expiry of worker registry entries, in seconds (0 disables expiry)
    #[arg(long, global = true, default_value = "60", env = "QUARRY_WORKER_TTL_SECS")]
    pub worker_ttl_secs: u64,

    /// Log output: json or text
    #[arg(long, global = true, default_value = "json", env = "QUARRY_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl StoreArgs {
    pub fn queue_config(&self) -> QueueConfig {
        let ttl = (self.worker_ttl_secs > 0).then(|| Duration::from_secs(self.worker_ttl_secs));
        QueueConfig::default()
            .with_block_timeout(Duration::from_secs(self.block_timeout_secs))
            .with_worker_ttl(ttl)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            ..LogConfig::default()
        }
    }

    /// Flags that make a spawned worker talk to the same store.
    pub fn forward_args(&self) -> Vec<String> {
        vec![
            "--redis-host".to_string(),
            self.redis_host.clone(),
            "--redis-port".to_string(),
            self.redis_port.to_string(),
            "--redis-database".to_string(),
            self.redis_database.as_str().to_string(),
            "--block-timeout-secs".to_string(),
            self.block_timeout_secs.to_string(),
            "--worker-ttl-secs".to_string(),
            self.worker_ttl_secs.to_string(),
            "--log-format".to_string(),
            self.log_format.as_str().to_string(),
        ]
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a worker for one category until its quota or deregistration
    Consume {
        category: JobCategory,

        /// Registry name (random when omitted)
        #[arg(long)]
        name: Option<String>,

        /// Stop after this many processed jobs
        #[arg(long)]
        max_jobs: Option<u64>,
    },

    /// Keep a category's worker pool at a target size and reap old jobs
    Control {
        category: JobCategory,

        #[arg(long)]
        workers: usize,

        #[arg(long, default_value = "300")]
        max_age_secs: u64,

        #[arg(long, default_value = "30")]
        interval_secs: u64,

        /// Registry name of the controller itself
        #[arg(long)]
        name: Option<String>,
    },

    /// Requeue finished list jobs whose refresh interval elapsed
    Reschedule {
        #[arg(long, default_value = "60")]
        interval_secs: u64,
    },

    /// Submit a job; prints its store key
    Submit {
        category: JobCategory,

        /// Job payload as JSON, e.g. {"kind":"plain"}
        #[arg(long)]
        payload: String,

        #[arg(long)]
        key: Option<String>,
    },

    /// List registered workers
    Workers { category: Option<JobCategory> },

    /// Print stored jobs, one JSON record per line
    Jobs {
        /// Match `<category>-<key>` prefixes, e.g. `tweet-` or `content-a`
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Check the store connection
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_consume() {
        let cli = Cli::try_parse_from(["quarry", "consume", "tweet", "--name", "w1", "--max-jobs", "10"]).unwrap();
        match cli.command {
            Command::Consume {
                category,
                name,
                max_jobs,
            } => {
                assert_eq!(category, JobCategory::Tweet);
                assert_eq!(name.as_deref(), Some("w1"));
                assert_eq!(max_jobs, Some(10));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_store_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "quarry",
            "workers",
            "--redis-port",
            "6380",
            "--redis-database",
            "LIST",
            "--worker-ttl-secs",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.store.redis_port, 6380);
        assert_eq!(cli.store.redis_database, Database::List);
        assert_eq!(cli.store.queue_config().worker_ttl, None);
    }

    #[test]
    fn forwarded_flags_parse_back() {
        let cli = Cli::try_parse_from(["quarry", "--redis-host", "cache", "--redis-port", "7000", "ping"]).unwrap();
        let mut argv = vec!["quarry".to_string()];
        argv.extend(cli.store.forward_args());
        argv.extend(["consume".to_string(), "content".to_string()]);

        let forwarded = Cli::try_parse_from(argv).unwrap();
        assert_eq!(forwarded.store.redis_host, "cache");
        assert_eq!(forwarded.store.redis_port, 7000);
        assert_eq!(forwarded.store.redis_database, cli.store.redis_database);
    }

    #[test]
    fn fetch_timeout_must_fit_inside_the_worker_ttl() {
        let cli = Cli::try_parse_from(["quarry", "ping"]).unwrap();
        assert!(cli.store.queue_config().validate().is_ok());

        let cli =
            Cli::try_parse_from(["quarry", "ping", "--block-timeout-secs", "30", "--worker-ttl-secs", "60"]).unwrap();
        assert!(cli.store.queue_config().validate().is_err());
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(Cli::try_parse_from(["quarry", "consume", "podcasts"]).is_err());
    }

    #[test]
    fn control_requires_a_target() {
        assert!(Cli::try_parse_from(["quarry", "control", "content"]).is_err());
        let cli = Cli::try_parse_from(["quarry", "control", "content", "--workers", "4"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Control { workers: 4, max_age_secs: 300, interval_secs: 30, .. }
        ));
    }
}
