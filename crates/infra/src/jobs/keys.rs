//! Store key and list naming.
//!
//! | Entity | Key/list |
//! |---|---|
//! | Job record | `job-<category>-<key>` |
//! | Waiting list | `job_queue.<category>.waiting` |
//! | Processing list | `job_queue.<category>.in_progress` |
//! | Worker registry entry | `worker-<category>-<name>` |

use quarry_core::{JobCategory, JobKey, JobStatus};

pub const DIVIDER: &str = "-";
pub const JOB_PREFIX: &str = "job";
pub const WORKER_PREFIX: &str = "worker";
pub const QUEUE_PREFIX: &str = "job_queue";

/// Key of a stored job record.
pub fn job_key(category: JobCategory, key: &JobKey) -> String {
    format!("{JOB_PREFIX}{DIVIDER}{category}{DIVIDER}{key}")
}

/// Key of a worker registry entry.
pub fn worker_key(category: JobCategory, name: &str) -> String {
    format!("{WORKER_PREFIX}{DIVIDER}{category}{DIVIDER}{name}")
}

/// Pattern matching every registry entry of `category`.
pub fn worker_pattern(category: JobCategory) -> String {
    format!("{WORKER_PREFIX}{DIVIDER}{category}{DIVIDER}*")
}

pub fn all_workers_pattern() -> String {
    format!("{WORKER_PREFIX}{DIVIDER}*")
}

/// Name of the list holding references in `status` for `category`.
///
/// Only `Waiting` and `InProgress` have lists.
pub fn queue_list(category: JobCategory, status: JobStatus) -> String {
    format!("{QUEUE_PREFIX}.{category}.{status}")
}

pub fn waiting_list(category: JobCategory) -> String {
    queue_list(category, JobStatus::Waiting)
}

pub fn processing_list(category: JobCategory) -> String {
    queue_list(category, JobStatus::InProgress)
}

/// A job reference with any store prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub category: JobCategory,
    pub key: String,
}

impl ResolvedKey {
    pub fn store_key(&self) -> String {
        format!("{JOB_PREFIX}{DIVIDER}{}{DIVIDER}{}", self.category, self.key)
    }
}

/// Normalize a job reference that may be bare (`abc`), category-qualified
/// (`content-abc`) or a full store key (`job-content-abc`).
///
/// Normalization is idempotent. Without an explicit category the reference
/// must carry one. Returns `None` when no category can be determined.
///
/// Bare keys never start with `job-` or `<category>-` (`JobKey` rejects
/// them), so stripping both prefixes cannot eat part of a key.
pub fn resolve(category: Option<JobCategory>, reference: &str) -> Option<ResolvedKey> {
    let job_prefix = format!("{JOB_PREFIX}{DIVIDER}");
    let rest = reference.strip_prefix(&job_prefix).unwrap_or(reference);

    let (category, key) = match category {
        Some(category) => {
            let qualified = format!("{category}{DIVIDER}");
            (category, rest.strip_prefix(&qualified).unwrap_or(rest))
        }
        None => {
            let (name, key) = rest.split_once(DIVIDER)?;
            (name.parse().ok()?, key)
        }
    };

    if key.is_empty() {
        return None;
    }

    Some(ResolvedKey {
        category,
        key: key.to_string(),
    })
}

/// Extract the worker name from a registry key.
pub fn worker_name(category: JobCategory, registry_key: &str) -> Option<&str> {
    registry_key
        .strip_prefix(WORKER_PREFIX)?
        .strip_prefix(DIVIDER)?
        .strip_prefix(category.as_str())?
        .strip_prefix(DIVIDER)
}
