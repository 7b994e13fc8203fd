//! Job record persistence.

use tracing::debug;

use quarry_core::{Job, JobCategory, JobKey};

use super::error::QueueError;
use super::keys;
use crate::backend::Backend;

/// Get/set/delete job records by their derived key.
///
/// Records are stored as JSON under `job-<category>-<key>`.
#[derive(Debug, Clone)]
pub struct JobStore<B> {
    backend: B,
}

impl<B: Backend> JobStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Upsert the serialized record.
    pub fn put(&self, job: &Job) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        self.backend
            .set(&keys::job_key(job.category, &job.key), &payload)?;
        Ok(())
    }

    /// Load a record.
    ///
    /// `reference` may be bare or already carry the `job-`/category prefix.
    /// Without `category`, the reference itself must name one. See
    /// [`keys::resolve`] for why the prefixes are unambiguous.
    pub fn get(&self, category: Option<JobCategory>, reference: &str) -> Result<Job, QueueError> {
        let resolved = keys::resolve(category, reference)
            .ok_or_else(|| QueueError::not_found(category, reference))?;

        let Some(payload) = self.backend.get(&resolved.store_key())? else {
            return Err(QueueError::not_found(Some(resolved.category), resolved.key));
        };

        Ok(serde_json::from_str(&payload)?)
    }

    /// Delete a record. List references are left untouched.
    pub fn delete(&self, category: JobCategory, key: &JobKey) -> Result<(), QueueError> {
        let existed = self.backend.delete(&keys::job_key(category, key))?;
        debug!(%category, job_key = %key, existed, "deleted job record");
        Ok(())
    }
}
