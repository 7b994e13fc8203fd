//! The job record: a common envelope around a category-specific payload.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::category::JobCategory;
use crate::error::ModelError;
use crate::id::JobKey;
use crate::payload::{JobPayload, ListData, ProtocolRequest};

/// Lifecycle status of a job.
///
/// Normal flow is `Waiting -> InProgress -> {Done, Failed}`. The only
/// back-edge, `{Done, Failed} -> Waiting`, is taken by re-submission or by
/// the rescheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    InProgress,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::InProgress => "in_progress",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobStatus::Waiting),
            "in_progress" => Ok(JobStatus::InProgress),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ModelError::InvalidStatus(other.to_string())),
        }
    }
}

/// A unit of asynchronous work.
///
/// `(category, key)` identifies exactly one stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub key: JobKey,
    pub category: JobCategory,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub payload: JobPayload,
    /// Set once processing completes (serialized result) or fails (message).
    pub result: Option<String>,
}

impl Job {
    /// Create a waiting job with a generated key.
    pub fn new(category: JobCategory, payload: JobPayload) -> Self {
        Self::with_key(JobKey::generate(), category, payload)
    }

    /// Create a waiting job with a caller-assigned key.
    pub fn with_key(key: JobKey, category: JobCategory, payload: JobPayload) -> Self {
        Self {
            key,
            category,
            status: JobStatus::Waiting,
            created_at: Utc::now(),
            payload,
            result: None,
        }
    }

    pub fn list_refresh(key: JobKey, category: JobCategory, list: ListData) -> Self {
        Self::with_key(key, category, JobPayload::ListRefresh(list))
    }

    pub fn protocol_call(key: JobKey, request: ProtocolRequest) -> Self {
        Self::with_key(key, JobCategory::ProtocolCall, JobPayload::ProtocolCall(request))
    }

    /// Override the creation timestamp (imports, tests).
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn list_data(&self) -> Option<&ListData> {
        self.payload.as_list()
    }

    /// Replace the list snapshot; no-op for other payloads.
    pub fn update_list_data(&mut self, list: ListData) {
        if let JobPayload::ListRefresh(current) = &mut self.payload {
            *current = list;
        }
    }

    pub fn mark_waiting(&mut self) {
        self.status = JobStatus::Waiting;
    }

    pub fn mark_in_progress(&mut self) {
        self.status = JobStatus::InProgress;
    }

    pub fn mark_done(&mut self, result: impl Into<String>) {
        self.status = JobStatus::Done;
        self.result = Some(result.into());
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.result = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ListId, ProfileListId};

    fn round_trip(job: &Job) -> Job {
        let json = serde_json::to_string(job).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn every_variant_round_trips() {
        let mut plain = Job::new(JobCategory::Rescheduler, JobPayload::Plain);
        plain.mark_failed("boom");

        let mut list = Job::list_refresh(
            JobKey::new("list-42").unwrap(),
            JobCategory::Tweet,
            ListData::new(ListId::new(), "launch")
                .with_profile_list(ProfileListId::new())
                .with_schedule(900),
        );
        list.mark_in_progress();

        let mut call = Job::protocol_call(
            JobKey::generate(),
            ProtocolRequest::new()
                .with_param("query", "rust")
                .with_param("limit", 25),
        );
        call.mark_done("{\"hits\":3}");

        for job in [plain, list, call] {
            assert_eq!(round_trip(&job), job);
        }
    }

    #[test]
    fn status_names_match_queue_suffixes() {
        assert_eq!(JobStatus::Waiting.as_str(), "waiting");
        assert_eq!(JobStatus::InProgress.as_str(), "in_progress");
        assert_eq!("done".parse::<JobStatus>().unwrap(), JobStatus::Done);
        assert!("stuck".parse::<JobStatus>().is_err());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn new_jobs_start_waiting_without_result() {
        let job = Job::new(JobCategory::Content, JobPayload::Plain);
        assert_eq!(job.status, JobStatus::Waiting);
        assert!(job.result.is_none());
    }

    #[test]
    fn update_list_data_ignores_other_payloads() {
        let mut job = Job::protocol_call(JobKey::generate(), ProtocolRequest::new());
        job.update_list_data(ListData::new(ListId::new(), "ignored"));
        assert!(job.list_data().is_none());
    }
}
