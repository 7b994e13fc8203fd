//! Category-specific job payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ListId, ProfileListId};

/// Payload carried by a job, dispatched on by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// No payload (control jobs, markers).
    Plain,
    /// A monitored list whose report is recomputed on a schedule.
    ListRefresh(ListData),
    /// Raw parameters of an outbound protocol call.
    ProtocolCall(ProtocolRequest),
}

impl JobPayload {
    pub fn as_list(&self) -> Option<&ListData> {
        match self {
            JobPayload::ListRefresh(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&ProtocolRequest> {
        match self {
            JobPayload::ProtocolCall(request) => Some(request),
            _ => None,
        }
    }
}

/// Snapshot of a monitored list, as held by the domain repository.
///
/// The repository is authoritative; workers refresh this snapshot before
/// every run because list properties can change at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListData {
    pub id: ListId,
    pub name: String,
    /// Private lists are searched by keyword, public ones by profile list.
    pub private: bool,
    pub keywords: Vec<String>,
    pub profile_list_id: Option<ProfileListId>,
    /// Width of the report window, in days, ending at run time.
    pub duration_days: u32,
    /// When the report was last computed (successfully or not).
    pub last_updated: DateTime<Utc>,
    /// Minimum number of seconds between two refreshes.
    pub update_schedule_secs: u64,
}

impl ListData {
    pub fn new(id: ListId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            private: false,
            keywords: Vec::new(),
            profile_list_id: None,
            duration_days: 7,
            last_updated: Utc::now(),
            update_schedule_secs: 24 * 60 * 60,
        }
    }

    pub fn private_with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.private = true;
        self.keywords = keywords;
        self
    }

    pub fn with_profile_list(mut self, profile_list_id: ProfileListId) -> Self {
        self.private = false;
        self.profile_list_id = Some(profile_list_id);
        self
    }

    pub fn with_schedule(mut self, update_schedule_secs: u64) -> Self {
        self.update_schedule_secs = update_schedule_secs;
        self
    }

    pub fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = at;
        self
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.duration_days = days;
        self
    }

    /// True when strictly more than the schedule has elapsed since the last run.
    pub fn refresh_due(&self, now: DateTime<Utc>) -> bool {
        let elapsed = (now - self.last_updated).num_seconds();
        elapsed > 0 && elapsed as u64 > self.update_schedule_secs
    }

    /// Report window `(from, to)` ending at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - Duration::days(i64::from(self.duration_days)), now)
    }
}

/// Request parameters for an outbound protocol call, passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolRequest {
    pub params: BTreeMap<String, serde_json::Value>,
}

impl ProtocolRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.params.get(name)
    }
}
