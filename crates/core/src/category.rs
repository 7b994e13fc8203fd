//! Job categories: the partition of jobs, queues and workers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Fixed enumeration of job categories.
///
/// Each category owns an independent pair of queues (waiting/in-progress)
/// and its own set of registered workers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCategory {
    /// Pool controller (autoscaling + age-based reaping).
    Reliability,
    /// Periodic re-queue of completed list jobs.
    Rescheduler,
    /// Outbound protocol call carrying raw request parameters.
    ProtocolCall,
    /// List refresh: community/influencer report.
    Influencer,
    /// List refresh: most-shared posts report.
    Tweet,
    /// List refresh: top content report.
    Content,
}

impl JobCategory {
    pub const ALL: [JobCategory; 6] = [
        JobCategory::Reliability,
        JobCategory::Rescheduler,
        JobCategory::ProtocolCall,
        JobCategory::Influencer,
        JobCategory::Tweet,
        JobCategory::Content,
    ];

    /// Categories whose jobs carry list data and are refreshed on a schedule.
    pub const LIST_REFRESH: [JobCategory; 3] =
        [JobCategory::Influencer, JobCategory::Tweet, JobCategory::Content];

    /// Stable name used in store keys and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobCategory::Reliability => "reliability",
            JobCategory::Rescheduler => "rescheduler",
            JobCategory::ProtocolCall => "protocol_call",
            JobCategory::Influencer => "influencer",
            JobCategory::Tweet => "tweet",
            JobCategory::Content => "content",
        }
    }

    pub fn is_list_refresh(&self) -> bool {
        Self::LIST_REFRESH.contains(self)
    }

    /// Control categories run supervisory workers and never carry user jobs.
    pub fn is_control(&self) -> bool {
        matches!(self, JobCategory::Reliability | JobCategory::Rescheduler)
    }
}

impl core::fmt::Display for JobCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ModelError::InvalidCategory(s.to_string()))
    }
}
