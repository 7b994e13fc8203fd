//! Identifiers used by the job model.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::JobCategory;
use crate::error::ModelError;

/// Caller-assigned (or generated) key of a job, unique within its category.
///
/// This is the bare key: it never carries the `job-<category>-` prefix used
/// by the store. Keys that start with `job-` or `<category>-` are rejected,
/// since references with those prefixes are read as qualified ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobKey(String);

const RECORD_PREFIX: &str = "job-";

impl JobKey {
    /// Wrap a caller-assigned key.
    pub fn new(key: impl Into<String>) -> Result<Self, ModelError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ModelError::invalid_key("job key must not be empty"));
        }
        if let Some(prefix) = reserved_prefix(&key) {
            return Err(ModelError::invalid_key(format!("job key {key:?} starts with reserved prefix {prefix:?}")));
        }
        Ok(Self(key))
    }

    /// Generate a fresh, time-ordered key.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JobKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for JobKey {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobKey> for String {
    fn from(key: JobKey) -> Self {
        key.0
    }
}

fn reserved_prefix(key: &str) -> Option<String> {
    if key.starts_with(RECORD_PREFIX) {
        return Some(RECORD_PREFIX.to_string());
    }
    JobCategory::ALL
        .iter()
        .map(|category| format!("{}-", category.as_str()))
        .find(|prefix| key.starts_with(prefix.as_str()))
}

/// Identifier of a monitored list in the domain repository.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(Uuid);

/// Identifier of a profile list referenced by public lists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileListId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $t {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| ModelError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(ListId, "ListId");
impl_uuid_newtype!(ProfileListId, "ProfileListId");
