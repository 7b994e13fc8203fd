//! `quarry-core`: the job model shared by producers, workers and controllers.
//!
//! This crate is **pure model** (no store, no IO): identifiers, categories,
//! statuses and the serializable job record.

pub mod category;
pub mod error;
pub mod id;
pub mod job;
pub mod payload;

pub use category::JobCategory;
pub use error::{ModelError, ModelResult};
pub use id::{JobKey, ListId, ProfileListId};
pub use job::{Job, JobStatus};
pub use payload::{JobPayload, ListData, ProtocolRequest};
