//! Job store, queue engine and worker registry.
//!
//! ## Design
//!
//! - One record per `(category, key)`, stored as JSON
//! - Two lists per category (waiting, in-progress) holding references
//! - Registry entries double as stop signals for workers
//! - Every operation is a single atomic store primitive; nothing spans two
//!
//! ## Components
//!
//! - `keys`: the store naming contract
//! - `JobStore`: record persistence with key normalization
//! - `JobQueue`: submit/fetch/release, scans, registry

pub mod error;
pub mod keys;
pub mod queue;
pub mod registry;
pub mod store;

pub use error::QueueError;
pub use queue::{JobQueue, QueueConfig};
pub use store::JobStore;
