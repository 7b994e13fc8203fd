//! Workers: one loop, one tick strategy per category.
//!
//! ## Strategies
//!
//! - `influencer`, `tweet`, `content`: [`ListRefreshStrategy`]
//! - `protocol_call`: [`ProtocolCallStrategy`]
//! - `reliability`: [`PoolControllerStrategy`] (needs a managed category and target)
//! - `rescheduler`: [`ReschedulerStrategy`]
//!
//! Processing workers are spawned by a pool controller through a
//! [`ProcessSupervisor`] and stopped by deleting their registry entry.

use std::sync::Arc;

use quarry_core::JobCategory;

use crate::backend::Backend;
use crate::collaborators::{Dispatcher, ListRepository};

pub mod list_refresh;
pub mod pool_controller;
pub mod protocol_call;
pub mod rescheduler;
pub mod supervisor;
pub mod worker;

pub use list_refresh::ListRefreshStrategy;
pub use pool_controller::{PoolControllerStrategy, ScaleReport, clean_jobs, confirm_workers};
pub use protocol_call::ProtocolCallStrategy;
pub use rescheduler::ReschedulerStrategy;
pub use supervisor::{CommandSupervisor, ProcessHandle, ProcessSupervisor, SpawnError, ThreadSupervisor};
pub use worker::{TickOutcome, TickStrategy, Worker, new_worker_name};

/// Domain collaborators shared by every processing worker of a process.
#[derive(Clone)]
pub struct Collaborators {
    pub dispatcher: Arc<dyn Dispatcher>,
    pub repository: Arc<dyn ListRepository>,
}

impl Collaborators {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, repository: Arc<dyn ListRepository>) -> Self {
        Self { dispatcher, repository }
    }
}

/// Strategy for a worker started with only a category.
///
/// `None` for `reliability`, which is built from its control settings.
pub fn strategy_for<B: Backend>(
    category: JobCategory,
    collaborators: &Collaborators,
) -> Option<Box<dyn TickStrategy<B>>> {
    match category {
        JobCategory::ProtocolCall => Some(Box::new(ProtocolCallStrategy::new(
            collaborators.dispatcher.clone(),
        ))),
        JobCategory::Rescheduler => Some(Box::new(ReschedulerStrategy::default())),
        JobCategory::Reliability => None,
        JobCategory::Influencer | JobCategory::Tweet | JobCategory::Content => {
            let strategy = ListRefreshStrategy::new(
                category,
                collaborators.dispatcher.clone(),
                collaborators.repository.clone(),
            )?;
            Some(Box::new(strategy))
        }
    }
}
