//! Infrastructure layer: store backends, job queue, workers.

pub mod backend;
pub mod collaborators;
pub mod jobs;
pub mod workers;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod testing;
