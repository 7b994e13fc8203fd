//! The `quarry` operator binary: workers, controllers, producers.

pub mod args;
pub mod commands;
pub mod unconfigured;

pub use args::{Cli, Command, StoreArgs};
pub use commands::{execute, run};
pub use unconfigured::unconfigured_collaborators;
