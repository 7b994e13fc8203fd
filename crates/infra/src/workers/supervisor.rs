//! Starting worker processes on behalf of the pool controller.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use quarry_core::JobCategory;

/// A worker that was started. The controller only tracks workers through
/// the registry, so this is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub category: JobCategory,
    pub name: String,
    pub pid: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to start worker process: {0}")]
    Io(#[from] std::io::Error),

    #[error("supervisor state poisoned")]
    Poisoned,
}

/// Starts a detached worker for `category` that registers under `name`.
///
/// Spawning must not wait for the worker; it registers itself shortly after.
pub trait ProcessSupervisor: Send + Sync {
    fn spawn(&self, category: JobCategory, name: &str) -> Result<ProcessHandle, SpawnError>;
}

/// Spawns `<program> <base_args..> consume <category> --name <name>`.
#[derive(Debug)]
pub struct CommandSupervisor {
    program: PathBuf,
    base_args: Vec<String>,
    children: Mutex<Vec<Child>>,
}

impl CommandSupervisor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Arguments placed before the subcommand (connection flags).
    pub fn with_base_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.base_args = args.into_iter().collect();
        self
    }

    /// The full argument list for one worker.
    pub fn args_for(&self, category: JobCategory, name: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "consume".to_string(),
            category.to_string(),
            "--name".to_string(),
            name.to_string(),
        ]);
        args
    }

    /// Collect exited children. Returns how many are still running.
    pub fn reap(&self) -> Result<usize, SpawnError> {
        let mut children = self.children.lock().map_err(|_| SpawnError::Poisoned)?;
        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = child.id(), %status, "worker process exited");
                false
            }
            Ok(None) => true,
            Err(err) => {
                warn!(pid = child.id(), error = %err, "could not poll worker process");
                false
            }
        });
        Ok(children.len())
    }
}

impl ProcessSupervisor for CommandSupervisor {
    fn spawn(&self, category: JobCategory, name: &str) -> Result<ProcessHandle, SpawnError> {
        self.reap()?;

        let child = Command::new(&self.program)
            .args(self.args_for(category, name))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id();

        self.children.lock().map_err(|_| SpawnError::Poisoned)?.push(child);
        debug!(%category, worker = name, pid, "worker process spawned");

        Ok(ProcessHandle {
            category,
            name: name.to_string(),
            pid: Some(pid),
        })
    }
}

type Launch = dyn Fn(JobCategory, String) + Send + Sync;

/// Runs workers on named threads of the current process.
pub struct ThreadSupervisor {
    launch: Arc<Launch>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadSupervisor {
    /// `launch` runs a whole worker lifecycle for `(category, name)`.
    pub fn new(launch: impl Fn(JobCategory, String) + Send + Sync + 'static) -> Self {
        Self {
            launch: Arc::new(launch),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Wait for every spawned worker thread to finish.
    pub fn join_all(&self) -> Result<(), SpawnError> {
        let handles: Vec<_> = self
            .handles
            .lock()
            .map_err(|_| SpawnError::Poisoned)?
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        Ok(())
    }
}

impl ProcessSupervisor for ThreadSupervisor {
    fn spawn(&self, category: JobCategory, name: &str) -> Result<ProcessHandle, SpawnError> {
        let launch = Arc::clone(&self.launch);
        let worker = name.to_string();

        let handle = thread::Builder::new()
            .name(format!("{category}-{name}"))
            .spawn(move || launch(category, worker))?;
        self.handles.lock().map_err(|_| SpawnError::Poisoned)?.push(handle);

        Ok(ProcessHandle {
            category,
            name: name.to_string(),
            pid: None,
        })
    }
}

impl std::fmt::Debug for ThreadSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSupervisor").finish_non_exhaustive()
    }
}
