//! Engine configuration.

use crate::daemon::DaemonPoolConfig;
use std::path::PathBuf;

/// Configuration for a [`DispatchEngine`](crate::DispatchEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Threads in the submission pool. Defaults to the logical CPU count.
    pub worker_threads: usize,

    /// Daemon pool settings for process-context work.
    pub daemons: DaemonPoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            daemons: DaemonPoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the thread count of the submission pool.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Set the worker executable used when items name none.
    pub fn with_default_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.daemons.default_executable = Some(executable.into());
        self
    }

    /// Set the daemon ceiling.
    pub fn with_max_daemons(mut self, max: usize) -> Self {
        self.daemons.max_daemons = max.max(1);
        self
    }
}
