//! # Drover Engine
//!
//! `drover_engine` is a work-dispatch engine: it accepts independent,
//! serializable units of work, executes each under a caller-chosen isolation
//! strategy, and returns results or failures at a synchronization barrier.
//!
//! Key concepts:
//!
//! 1. **Execution Backend**: one implementation per isolation strategy
//!    (shared context, isolated context, process context).
//!
//! 2. **Action Registry**: resolves action references to units of work in a
//!    given execution environment.
//!
//! 3. **Marshaling**: converts parameters and results into a form valid
//!    across the chosen boundary (by reference, by value, or serialized).
//!
//! 4. **Daemon Pool**: lifecycle manager for long-lived worker processes,
//!    keyed by execution-context signature and reused across submission
//!    waves.
//!
//! 5. **Submission Service**: the single entry point; `submit` never
//!    blocks, `wait` is the only barrier.

pub mod actions;
pub mod backend;
pub mod config;
pub mod daemon;
pub mod environment;
pub mod marshal;
pub mod registry;
pub mod service;

// Re-export key types for convenience
pub use backend::{IsolatedBackend, ProcessBackend, SharedBackend};
pub use config::EngineConfig;
pub use daemon::{DaemonLease, DaemonPool, DaemonPoolConfig, DaemonPoolStats, LaunchSpec};
pub use environment::ExecutionEnvironment;
pub use registry::ActionRegistry;
pub use service::{DispatchEngine, SubmissionBatch, WorkHandle};
