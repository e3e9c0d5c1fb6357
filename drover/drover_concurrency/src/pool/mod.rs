//! Worker pooling for parallel execution.
//!
//! The engine executes shared- and isolated-context work items on a bounded
//! set of worker threads; process-context items occupy a worker only for the
//! duration of their send/receive against a daemon.

pub mod worker;

pub use worker::{WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStats};
