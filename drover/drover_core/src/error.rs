//! Error types for the Drover work-dispatch engine.
//!
//! This module defines the error hierarchy used throughout the engine. The
//! errors are organized by subsystem: submission and execution
//! ([`DispatchError`]), boundary conversion ([`MarshalError`]) and the daemon
//! pool ([`DaemonError`]).
//!
//! The root error type, `Error`, can wrap any of the subsystem-specific
//! errors, allowing for uniform error handling at the result boundary.

use crate::id::{DaemonId, WorkItemId};
use thiserror::Error;

/// Root error type for the Drover engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Submission and execution errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Boundary-crossing errors
    #[error("Marshaling error: {0}")]
    Marshal(#[from] MarshalError),

    /// Daemon pool errors
    #[error("Daemon error: {0}")]
    Daemon(#[from] DaemonError),

    /// Aggregated failures of a submission batch
    #[error("Batch failure: {0}")]
    Batch(#[from] BatchFailure),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// General runtime errors
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Errors related to work submission and in-process execution.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The descriptor was malformed and rejected synchronously at submit
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// No action with the given reference is resolvable in the target context
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// The unit of work itself raised a failure
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// The action panicked during execution
    #[error("Action panicked: {0}")]
    ActionPanicked(String),

    /// The engine is shutting down and no longer accepts work
    #[error("Engine shutting down")]
    ShuttingDown,

    /// The item was submitted to a batch that is already being awaited
    #[error("Batch {0} is closed")]
    BatchClosed(crate::id::BatchId),
}

/// Errors raised when a parameter or result cannot cross an isolation
/// boundary. These are caller configuration errors and are never retried.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// A pass-by-reference handle was used outside the shared context
    #[error("Handle parameter cannot cross the {0} boundary")]
    HandleNotTransferable(&'static str),

    /// A value could not be serialized for the inter-process channel
    #[error("Value cannot be serialized: {0}")]
    Unserializable(String),

    /// Bytes received over the inter-process channel could not be decoded
    #[error("Response could not be decoded: {0}")]
    DecodeFailed(String),
}

/// Errors related to daemon pool operations.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A new daemon process failed to initialize
    #[error("Daemon startup failed: {0}")]
    StartupFailed(String),

    /// The daemon terminated unexpectedly mid-dispatch
    #[error("Daemon {0} crashed: {1}")]
    Crashed(DaemonId, String),

    /// Timed out waiting for a daemon slot below the process ceiling
    #[error("Daemon acquisition timed out after {0}ms")]
    AcquireTimeout(u64),

    /// The pool has been shut down and no longer assigns work
    #[error("Daemon pool is shut down")]
    PoolShutDown,
}

/// Aggregate of every failure observed in one submission batch.
///
/// The barrier never surfaces only the first failure; callers see every
/// concurrent failure, keyed by the item that produced it.
#[derive(Debug, Error)]
pub struct BatchFailure {
    /// The failures, keyed by work item, in item-id order.
    pub failures: Vec<(WorkItemId, Error)>,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} work item(s) failed:", self.failures.len())?;
        for (id, err) in &self.failures {
            write!(f, " [{}: {}]", id, err)?;
        }
        Ok(())
    }
}

/// Result type used throughout the Drover engine.
pub type Result<T> = std::result::Result<T, Error>;
