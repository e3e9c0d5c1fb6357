//! The execution-backend seam.

use crate::error::Result;
use crate::types::{Isolation, ParamValue, WorkItem};

/// Core trait for execution backends.
///
/// One implementation exists per [`Isolation`] variant; the submission
/// service routes each item to the backend matching its declared strategy
/// and never falls back to another. Backends are invoked from pool threads,
/// so implementations must be `Send + Sync`.
///
/// Every failure an item can produce (marshaling, daemon startup, daemon
/// crash, the action's own failure) is returned here as an `Err`; backends
/// never panic across this boundary.
pub trait ExecutionBackend: Send + Sync {
    /// The isolation strategy this backend implements.
    fn isolation(&self) -> Isolation;

    /// Execute one work item to a terminal result.
    ///
    /// # Arguments
    ///
    /// * `item` - The descriptor to execute. Its `isolation` matches
    ///   `self.isolation()`; routing guarantees this.
    ///
    /// # Returns
    ///
    /// * `Ok(ParamValue)` - The marshaled result value.
    /// * `Err` - The terminal failure for this item.
    fn execute(&self, item: &WorkItem) -> Result<ParamValue>;
}
