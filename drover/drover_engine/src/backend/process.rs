//! Process-context backend.

use crate::daemon::{DaemonPool, DaemonRequest, LaunchSpec};
use crate::marshal;
use drover_core::{ExecutionBackend, Isolation, ParamValue, Result, WorkItem};
use std::sync::Arc;
use tracing::trace;

/// Ships work to a pooled daemon process.
///
/// Parameters are serialized onto the wire, so only plain values cross; the
/// daemon serving an item is chosen by the item's context key, and its
/// state survives between items for as long as the daemon lives.
pub struct ProcessBackend {
    pool: Arc<DaemonPool>,
}

impl ProcessBackend {
    /// Create a backend over a running daemon pool.
    pub fn new(pool: Arc<DaemonPool>) -> Self {
        Self { pool }
    }

    /// The daemon pool backing this backend.
    pub fn pool(&self) -> &Arc<DaemonPool> {
        &self.pool
    }
}

impl ExecutionBackend for ProcessBackend {
    fn isolation(&self) -> Isolation {
        Isolation::Process
    }

    fn execute(&self, item: &WorkItem) -> Result<ParamValue> {
        let params = marshal::to_wire_params(&item.params)?;
        let key = item.context_key();
        let launch = LaunchSpec::resolve(
            item.process_options.as_ref(),
            self.pool.config().default_executable.as_ref(),
        )?;

        let mut lease = self.pool.acquire(key, &launch)?;
        trace!(item = %item.id, action = %item.action, pid = lease.pid(), "dispatching to daemon");

        let request = DaemonRequest {
            item_id: item.id,
            action: item.action.clone(),
            params,
        };
        let response = lease.dispatch(&request)?;
        response.outcome.into_result()
    }
}
