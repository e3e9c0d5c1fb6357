//! Execution backends.
//!
//! One backend per isolation strategy, all behind [`ExecutionBackend`]:
//! shared-context runs in the engine's own context, isolated-context runs
//! in a per-signature context, and process-context ships the work to a
//! pooled daemon.

pub mod isolated;
pub mod process;
pub mod shared;

pub use isolated::IsolatedBackend;
pub use process::ProcessBackend;
pub use shared::SharedBackend;

use crate::environment::ExecutionEnvironment;
use crate::registry::ActionRegistry;
use drover_core::{
    DispatchError, Error, ExecutionBackend, Isolation, Param, ParamValue, Result, WorkItem,
};
use std::panic::{self, AssertUnwindSafe};

/// The backends an engine routes work through.
pub struct Backends {
    shared: SharedBackend,
    isolated: IsolatedBackend,
    process: ProcessBackend,
}

impl Backends {
    pub(crate) fn new(shared: SharedBackend, isolated: IsolatedBackend, process: ProcessBackend) -> Self {
        Self {
            shared,
            isolated,
            process,
        }
    }

    /// Select the backend for an isolation strategy.
    pub fn for_isolation(&self, isolation: Isolation) -> &dyn ExecutionBackend {
        match isolation {
            Isolation::Shared => &self.shared,
            Isolation::Isolated => &self.isolated,
            Isolation::Process => &self.process,
        }
    }
}

/// Look up an item's action and run it in the given context, converting
/// panics into `ActionPanicked`.
fn run_in_environment(
    registry: &ActionRegistry,
    environment: &ExecutionEnvironment,
    item: &WorkItem,
    params: &[Param],
) -> Result<ParamValue> {
    let action = registry
        .get(&item.action)
        .ok_or_else(|| Error::Dispatch(DispatchError::ActionNotFound(item.action.clone())))?;

    let ctx = environment.context(item.id);
    match panic::catch_unwind(AssertUnwindSafe(|| action.run(&ctx, params))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let detail = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(Error::Dispatch(DispatchError::ActionPanicked(detail)))
        }
    }
}
