//! The stock worker daemon executable.
//!
//! Registers the built-in actions plus a few only meaningful inside a
//! worker process, then runs the daemon request loop until the engine
//! closes the control channel.

use drover_core::{ActionContext, Param, ParamValue, Result, WorkAction};
use drover_engine::actions::register_builtin;
use drover_engine::daemon::run_worker;
use drover_engine::registry::ActionRegistry;
use std::process;
use std::sync::Arc;

/// `exit`: terminate the worker process immediately.
///
/// Deliberately absent from the host registry. Simulates a daemon crash
/// mid-dispatch, since no response line is ever written.
struct ExitAction;

impl WorkAction for ExitAction {
    fn name(&self) -> &str {
        "exit"
    }

    fn run(&self, _ctx: &ActionContext<'_>, params: &[Param]) -> Result<ParamValue> {
        let code = params
            .first()
            .and_then(Param::value)
            .and_then(ParamValue::as_int)
            .unwrap_or(1) as i32;
        process::exit(code);
    }
}

fn main() {
    let registry = ActionRegistry::new();
    register_builtin(&registry);
    registry.register(Arc::new(ExitAction));

    if let Err(e) = run_worker(registry) {
        eprintln!("drover-worker: {}", e);
        process::exit(1);
    }
}
