//! Worker-side daemon loop.
//!
//! The body of a worker executable: announce readiness, then answer
//! newline-delimited requests on stdin with responses on stdout until the
//! channel closes. Context state lives for the life of the process, so
//! every request a daemon serves sees the same state map.

use crate::environment::ExecutionEnvironment;
use crate::registry::ActionRegistry;
use drover_core::{DispatchError, Error, Param, Result};
use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::process;

use super::protocol::{DaemonRequest, DaemonResponse, Hello, RemoteFailureKind, RemoteOutcome};

/// Run the daemon request loop against the given action registry.
///
/// Returns once stdin reaches end of file, which is how the engine asks a
/// healthy daemon to exit.
pub fn run_worker(registry: ActionRegistry) -> io::Result<()> {
    let pid = process::id();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let hello = serde_json::to_string(&Hello { pid }).map_err(io::Error::other)?;
    writeln!(out, "{}", hello)?;
    out.flush()?;

    let environment = ExecutionEnvironment::shared();
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => handle_request(&registry, &environment, request, pid),
            Err(e) => DaemonResponse {
                item_id: Default::default(),
                worker_pid: pid,
                outcome: RemoteOutcome::Failure {
                    kind: RemoteFailureKind::BadRequest,
                    message: format!("request not understood: {}", e),
                },
            },
        };
        let encoded = serde_json::to_string(&response).map_err(io::Error::other)?;
        writeln!(out, "{}", encoded)?;
        out.flush()?;
    }

    Ok(())
}

fn handle_request(
    registry: &ActionRegistry,
    environment: &ExecutionEnvironment,
    request: DaemonRequest,
    pid: u32,
) -> DaemonResponse {
    let outcome = match run_action(registry, environment, &request) {
        Ok(value) => RemoteOutcome::Success { value },
        Err(Error::Dispatch(DispatchError::ActionNotFound(name))) => RemoteOutcome::Failure {
            kind: RemoteFailureKind::ActionNotFound,
            message: name,
        },
        Err(Error::Dispatch(DispatchError::ActionPanicked(message))) => RemoteOutcome::Failure {
            kind: RemoteFailureKind::ActionPanicked,
            message,
        },
        Err(e) => RemoteOutcome::Failure {
            kind: RemoteFailureKind::ActionFailed,
            message: e.to_string(),
        },
    };

    DaemonResponse {
        item_id: request.item_id,
        worker_pid: pid,
        outcome,
    }
}

fn run_action(
    registry: &ActionRegistry,
    environment: &ExecutionEnvironment,
    request: &DaemonRequest,
) -> Result<drover_core::ParamValue> {
    let action = registry.get(&request.action).ok_or_else(|| {
        Error::Dispatch(DispatchError::ActionNotFound(request.action.clone()))
    })?;

    let params: Vec<Param> = request.params.iter().cloned().map(Param::Value).collect();
    let ctx = environment.context(request.item_id);

    let result = panic::catch_unwind(AssertUnwindSafe(|| action.run(&ctx, &params)));
    match result {
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

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{ActionContext, ParamValue, WorkAction, WorkItemId};
    use std::sync::Arc;

    struct PanickyAction;

    impl WorkAction for PanickyAction {
        fn name(&self) -> &str {
            "boom"
        }

        fn run(&self, _ctx: &ActionContext<'_>, _params: &[Param]) -> Result<ParamValue> {
            panic!("boom went the action");
        }
    }

    #[test]
    fn test_panic_becomes_action_panicked() {
        let registry = ActionRegistry::new();
        registry.register(Arc::new(PanickyAction));
        let environment = ExecutionEnvironment::shared();
        let request = DaemonRequest {
            item_id: WorkItemId::new(),
            action: "boom".into(),
            params: vec![],
        };

        let response = handle_request(&registry, &environment, request, 42);
        match response.outcome {
            RemoteOutcome::Failure { kind, message } => {
                assert_eq!(kind, RemoteFailureKind::ActionPanicked);
                assert!(message.contains("boom went the action"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_is_not_found() {
        let registry = ActionRegistry::new();
        let environment = ExecutionEnvironment::shared();
        let request = DaemonRequest {
            item_id: WorkItemId::new(),
            action: "missing".into(),
            params: vec![],
        };

        let response = handle_request(&registry, &environment, request, 42);
        match response.outcome {
            RemoteOutcome::Failure { kind, message } => {
                assert_eq!(kind, RemoteFailureKind::ActionNotFound);
                assert_eq!(message, "missing");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
