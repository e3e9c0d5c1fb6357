//! The daemon control-channel protocol.
//!
//! Request/response over a process-local transport: newline-delimited JSON
//! on the daemon's stdin/stdout. A daemon announces itself with one
//! [`Hello`] line when its environment is ready, then answers exactly one
//! [`DaemonResponse`] per [`DaemonRequest`]. One request is in flight per
//! daemon at a time; daemons are single-tasked while busy.

use drover_core::{DispatchError, Error, ParamValue, WorkItemId};
use serde::{Deserialize, Serialize};

/// Startup handshake sent by the worker once it is ready for requests.
///
/// The pid doubles as the observable process identity: tests and logs use
/// it to verify daemon reuse and isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// Operating-system process id of the worker.
    pub pid: u32,
}

/// One marshaled unit of work sent to a daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    /// The work item this request executes.
    pub item_id: WorkItemId,

    /// Action reference, resolved in the daemon's own environment.
    pub action: String,

    /// Marshaled parameters.
    pub params: Vec<ParamValue>,
}

/// Classification of a remote failure, preserved across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFailureKind {
    /// The daemon could not resolve the action reference.
    ActionNotFound,

    /// The action ran and raised a failure.
    ActionFailed,

    /// The action panicked; the daemon survived and reported it.
    ActionPanicked,

    /// The request line could not be decoded.
    BadRequest,
}

/// Terminal outcome of one remote execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// The action produced a value.
    Success {
        /// The marshaled result.
        value: ParamValue,
    },

    /// The action or its dispatch failed inside the daemon.
    Failure {
        /// Failure classification.
        kind: RemoteFailureKind,
        /// Human-readable cause.
        message: String,
    },
}

/// One response line from a daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    /// Echo of the request's item id.
    pub item_id: WorkItemId,

    /// Process id of the daemon that executed the item.
    pub worker_pid: u32,

    /// The terminal outcome.
    pub outcome: RemoteOutcome,
}

impl RemoteOutcome {
    /// Convert a remote outcome back into the engine's result type.
    pub fn into_result(self) -> drover_core::Result<ParamValue> {
        match self {
            Self::Success { value } => Ok(value),
            Self::Failure { kind, message } => Err(match kind {
                RemoteFailureKind::ActionNotFound => {
                    Error::Dispatch(DispatchError::ActionNotFound(message))
                }
                RemoteFailureKind::ActionFailed => {
                    Error::Dispatch(DispatchError::ActionFailed(message))
                }
                RemoteFailureKind::ActionPanicked => {
                    Error::Dispatch(DispatchError::ActionPanicked(message))
                }
                RemoteFailureKind::BadRequest => Error::Runtime(message),
            }),
        }
    }
}
