//! Long-lived worker daemons.
//!
//! This module provides everything on both sides of the process boundary:
//! the wire protocol, the daemon process handle and its state machine, the
//! pool that manages daemon lifecycles across submission waves, and the
//! request loop that runs inside the worker executable.

pub mod handle;
pub mod pool;
pub mod protocol;
pub mod worker;

pub use handle::{Daemon, DaemonState, LaunchSpec};
pub use pool::{DaemonLease, DaemonPool, DaemonPoolConfig, DaemonPoolStats};
pub use protocol::{DaemonRequest, DaemonResponse, Hello, RemoteFailureKind, RemoteOutcome};
pub use worker::run_worker;
