//! Daemon process handles.
//!
//! This module provides the state machine and process plumbing for one
//! long-lived worker daemon: launch, the startup handshake, request
//! dispatch over the control channel, and termination.

use crate::marshal;
use drover_core::{
    ContextKey, DaemonError, DaemonId, Error, ProcessOptions, Result,
};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Instant;
use tracing::{debug, trace, warn};

use super::protocol::{DaemonRequest, DaemonResponse, Hello};

/// A daemon state.
///
/// Transitions: `Starting → Idle ⇄ Busy → Dead`, with `Dead` reachable from
/// any state via crash or reaping. Dead daemons are removed from the pool's
/// key index and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// The process is launching and has not completed its handshake.
    Starting,

    /// The daemon is alive and eligible for assignment.
    Idle,

    /// The daemon has one request in flight.
    Busy,

    /// The daemon crashed or was terminated.
    Dead,
}

impl DaemonState {
    /// Check whether a daemon in this state may accept a dispatch.
    pub fn can_dispatch(&self) -> bool {
        matches!(self, Self::Idle | Self::Busy)
    }
}

/// Fully-resolved launch configuration for one daemon process.
///
/// Derived from a work item's [`ProcessOptions`] plus the pool's default
/// executable; the engine passes the contents through without interpreting
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// The worker executable to launch.
    pub executable: PathBuf,

    /// Flags passed verbatim on the command line.
    pub launch_flags: Vec<String>,

    /// Environment variables exported to the process.
    pub env: BTreeMap<String, String>,

    /// Memory hints forwarded as `--min-memory-mb` / `--max-memory-mb`.
    pub min_memory_mb: Option<u64>,

    /// See `min_memory_mb`.
    pub max_memory_mb: Option<u64>,
}

impl LaunchSpec {
    /// Resolve a launch spec from item options and the pool default.
    ///
    /// # Returns
    ///
    /// * `Ok(spec)` - A launchable configuration.
    /// * `Err` - `DaemonError::StartupFailed` if no executable is available
    ///   from either source.
    pub fn resolve(
        options: Option<&ProcessOptions>,
        default_executable: Option<&PathBuf>,
    ) -> Result<Self> {
        let executable = options
            .and_then(|o| o.executable.clone())
            .or_else(|| default_executable.cloned())
            .ok_or_else(|| {
                Error::Daemon(DaemonError::StartupFailed(
                    "no worker executable configured".into(),
                ))
            })?;

        Ok(Self {
            executable,
            launch_flags: options.map(|o| o.launch_flags.clone()).unwrap_or_default(),
            env: options
                .map(|o| o.system_properties.clone().into_iter().collect())
                .unwrap_or_default(),
            min_memory_mb: options.and_then(|o| o.min_memory_mb),
            max_memory_mb: options.and_then(|o| o.max_memory_mb),
        })
    }
}

/// One live daemon process and its control channel.
pub struct Daemon {
    id: DaemonId,
    key: ContextKey,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    pid: u32,
    state: DaemonState,
    last_idle: Instant,
}

impl fmt::Debug for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("pid", &self.pid)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Daemon {
    /// Launch a daemon and wait for its startup handshake.
    ///
    /// The daemon is `Starting` until the worker announces readiness with a
    /// [`Hello`] line; a process that exits or emits garbage before then
    /// fails with `DaemonError::StartupFailed`. Startup failures are not
    /// retried here; a later acquire attempts a fresh launch independently.
    pub fn spawn(id: DaemonId, key: ContextKey, launch: &LaunchSpec) -> Result<Self> {
        debug!(daemon = %id, key = %key.short(), executable = %launch.executable.display(), "starting daemon");

        let mut command = Command::new(&launch.executable);
        command
            .args(&launch.launch_flags)
            .envs(&launch.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(mb) = launch.min_memory_mb {
            command.arg("--min-memory-mb").arg(mb.to_string());
        }
        if let Some(mb) = launch.max_memory_mb {
            command.arg("--max-memory-mb").arg(mb.to_string());
        }

        let mut child = command.spawn().map_err(|e| {
            Error::Daemon(DaemonError::StartupFailed(format!(
                "failed to launch {}: {}",
                launch.executable.display(),
                e
            )))
        })?;

        // The pipes exist because we requested Stdio::piped above.
        let stdin = child.stdin.take().expect("daemon stdin not captured");
        let stdout = child.stdout.take().expect("daemon stdout not captured");
        let mut stdout = BufReader::new(stdout);

        let hello = Self::read_hello(&mut stdout).map_err(|e| {
            let _ = child.kill();
            let _ = child.wait();
            e
        })?;

        debug!(daemon = %id, pid = hello.pid, "daemon ready");

        Ok(Self {
            id,
            key,
            child,
            stdin,
            stdout,
            pid: hello.pid,
            state: DaemonState::Idle,
            last_idle: Instant::now(),
        })
    }

    fn read_hello(stdout: &mut BufReader<ChildStdout>) -> Result<Hello> {
        let mut line = String::new();
        let read = stdout.read_line(&mut line).map_err(|e| {
            Error::Daemon(DaemonError::StartupFailed(format!(
                "handshake read failed: {}",
                e
            )))
        })?;
        if read == 0 {
            return Err(Error::Daemon(DaemonError::StartupFailed(
                "daemon exited before handshake".into(),
            )));
        }
        serde_json::from_str(line.trim()).map_err(|e| {
            Error::Daemon(DaemonError::StartupFailed(format!(
                "handshake not understood: {}",
                e
            )))
        })
    }

    /// The daemon's identity.
    pub fn id(&self) -> DaemonId {
        self.id
    }

    /// The execution-context key this daemon serves.
    pub fn key(&self) -> ContextKey {
        self.key
    }

    /// Observable process identity.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// When this daemon last became idle.
    pub fn last_idle(&self) -> Instant {
        self.last_idle
    }

    /// Transition to `Busy` for the duration of one lease.
    pub(crate) fn mark_busy(&mut self) {
        self.state = DaemonState::Busy;
    }

    /// Transition back to `Idle` and stamp the reuse clock.
    pub(crate) fn mark_idle(&mut self) {
        self.state = DaemonState::Idle;
        self.last_idle = Instant::now();
    }

    /// Send one marshaled request and block until the response arrives.
    ///
    /// A daemon that terminates mid-dispatch yields `DaemonError::Crashed`,
    /// which is terminal for the in-flight item and marks the daemon `Dead`
    /// so the pool discards it; other daemons are unaffected.
    pub fn dispatch(&mut self, request: &DaemonRequest) -> Result<DaemonResponse> {
        if !self.state.can_dispatch() {
            return Err(Error::Daemon(DaemonError::Crashed(
                self.id,
                format!("dispatch in state {:?}", self.state),
            )));
        }

        let line = marshal::encode_request(request)?;
        trace!(daemon = %self.id, item = %request.item_id, action = %request.action, "dispatching");

        if let Err(e) = writeln!(self.stdin, "{}", line).and_then(|_| self.stdin.flush()) {
            return Err(self.crashed(format!("request write failed: {}", e)));
        }

        let mut response_line = String::new();
        match self.stdout.read_line(&mut response_line) {
            Ok(0) => Err(self.crashed("channel closed mid-dispatch".into())),
            Ok(_) => marshal::decode_response(response_line.trim()),
            Err(e) => Err(self.crashed(format!("response read failed: {}", e))),
        }
    }

    fn crashed(&mut self, cause: String) -> Error {
        warn!(daemon = %self.id, pid = self.pid, "daemon crashed: {}", cause);
        self.state = DaemonState::Dead;
        Error::Daemon(DaemonError::Crashed(self.id, cause))
    }

    /// Kill the process and reap it, consuming the handle.
    pub fn terminate(mut self) {
        debug!(daemon = %self.id, pid = self.pid, "terminating daemon");
        self.state = DaemonState::Dead;
        // Closing stdin lets a healthy worker exit its request loop; kill
        // covers the unhealthy case.
        drop(self.stdin);
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_spec_prefers_item_executable() {
        let options = ProcessOptions::for_executable("/opt/worker");
        let default = PathBuf::from("/usr/bin/worker");
        let spec = LaunchSpec::resolve(Some(&options), Some(&default)).unwrap();
        assert_eq!(spec.executable, PathBuf::from("/opt/worker"));

        let spec = LaunchSpec::resolve(None, Some(&default)).unwrap();
        assert_eq!(spec.executable, default);
    }

    #[test]
    fn test_launch_spec_requires_some_executable() {
        let err = LaunchSpec::resolve(None, None).unwrap_err();
        assert!(matches!(
            err,
            Error::Daemon(DaemonError::StartupFailed(_))
        ));
    }

    #[test]
    fn test_spawn_missing_executable_is_startup_error() {
        let key = ContextKey::for_classpath(&[]);
        let launch = LaunchSpec {
            executable: PathBuf::from("/nonexistent/drover-worker"),
            launch_flags: vec![],
            env: BTreeMap::new(),
            min_memory_mb: None,
            max_memory_mb: None,
        };
        let err = Daemon::spawn(DaemonId::new(), key, &launch).unwrap_err();
        assert!(matches!(
            err,
            Error::Daemon(DaemonError::StartupFailed(_))
        ));
    }

    #[test]
    fn test_spawn_silent_executable_fails_handshake() {
        // `true` exits immediately without a hello line.
        let key = ContextKey::for_classpath(&[]);
        let launch = LaunchSpec {
            executable: PathBuf::from("/bin/true"),
            launch_flags: vec![],
            env: BTreeMap::new(),
            min_memory_mb: None,
            max_memory_mb: None,
        };
        let err = Daemon::spawn(DaemonId::new(), key, &launch).unwrap_err();
        match err {
            Error::Daemon(DaemonError::StartupFailed(msg)) => {
                assert!(msg.contains("before handshake") || msg.contains("not understood"));
            }
            other => panic!("expected StartupFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_state_predicates() {
        assert!(!DaemonState::Starting.can_dispatch());
        assert!(DaemonState::Idle.can_dispatch());
        assert!(DaemonState::Busy.can_dispatch());
        assert!(!DaemonState::Dead.can_dispatch());
    }
}
