//! Daemon pool.
//!
//! Keeps long-lived worker daemons, indexed by execution-context key, and
//! hands them out one lease at a time. Requesting a daemon for a key either
//! reuses an idle match, launches a fresh process while the pool is under
//! its ceiling, retires an idle daemon of another key to free a slot, or
//! blocks until a slot opens.

use drover_core::{ContextKey, DaemonError, DaemonId, Error, Result};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::handle::{Daemon, DaemonState, LaunchSpec};
use super::protocol::{DaemonRequest, DaemonResponse};

/// Configuration for a [`DaemonPool`].
#[derive(Debug, Clone)]
pub struct DaemonPoolConfig {
    /// Hard ceiling on live daemons across all context keys.
    pub max_daemons: usize,

    /// Maximum idle daemons retained across all keys; surplus is reaped
    /// oldest first.
    pub max_retained: usize,

    /// Idle daemons older than this are reaped.
    pub idle_timeout: Duration,

    /// How often the background reaper scans for expired daemons.
    pub reap_interval: Duration,

    /// Backstop on how long an acquire may block waiting for a slot.
    pub acquire_timeout: Duration,

    /// Worker executable used when a work item names none.
    pub default_executable: Option<PathBuf>,
}

impl Default for DaemonPoolConfig {
    fn default() -> Self {
        Self {
            max_daemons: num_cpus::get().max(2),
            max_retained: num_cpus::get().max(2),
            idle_timeout: Duration::from_secs(300),
            reap_interval: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(30),
            default_executable: None,
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonPoolStats {
    /// Daemons launched over the pool's lifetime.
    pub spawned: u64,

    /// Daemons retired over the pool's lifetime.
    pub retired: u64,

    /// Live daemons right now, leased or idle.
    pub live: usize,

    /// Idle daemons right now.
    pub idle: usize,
}

struct PoolInner {
    idle: HashMap<ContextKey, VecDeque<Daemon>>,
    total: usize,
    shutdown: bool,
}

impl PoolInner {
    fn idle_count(&self) -> usize {
        self.idle.values().map(VecDeque::len).sum()
    }

    /// Pop the idle daemon with the oldest `last_idle` across every key.
    fn pop_oldest_idle(&mut self) -> Option<Daemon> {
        let key = self
            .idle
            .iter()
            .filter_map(|(k, q)| q.front().map(|d| (*k, d.last_idle())))
            .min_by_key(|(_, at)| *at)
            .map(|(k, _)| k)?;
        let queue = self.idle.get_mut(&key)?;
        let daemon = queue.pop_front();
        if queue.is_empty() {
            self.idle.remove(&key);
        }
        daemon
    }
}

/// A pool of daemon worker processes, keyed by execution context.
pub struct DaemonPool {
    config: DaemonPoolConfig,
    inner: Mutex<PoolInner>,
    slot_freed: Condvar,
    spawned: AtomicU64,
    retired: AtomicU64,
    reaper: Mutex<Option<JoinHandle<()>>>,
    reaper_signal: Mutex<bool>,
    reaper_wake: Condvar,
}

impl DaemonPool {
    /// Create a pool and start its background reaper.
    pub fn start(config: DaemonPoolConfig) -> Arc<Self> {
        let pool = Arc::new(Self {
            config,
            inner: Mutex::new(PoolInner {
                idle: HashMap::new(),
                total: 0,
                shutdown: false,
            }),
            slot_freed: Condvar::new(),
            spawned: AtomicU64::new(0),
            retired: AtomicU64::new(0),
            reaper: Mutex::new(None),
            reaper_signal: Mutex::new(false),
            reaper_wake: Condvar::new(),
        });

        let weak = Arc::downgrade(&pool);
        let interval = pool.config.reap_interval;
        let handle = thread::Builder::new()
            .name("daemon-reaper".into())
            .spawn(move || Self::reaper_loop(weak, interval))
            .expect("failed to spawn daemon reaper");
        *pool.reaper.lock().unwrap() = Some(handle);

        pool
    }

    fn reaper_loop(pool: Weak<DaemonPool>, interval: Duration) {
        loop {
            {
                let strong = match pool.upgrade() {
                    Some(p) => p,
                    None => return,
                };
                let stop = strong.reaper_signal.lock().unwrap();
                let (stop, _) = strong
                    .reaper_wake
                    .wait_timeout(stop, interval)
                    .unwrap();
                if *stop {
                    return;
                }
                drop(stop);
                strong.reap();
            }
        }
    }

    /// Pool configuration.
    pub fn config(&self) -> &DaemonPoolConfig {
        &self.config
    }

    /// Snapshot the pool counters.
    pub fn stats(&self) -> DaemonPoolStats {
        let inner = self.inner.lock().unwrap();
        DaemonPoolStats {
            spawned: self.spawned.load(Ordering::Relaxed),
            retired: self.retired.load(Ordering::Relaxed),
            live: inner.total,
            idle: inner.idle_count(),
        }
    }

    /// Lease a daemon for the given context key.
    ///
    /// Prefers an idle daemon already serving the key, launches a new one
    /// while under the ceiling, retires the oldest idle daemon of another
    /// key to make room, and otherwise blocks until a slot frees up. The
    /// configured acquire timeout bounds the wait.
    ///
    /// # Errors
    ///
    /// * `DaemonError::PoolShutDown` - The pool is shutting down.
    /// * `DaemonError::AcquireTimeout` - No slot opened within the timeout.
    /// * `DaemonError::StartupFailed` - A fresh launch was attempted and
    ///   failed.
    pub fn acquire(self: &Arc<Self>, key: ContextKey, launch: &LaunchSpec) -> Result<DaemonLease> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        let mut inner = self.inner.lock().unwrap();

        loop {
            if inner.shutdown {
                return Err(Error::Daemon(DaemonError::PoolShutDown));
            }

            // Reuse the most recently idled daemon for this key. The front
            // of the queue is left for the reaper.
            if let Some(queue) = inner.idle.get_mut(&key) {
                if let Some(mut daemon) = queue.pop_back() {
                    if queue.is_empty() {
                        inner.idle.remove(&key);
                    }
                    daemon.mark_busy();
                    debug!(daemon = %daemon.id(), key = %key.short(), "reusing idle daemon");
                    return Ok(DaemonLease::new(Arc::downgrade(self), daemon));
                }
            }

            if inner.total < self.config.max_daemons {
                // Claim the slot before unlocking so concurrent acquires
                // cannot stack past the ceiling, then launch outside the lock.
                inner.total += 1;
                drop(inner);
                return self.spawn_leased(key, launch);
            }

            // At the ceiling. Idle daemons are fungible slots: retire the
            // oldest one of any key and claim its place.
            if let Some(victim) = inner.pop_oldest_idle() {
                // The victim's slot transfers to the new daemon, so the
                // total stays put; spawn failure hands the slot back.
                debug!(daemon = %victim.id(), "retiring idle daemon to free a slot");
                drop(inner);
                self.retire(victim);
                return self.spawn_leased(key, launch);
            }

            // Every slot is busy. Wait for a release.
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Daemon(DaemonError::AcquireTimeout(
                    self.config.acquire_timeout.as_millis() as u64,
                )));
            }
            let (guard, timeout) = self
                .slot_freed
                .wait_timeout(inner, remaining)
                .unwrap();
            inner = guard;
            if timeout.timed_out() && Instant::now() >= deadline {
                return Err(Error::Daemon(DaemonError::AcquireTimeout(
                    self.config.acquire_timeout.as_millis() as u64,
                )));
            }
        }
    }

    /// Launch a fresh daemon into an already-claimed slot.
    fn spawn_leased(self: &Arc<Self>, key: ContextKey, launch: &LaunchSpec) -> Result<DaemonLease> {
        match Daemon::spawn(DaemonId::new(), key, launch) {
            Ok(mut daemon) => {
                self.spawned.fetch_add(1, Ordering::Relaxed);
                daemon.mark_busy();
                Ok(DaemonLease::new(Arc::downgrade(self), daemon))
            }
            Err(e) => {
                let mut inner = self.inner.lock().unwrap();
                inner.total -= 1;
                drop(inner);
                self.slot_freed.notify_one();
                Err(e)
            }
        }
    }

    /// Return a leased daemon to the pool.
    fn release(&self, mut daemon: Daemon) {
        let mut inner = self.inner.lock().unwrap();
        if daemon.state() == DaemonState::Dead || inner.shutdown {
            inner.total -= 1;
            drop(inner);
            self.retire(daemon);
            self.slot_freed.notify_all();
            return;
        }
        daemon.mark_idle();
        inner.idle.entry(daemon.key()).or_default().push_back(daemon);
        drop(inner);
        self.slot_freed.notify_all();
    }

    /// Retire idle daemons that exceeded the idle timeout or the retained
    /// ceiling, oldest first. Busy daemons are never touched.
    pub fn reap(&self) {
        let mut victims = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            let now = Instant::now();
            for queue in inner.idle.values_mut() {
                while let Some(front) = queue.front() {
                    if now.duration_since(front.last_idle()) >= self.config.idle_timeout {
                        victims.push(queue.pop_front().unwrap());
                    } else {
                        break;
                    }
                }
            }
            inner.idle.retain(|_, q| !q.is_empty());

            while inner.idle_count() > self.config.max_retained {
                match inner.pop_oldest_idle() {
                    Some(d) => victims.push(d),
                    None => break,
                }
            }
            inner.total -= victims.len();
        }

        if !victims.is_empty() {
            info!(count = victims.len(), "reaping idle daemons");
            for daemon in victims {
                self.retire(daemon);
            }
            self.slot_freed.notify_all();
        }
    }

    fn retire(&self, daemon: Daemon) {
        daemon.terminate();
        self.retired.fetch_add(1, Ordering::Relaxed);
    }

    /// Shut the pool down, terminating every idle daemon.
    ///
    /// Outstanding leases drain naturally: daemons released after shutdown
    /// are terminated rather than pooled. Subsequent acquires fail with
    /// `DaemonError::PoolShutDown`.
    pub fn shutdown(&self) {
        let victims: Vec<Daemon> = {
            let mut inner = self.inner.lock().unwrap();
            if inner.shutdown {
                return;
            }
            inner.shutdown = true;
            let drained: Vec<Daemon> = inner
                .idle
                .drain()
                .flat_map(|(_, q)| q.into_iter())
                .collect();
            inner.total -= drained.len();
            drained
        };
        self.slot_freed.notify_all();

        info!(count = victims.len(), "daemon pool shutting down");
        for daemon in victims {
            self.retire(daemon);
        }

        {
            let mut stop = self.reaper_signal.lock().unwrap();
            *stop = true;
        }
        self.reaper_wake.notify_all();
        if let Some(handle) = self.reaper.lock().unwrap().take() {
            // The reaper itself can end up running this drop path if it
            // holds the last reference; it must not join on itself.
            if handle.thread().id() != thread::current().id() {
                if handle.join().is_err() {
                    warn!("daemon reaper panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for DaemonPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// An exclusive lease on one pooled daemon.
///
/// Dropping the lease returns the daemon to the pool; a daemon that died
/// mid-lease is discarded instead.
pub struct DaemonLease {
    pool: Weak<DaemonPool>,
    daemon: Option<Daemon>,
}

impl DaemonLease {
    fn new(pool: Weak<DaemonPool>, daemon: Daemon) -> Self {
        Self {
            pool,
            daemon: Some(daemon),
        }
    }

    fn daemon(&self) -> &Daemon {
        self.daemon.as_ref().expect("daemon lease already released")
    }

    /// The leased daemon's identity.
    pub fn daemon_id(&self) -> DaemonId {
        self.daemon().id()
    }

    /// The leased daemon's process id.
    pub fn pid(&self) -> u32 {
        self.daemon().pid()
    }

    /// The context key the daemon serves.
    pub fn key(&self) -> ContextKey {
        self.daemon().key()
    }

    /// Dispatch one request on the leased daemon.
    pub fn dispatch(&mut self, request: &DaemonRequest) -> Result<DaemonResponse> {
        self.daemon
            .as_mut()
            .expect("daemon lease already released")
            .dispatch(request)
    }
}

impl fmt::Debug for DaemonLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.daemon {
            Some(daemon) => f.debug_struct("DaemonLease").field("daemon", daemon).finish(),
            None => f.debug_struct("DaemonLease").field("daemon", &"released").finish(),
        }
    }
}

impl Drop for DaemonLease {
    fn drop(&mut self) {
        if let Some(daemon) = self.daemon.take() {
            match self.pool.upgrade() {
                Some(pool) => pool.release(daemon),
                None => daemon.terminate(),
            }
        }
    }
}
