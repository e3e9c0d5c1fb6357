//! Completion latch backing the submission barrier.
//!
//! A counter that grows as work is registered and shrinks as work resolves;
//! waiters block until it reaches zero. Unlike a fixed `CountDownLatch`, the
//! count may be raised while work is still outstanding, which is what lets a
//! caller keep submitting into an open batch before awaiting it.

use log::trace;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A dynamic count-down latch.
///
/// The happens-before edge is the one the barrier contract needs: everything
/// written by a thread before its `count_down` is visible to a thread
/// returning from `wait`.
pub struct CompletionLatch {
    outstanding: Mutex<usize>,
    zeroed: Condvar,
}

impl CompletionLatch {
    /// Create a latch with nothing outstanding.
    pub fn new() -> Self {
        Self {
            outstanding: Mutex::new(0),
            zeroed: Condvar::new(),
        }
    }

    /// Register `n` additional units of outstanding work.
    pub fn add(&self, n: usize) {
        let mut outstanding = self.outstanding.lock().unwrap();
        *outstanding += n;
    }

    /// Resolve one unit of outstanding work.
    ///
    /// # Panics
    ///
    /// Panics if called more times than `add` accounted for; that is a
    /// bookkeeping bug in the caller, not a runtime condition.
    pub fn count_down(&self) {
        let mut outstanding = self.outstanding.lock().unwrap();
        *outstanding = outstanding
            .checked_sub(1)
            .expect("count_down without matching add");
        if *outstanding == 0 {
            trace!("latch reached zero, waking waiters");
            self.zeroed.notify_all();
        }
    }

    /// Current number of outstanding units.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock().unwrap()
    }

    /// Block until nothing is outstanding.
    ///
    /// Returns immediately if the count is already zero.
    pub fn wait(&self) {
        let mut outstanding = self.outstanding.lock().unwrap();
        while *outstanding != 0 {
            outstanding = self.zeroed.wait(outstanding).unwrap();
        }
    }

    /// Block until nothing is outstanding or the timeout elapses.
    ///
    /// Returns `true` if the latch reached zero within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut outstanding = self.outstanding.lock().unwrap();
        while *outstanding != 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self.zeroed.wait_timeout(outstanding, deadline - now).unwrap();
            outstanding = guard;
            if result.timed_out() && *outstanding != 0 {
                return false;
            }
        }
        true
    }
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}
