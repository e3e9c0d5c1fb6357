//! Worker pool implementation for parallel execution.
//!
//! Provides a fixed-size pool of worker threads draining an unbounded task
//! queue. The queue is unbounded on purpose: work submission must never
//! block the caller, so backpressure lives elsewhere (the daemon-count
//! ceiling), not in this queue.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, trace};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Error when submitting a task to the worker pool
#[derive(Error, Debug)]
pub enum WorkerPoolError {
    /// The pool is shutting down and no longer accepts tasks
    #[error("worker pool is shutting down")]
    ShuttingDown,
}

/// Counters describing pool activity
#[derive(Debug, Default, Clone)]
pub struct WorkerPoolStats {
    /// Number of tasks accepted into the queue
    pub tasks_queued: usize,

    /// Number of tasks that ran to completion
    pub tasks_completed: usize,

    /// Number of tasks that panicked
    pub tasks_panicked: usize,
}

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads
    pub workers: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            thread_name_prefix: "drover-worker".to_string(),
        }
    }
}

type Task = Box<dyn FnOnce() + Send + 'static>;

struct WorkerShared {
    receiver: Receiver<Task>,
    shutdown: Arc<AtomicBool>,
    completed: Arc<AtomicUsize>,
    panicked: Arc<AtomicUsize>,
}

/// A fixed-size pool of worker threads.
pub struct WorkerPool {
    sender: Sender<Task>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    panicked: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Create a pool with the given number of worker threads.
    pub fn new(workers: usize) -> Self {
        Self::with_config(WorkerPoolConfig {
            workers,
            ..Default::default()
        })
    }

    /// Create a pool with the specified configuration.
    pub fn with_config(config: WorkerPoolConfig) -> Self {
        let (sender, receiver) = unbounded::<Task>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let queued = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let panicked = Arc::new(AtomicUsize::new(0));

        info!("Creating worker pool with {} workers", config.workers);

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers.max(1) {
            let shared = WorkerShared {
                receiver: receiver.clone(),
                shutdown: Arc::clone(&shutdown),
                completed: Arc::clone(&completed),
                panicked: Arc::clone(&panicked),
            };

            let builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            let handle = builder
                .spawn(move || Self::worker_loop(id, shared))
                .expect("Failed to spawn worker thread");
            workers.push(handle);
        }

        Self {
            sender,
            workers,
            shutdown,
            queued,
            completed,
            panicked,
        }
    }

    /// Worker thread main loop.
    fn worker_loop(id: usize, shared: WorkerShared) {
        debug!("Worker {}: starting", id);

        loop {
            // Wake up periodically to observe the shutdown flag even when
            // the queue stays empty.
            match shared.receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(task) => {
                    trace!("Worker {}: executing task", id);
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task));
                    match result {
                        Ok(()) => {
                            shared.completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(panic) => {
                            error!(
                                "Worker {}: task panicked: {:?}",
                                id,
                                panic.downcast_ref::<&str>().unwrap_or(&"<unknown panic>")
                            );
                            shared.panicked.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                Err(_) => {
                    if shared.shutdown.load(Ordering::Relaxed) && shared.receiver.is_empty() {
                        break;
                    }
                }
            }
        }

        debug!("Worker {}: shutting down", id);
    }

    /// Submit a task for execution. Never blocks.
    pub fn execute<F>(&self, f: F) -> Result<(), WorkerPoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerPoolError::ShuttingDown);
        }

        self.sender
            .send(Box::new(f))
            .map_err(|_| WorkerPoolError::ShuttingDown)?;
        self.queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Current pool counters.
    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            tasks_queued: self.queued.load(Ordering::Relaxed),
            tasks_completed: self.completed.load(Ordering::Relaxed),
            tasks_panicked: self.panicked.load(Ordering::Relaxed),
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Check whether the pool has begun shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stop accepting tasks. Queued tasks still drain.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Shut down and wait for workers to drain the queue and exit.
    pub fn shutdown_and_join(mut self) {
        self.shutdown();
        for worker in self.workers.drain(..) {
            worker.join().unwrap_or_else(|e| {
                error!("Worker thread panicked during shutdown: {:?}", e);
            });
        }
        info!("Worker pool shutdown complete");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
        // Workers exit once they observe the flag with an empty queue.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_worker_pool_basic() {
        let pool = WorkerPool::new(4);
        assert_eq!(pool.worker_count(), 4);

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        pool.execute(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_worker_pool_multiple_tasks() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
            })
            .unwrap();
        }

        thread::sleep(Duration::from_millis(300));
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_worker_pool_panic_handling() {
        let pool = WorkerPool::new(1);

        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();

        pool.execute(|| {
            panic!("This task should panic");
        })
        .unwrap();

        // The worker survives the panic and runs the next task.
        pool.execute(move || {
            flag_clone.store(true, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(pool.stats().tasks_panicked, 1);
    }

    #[test]
    fn test_worker_pool_rejects_after_shutdown() {
        let pool = WorkerPool::new(2);
        pool.shutdown();

        let result = pool.execute(|| {});
        assert!(matches!(result, Err(WorkerPoolError::ShuttingDown)));
        assert!(pool.is_shutting_down());
    }

    #[test]
    fn test_worker_pool_drains_queue_on_join() {
        let pool = WorkerPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let counter = counter.clone();
            pool.execute(move || {
                thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown_and_join();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_worker_pool_stats() {
        let pool = WorkerPool::new(2);

        for _ in 0..5 {
            pool.execute(|| {}).unwrap();
        }

        thread::sleep(Duration::from_millis(100));
        let stats = pool.stats();
        assert_eq!(stats.tasks_queued, 5);
        assert_eq!(stats.tasks_completed, 5);
        assert_eq!(stats.tasks_panicked, 0);
    }
}
