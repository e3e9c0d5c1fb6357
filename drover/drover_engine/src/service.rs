//! The dispatch engine.
//!
//! Ties the pieces together: work items are validated at submission,
//! queued on a thread pool, routed to the backend matching their isolation
//! strategy, and collected behind a per-batch completion barrier.

use crate::backend::{Backends, IsolatedBackend, ProcessBackend, SharedBackend};
use crate::config::EngineConfig;
use crate::daemon::{DaemonPool, DaemonPoolStats};
use crate::environment::ExecutionEnvironment;
use crate::registry::ActionRegistry;
use drover_concurrency::pool::{WorkerPool, WorkerPoolConfig, WorkerPoolStats};
use drover_concurrency::CompletionLatch;
use drover_core::{
    BatchFailure, BatchId, DispatchError, Error, Isolation, ParamValue, Result, WorkAction,
    WorkItem, WorkItemId, WorkOutcome,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// An open collection of submitted work awaiting its barrier.
///
/// Batches are append-only until [`DispatchEngine::wait`] closes them;
/// submitting to a closed batch fails with `BatchClosed`.
pub struct SubmissionBatch {
    id: BatchId,
    latch: Arc<CompletionLatch>,
    slots: Arc<Mutex<BTreeMap<WorkItemId, Option<WorkOutcome>>>>,
    closed: AtomicBool,
}

impl SubmissionBatch {
    fn new() -> Self {
        Self {
            id: BatchId::new(),
            latch: Arc::new(CompletionLatch::new()),
            slots: Arc::new(Mutex::new(BTreeMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// The batch identity.
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Number of items submitted so far.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Whether the batch has no items.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }

    /// Items still outstanding.
    pub fn outstanding(&self) -> usize {
        self.latch.outstanding()
    }
}

/// A receipt for one submitted work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkHandle {
    /// The submitted item.
    pub item_id: WorkItemId,

    /// The batch the item belongs to.
    pub batch_id: BatchId,
}

/// The work-dispatch engine.
///
/// Construct one explicitly with [`DispatchEngine::new`], register actions,
/// then submit items in batches and wait on each batch's barrier.
pub struct DispatchEngine {
    registry: Arc<ActionRegistry>,
    workers: WorkerPool,
    backends: Arc<Backends>,
    daemons: Arc<DaemonPool>,
}

impl DispatchEngine {
    /// Build an engine from configuration.
    pub fn new(config: EngineConfig) -> Self {
        let registry = Arc::new(ActionRegistry::new());
        let daemons = DaemonPool::start(config.daemons.clone());

        let backends = Arc::new(Backends::new(
            SharedBackend::new(
                Arc::clone(&registry),
                Arc::new(ExecutionEnvironment::shared()),
            ),
            IsolatedBackend::new(Arc::clone(&registry)),
            ProcessBackend::new(Arc::clone(&daemons)),
        ));

        let workers = WorkerPool::with_config(WorkerPoolConfig {
            workers: config.worker_threads,
            thread_name_prefix: "drover-dispatch".to_string(),
        });

        info!(
            workers = config.worker_threads,
            max_daemons = config.daemons.max_daemons,
            "dispatch engine started"
        );

        Self {
            registry,
            workers,
            backends,
            daemons,
        }
    }

    /// Register an action, replacing any previous action of the same name.
    pub fn register_action(&self, action: Arc<dyn WorkAction>) {
        self.registry.register(action);
    }

    /// The engine's action registry.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Open an empty batch.
    pub fn open_batch(&self) -> SubmissionBatch {
        SubmissionBatch::new()
    }

    /// Submit one item into a batch.
    ///
    /// Structural problems with the descriptor are rejected here, before
    /// anything is queued; value-level marshaling problems surface later as
    /// the item's outcome.
    ///
    /// # Errors
    ///
    /// * `DispatchError::InvalidDescriptor` - Empty action name, a shared
    ///   handle on a non-shared item, or process isolation with no worker
    ///   executable available.
    /// * `DispatchError::BatchClosed` - The batch barrier already ran.
    /// * `DispatchError::ShuttingDown` - The engine is shutting down.
    pub fn submit(&self, batch: &SubmissionBatch, item: WorkItem) -> Result<WorkHandle> {
        self.validate(&item)?;

        if batch.closed.load(Ordering::Acquire) {
            return Err(Error::Dispatch(DispatchError::BatchClosed(batch.id)));
        }

        let item_id = item.id;
        batch.slots.lock().unwrap().insert(item_id, None);
        batch.latch.add(1);

        let backends = Arc::clone(&self.backends);
        let slots = Arc::clone(&batch.slots);
        let latch = Arc::clone(&batch.latch);

        let queued = self.workers.execute(move || {
            let backend = backends.for_isolation(item.isolation);
            let outcome = WorkOutcome::from(backend.execute(&item));
            slots.lock().unwrap().insert(item.id, Some(outcome));
            latch.count_down();
        });

        if queued.is_err() {
            batch.slots.lock().unwrap().remove(&item_id);
            batch.latch.count_down();
            return Err(Error::Dispatch(DispatchError::ShuttingDown));
        }

        debug!(batch = %batch.id, item = %item_id, "item submitted");
        Ok(WorkHandle {
            item_id,
            batch_id: batch.id,
        })
    }

    fn validate(&self, item: &WorkItem) -> Result<()> {
        if item.action.trim().is_empty() {
            return Err(Error::Dispatch(DispatchError::InvalidDescriptor(
                "action name is empty".into(),
            )));
        }

        if item.isolation != Isolation::Shared && item.params.iter().any(|p| p.is_handle()) {
            return Err(Error::Dispatch(DispatchError::InvalidDescriptor(format!(
                "shared handles cannot cross the {} boundary",
                item.isolation.boundary_name()
            ))));
        }

        if item.isolation == Isolation::Process {
            let has_executable = item
                .process_options
                .as_ref()
                .and_then(|o| o.executable.as_ref())
                .is_some()
                || self.daemons.config().default_executable.is_some();
            if !has_executable {
                return Err(Error::Dispatch(DispatchError::InvalidDescriptor(
                    "process isolation requires a worker executable".into(),
                )));
            }
        }

        Ok(())
    }

    /// Block until every item in the batch has an outcome.
    ///
    /// Closes the batch, waits on its barrier, and partitions the results.
    /// If any item failed, every failure is reported together in one
    /// [`BatchFailure`]; successes from the same batch are dropped, matching
    /// the all-or-nothing result contract.
    pub fn wait(&self, batch: &SubmissionBatch) -> Result<BTreeMap<WorkItemId, ParamValue>> {
        batch.closed.store(true, Ordering::Release);
        batch.latch.wait();

        let mut slots = batch.slots.lock().unwrap();
        let mut results = BTreeMap::new();
        let mut failures = Vec::new();

        for (item_id, slot) in std::mem::take(&mut *slots) {
            match slot {
                Some(WorkOutcome::Success(value)) => {
                    results.insert(item_id, value);
                }
                Some(WorkOutcome::Failure(error)) => failures.push((item_id, error)),
                None => failures.push((
                    item_id,
                    Error::Runtime("item completed without an outcome".into()),
                )),
            }
        }
        drop(slots);

        if failures.is_empty() {
            debug!(batch = %batch.id, items = results.len(), "batch complete");
            Ok(results)
        } else {
            debug!(batch = %batch.id, failures = failures.len(), "batch failed");
            Err(Error::Batch(BatchFailure { failures }))
        }
    }

    /// Submission pool counters.
    pub fn worker_stats(&self) -> WorkerPoolStats {
        self.workers.stats()
    }

    /// Daemon pool counters.
    pub fn daemon_stats(&self) -> DaemonPoolStats {
        self.daemons.stats()
    }

    /// Stop accepting work and terminate every daemon.
    ///
    /// Tasks already queued on the submission pool still drain; in-flight
    /// batches can still be waited on.
    pub fn shutdown(&self) {
        info!("dispatch engine shutting down");
        self.workers.shutdown();
        self.daemons.shutdown();
    }
}

impl Drop for DispatchEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
