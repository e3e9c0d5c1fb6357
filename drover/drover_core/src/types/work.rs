//! Work descriptors and outcomes.

use crate::id::WorkItemId;
use crate::types::{ContextKey, Param, ParamValue, ProcessOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The isolation strategy a work item executes under.
///
/// A closed variant set: backend selection is a pure match over this enum,
/// with no fallback or auto-downgrade between strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Isolation {
    /// One process-wide execution environment shared by all items.
    ///
    /// Fastest, no setup cost. Mutable shared state is visible to every
    /// concurrently running shared item; concurrent correctness of the
    /// action itself is the caller's responsibility.
    Shared,

    /// A private execution environment scoped to the item's classpath
    /// signature. Environments are cached and reused across items sharing a
    /// signature, never across signatures. Same process, so no crash
    /// containment.
    Isolated,

    /// Execution in a long-lived daemon process borrowed from the daemon
    /// pool. Full isolation including crash containment; highest latency on
    /// cold start, lowest on warm reuse.
    Process,
}

impl Isolation {
    /// Human-readable name of the boundary, used in errors and logs.
    pub fn boundary_name(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Isolated => "classloader",
            Self::Process => "process",
        }
    }
}

/// An immutable descriptor of one unit of work.
///
/// A work item executes exactly once under exactly one isolation strategy.
/// Submission takes ownership, so a submitted descriptor can no longer be
/// mutated by the caller.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Unique identity of this item.
    pub id: WorkItemId,

    /// Reference to the action, resolved in the destination environment.
    pub action: String,

    /// Ordered parameters handed to the action.
    pub params: Vec<Param>,

    /// The isolation strategy this item requires.
    pub isolation: Isolation,

    /// Ordered set of resource locations defining the execution environment.
    pub classpath: Vec<PathBuf>,

    /// Launch configuration for process isolation.
    pub process_options: Option<ProcessOptions>,
}

impl WorkItem {
    /// Create a descriptor with a fresh id and no classpath or options.
    pub fn new(action: impl Into<String>, params: Vec<Param>, isolation: Isolation) -> Self {
        Self {
            id: WorkItemId::new(),
            action: action.into(),
            params,
            isolation,
            classpath: Vec::new(),
            process_options: None,
        }
    }

    /// Set the classpath, returning the descriptor.
    pub fn with_classpath(mut self, classpath: Vec<PathBuf>) -> Self {
        self.classpath = classpath;
        self
    }

    /// Set the process options, returning the descriptor.
    pub fn with_process_options(mut self, options: ProcessOptions) -> Self {
        self.process_options = Some(options);
        self
    }

    /// The execution-context key this item is compatible with.
    ///
    /// Shared items all map to the nil classpath key; isolated items are
    /// keyed by classpath alone; process items by classpath plus options.
    pub fn context_key(&self) -> ContextKey {
        match self.isolation {
            Isolation::Shared | Isolation::Isolated => ContextKey::for_classpath(&self.classpath),
            Isolation::Process => {
                ContextKey::derive(&self.classpath, self.process_options.as_ref())
            }
        }
    }
}

/// Terminal result of one work item.
#[derive(Debug)]
pub enum WorkOutcome {
    /// The action completed and produced a value.
    Success(ParamValue),

    /// The action or its boundary crossing failed.
    Failure(crate::error::Error),
}

impl WorkOutcome {
    /// Check whether this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Convert into a result, consuming the outcome.
    pub fn into_result(self) -> crate::error::Result<ParamValue> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(err),
        }
    }
}

impl From<crate::error::Result<ParamValue>> for WorkOutcome {
    fn from(result: crate::error::Result<ParamValue>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}
