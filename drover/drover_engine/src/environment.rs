//! Execution environments.
//!
//! An [`ExecutionEnvironment`] is the unit of in-process isolation: a
//! mutable state store scoped either to the whole process (shared context)
//! or to one classpath signature (isolated context). Isolated environments
//! are cached by key and reused across items sharing a signature, never
//! across signatures.

use drover_core::{ActionContext, ContextKey, ContextState, WorkItemId};

/// One in-process execution environment.
pub struct ExecutionEnvironment {
    key: Option<ContextKey>,
    state: ContextState,
}

impl ExecutionEnvironment {
    /// Create the process-wide shared environment.
    pub fn shared() -> Self {
        Self {
            key: None,
            state: ContextState::default(),
        }
    }

    /// Create a private environment scoped to a classpath signature.
    pub fn for_key(key: ContextKey) -> Self {
        Self {
            key: Some(key),
            state: ContextState::default(),
        }
    }

    /// The classpath signature this environment is scoped to, if any.
    pub fn key(&self) -> Option<ContextKey> {
        self.key
    }

    /// The environment's mutable state store.
    pub fn state(&self) -> &ContextState {
        &self.state
    }

    /// Build the action context for one item running in this environment.
    pub fn context(&self, item_id: WorkItemId) -> ActionContext<'_> {
        ActionContext::new(item_id, &self.state)
    }
}
