//! The unit-of-work interface.
//!
//! A [`WorkAction`] is the interchangeable payload of the engine: a named,
//! stateless piece of computation resolved by reference in whatever
//! execution environment a work item lands in. Actions receive an
//! [`ActionContext`] giving scoped access to the environment's mutable
//! state, which is how the isolation guarantees become observable: shared
//! items see one process-wide store, isolated items see one store per
//! classpath signature, and process items see the store of their daemon.

use crate::error::Result;
use crate::id::WorkItemId;
use crate::types::{Param, ParamValue};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutable key/value state owned by one execution environment.
pub type ContextState = Mutex<HashMap<String, ParamValue>>;

/// Execution context handed to an action for the duration of one run.
pub struct ActionContext<'a> {
    item_id: WorkItemId,
    state: &'a ContextState,
}

impl<'a> ActionContext<'a> {
    /// Create a context for one item against an environment's state store.
    pub fn new(item_id: WorkItemId, state: &'a ContextState) -> Self {
        Self { item_id, state }
    }

    /// The id of the item currently executing.
    pub fn item_id(&self) -> WorkItemId {
        self.item_id
    }

    /// Read a value from the environment state.
    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.state.lock().unwrap().get(key).cloned()
    }

    /// Write a value into the environment state.
    pub fn put(&self, key: impl Into<String>, value: ParamValue) {
        self.state.lock().unwrap().insert(key.into(), value);
    }

    /// Atomically read-modify-write a state entry, returning the new value.
    pub fn update<F>(&self, key: &str, f: F) -> ParamValue
    where
        F: FnOnce(Option<&ParamValue>) -> ParamValue,
    {
        let mut state = self.state.lock().unwrap();
        let next = f(state.get(key));
        state.insert(key.to_string(), next.clone());
        next
    }
}

/// A named, serializable-by-reference unit of work.
///
/// Implementations must be thread-safe: shared-context items run the same
/// action instance concurrently from multiple pool threads.
pub trait WorkAction: Send + Sync {
    /// The reference under which this action is resolved.
    fn name(&self) -> &str;

    /// Execute the action against the given parameters.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Scoped access to the environment executing this item.
    /// * `params` - The item's ordered parameters.
    ///
    /// # Returns
    ///
    /// * `Ok(ParamValue)` - The action's result value.
    /// * `Err` - The action's failure, captured as the item's outcome.
    fn run(&self, ctx: &ActionContext<'_>, params: &[Param]) -> Result<ParamValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_state_round_trip() {
        let state = ContextState::default();
        let ctx = ActionContext::new(WorkItemId::new(), &state);

        assert!(ctx.get("missing").is_none());
        ctx.put("greeting", "hello".into());
        assert_eq!(ctx.get("greeting"), Some(ParamValue::Str("hello".into())));
    }

    #[test]
    fn test_context_update_is_read_modify_write() {
        let state = ContextState::default();
        let ctx = ActionContext::new(WorkItemId::new(), &state);

        for expected in 1..=3 {
            let next = ctx.update("count", |prev| {
                ParamValue::Int(prev.and_then(ParamValue::as_int).unwrap_or(0) + 1)
            });
            assert_eq!(next, ParamValue::Int(expected));
        }
    }
}
