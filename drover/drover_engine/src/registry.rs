//! Action resolution.
//!
//! This module provides the registry that resolves a work item's action
//! reference to an executable [`WorkAction`]. The host process registers its
//! actions once; worker daemons carry their own registry, compiled into the
//! worker executable, which is how an action reference gets resolved on the
//! far side of the process boundary.

use dashmap::DashMap;
use drover_core::WorkAction;
use std::sync::Arc;

/// A name-indexed set of registered actions.
#[derive(Default)]
pub struct ActionRegistry {
    actions: DashMap<String, Arc<dyn WorkAction>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
        }
    }

    /// Register an action under its own name.
    ///
    /// Registering a second action with the same name replaces the first.
    pub fn register(&self, action: Arc<dyn WorkAction>) {
        self.actions.insert(action.name().to_string(), action);
    }

    /// Resolve an action reference.
    ///
    /// # Returns
    ///
    /// * `Some(action)` - The registered action.
    /// * `None` - If no action carries this name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn WorkAction>> {
        self.actions.get(name).map(|entry| entry.value().clone())
    }

    /// Check whether an action reference resolves.
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{ActionContext, Param, ParamValue, Result};

    struct EchoAction;

    impl WorkAction for EchoAction {
        fn name(&self) -> &str {
            "echo"
        }

        fn run(&self, _ctx: &ActionContext<'_>, params: &[Param]) -> Result<ParamValue> {
            Ok(params
                .first()
                .and_then(Param::value)
                .cloned()
                .unwrap_or(ParamValue::Null))
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ActionRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(EchoAction));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("echo"));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }
}
