//! Shared-context backend.

use crate::environment::ExecutionEnvironment;
use crate::marshal;
use crate::registry::ActionRegistry;
use drover_core::{ExecutionBackend, Isolation, ParamValue, Result, WorkItem};
use std::sync::Arc;
use tracing::trace;

/// Runs work directly in the engine's shared execution context.
///
/// Parameters pass by reference, so shared handles reach the action
/// untouched and every item sees the same context state.
pub struct SharedBackend {
    registry: Arc<ActionRegistry>,
    environment: Arc<ExecutionEnvironment>,
}

impl SharedBackend {
    /// Create a backend over the engine registry and shared context.
    pub fn new(registry: Arc<ActionRegistry>, environment: Arc<ExecutionEnvironment>) -> Self {
        Self {
            registry,
            environment,
        }
    }

    /// The shared context every item executes in.
    pub fn environment(&self) -> &Arc<ExecutionEnvironment> {
        &self.environment
    }
}

impl ExecutionBackend for SharedBackend {
    fn isolation(&self) -> Isolation {
        Isolation::Shared
    }

    fn execute(&self, item: &WorkItem) -> Result<ParamValue> {
        trace!(item = %item.id, action = %item.action, "executing in shared context");
        let params = marshal::by_reference(&item.params);
        super::run_in_environment(&self.registry, &self.environment, item, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{ActionContext, DispatchError, Error, Param, WorkAction};

    struct StashAction;

    impl WorkAction for StashAction {
        fn name(&self) -> &str {
            "stash"
        }

        fn run(&self, ctx: &ActionContext<'_>, params: &[Param]) -> Result<ParamValue> {
            if let Some(Param::Value(v)) = params.first() {
                ctx.put("stashed", v.clone());
            }
            Ok(ParamValue::Null)
        }
    }

    fn backend() -> SharedBackend {
        let registry = Arc::new(ActionRegistry::new());
        registry.register(Arc::new(StashAction));
        SharedBackend::new(registry, Arc::new(ExecutionEnvironment::shared()))
    }

    #[test]
    fn test_items_share_one_context() {
        let backend = backend();

        let item = WorkItem::new("stash", vec![Param::from(7i64)], Isolation::Shared);
        backend.execute(&item).unwrap();

        let ctx = backend
            .environment()
            .context(drover_core::WorkItemId::new());
        assert_eq!(ctx.get("stashed"), Some(ParamValue::Int(7)));
    }

    #[test]
    fn test_unknown_action_fails() {
        let backend = backend();
        let item = WorkItem::new("missing", vec![], Isolation::Shared);
        let err = backend.execute(&item).unwrap_err();
        assert!(matches!(
            err,
            Error::Dispatch(DispatchError::ActionNotFound(_))
        ));
    }
}
