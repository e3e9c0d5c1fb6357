//! Isolated-context backend.

use crate::environment::ExecutionEnvironment;
use crate::marshal;
use crate::registry::ActionRegistry;
use dashmap::DashMap;
use drover_core::{ContextKey, ExecutionBackend, Isolation, ParamValue, Result, WorkItem};
use std::sync::Arc;
use tracing::trace;

/// Runs work in a private context per isolation signature.
///
/// Items with the same classpath share one context and its state; items
/// with different classpaths never see each other's state. Parameters
/// cross the boundary by value, so shared handles are rejected.
pub struct IsolatedBackend {
    registry: Arc<ActionRegistry>,
    contexts: DashMap<ContextKey, Arc<ExecutionEnvironment>>,
}

impl IsolatedBackend {
    /// Create a backend with an empty context table.
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            contexts: DashMap::new(),
        }
    }

    /// Number of distinct contexts materialized so far.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    fn environment_for(&self, key: ContextKey) -> Arc<ExecutionEnvironment> {
        self.contexts
            .entry(key)
            .or_insert_with(|| Arc::new(ExecutionEnvironment::for_key(key)))
            .clone()
    }
}

impl ExecutionBackend for IsolatedBackend {
    fn isolation(&self) -> Isolation {
        Isolation::Isolated
    }

    fn execute(&self, item: &WorkItem) -> Result<ParamValue> {
        let key = item.context_key();
        trace!(item = %item.id, action = %item.action, key = %key.short(), "executing in isolated context");
        let params = marshal::by_value(&item.params)?;
        let environment = self.environment_for(key);
        super::run_in_environment(&self.registry, &environment, item, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{ActionContext, Param, WorkAction};
    use std::path::PathBuf;

    struct BumpAction;

    impl WorkAction for BumpAction {
        fn name(&self) -> &str {
            "bump"
        }

        fn run(&self, ctx: &ActionContext<'_>, _params: &[Param]) -> Result<ParamValue> {
            Ok(ctx.update("count", |prev| {
                ParamValue::Int(prev.and_then(ParamValue::as_int).unwrap_or(0) + 1)
            }))
        }
    }

    fn backend() -> IsolatedBackend {
        let registry = Arc::new(ActionRegistry::new());
        registry.register(Arc::new(BumpAction));
        IsolatedBackend::new(registry)
    }

    #[test]
    fn test_same_signature_shares_state() {
        let backend = backend();
        let item = WorkItem::new("bump", vec![], Isolation::Isolated)
            .with_classpath(vec![PathBuf::from("/lib/a.jar")]);

        assert_eq!(backend.execute(&item).unwrap(), ParamValue::Int(1));
        assert_eq!(backend.execute(&item).unwrap(), ParamValue::Int(2));
        assert_eq!(backend.context_count(), 1);
    }

    #[test]
    fn test_different_signatures_are_disjoint() {
        let backend = backend();
        let a = WorkItem::new("bump", vec![], Isolation::Isolated)
            .with_classpath(vec![PathBuf::from("/lib/a.jar")]);
        let b = WorkItem::new("bump", vec![], Isolation::Isolated)
            .with_classpath(vec![PathBuf::from("/lib/b.jar")]);

        assert_eq!(backend.execute(&a).unwrap(), ParamValue::Int(1));
        assert_eq!(backend.execute(&b).unwrap(), ParamValue::Int(1));
        assert_eq!(backend.context_count(), 2);
    }

    #[test]
    fn test_handles_rejected_at_the_boundary() {
        let backend = backend();
        let handle: drover_core::SharedHandle = Arc::new(5u8);
        let item = WorkItem::new("bump", vec![Param::Handle(handle)], Isolation::Isolated);
        assert!(backend.execute(&item).is_err());
    }
}
