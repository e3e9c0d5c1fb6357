//! Built-in actions.
//!
//! A small set of actions compiled into both the host and the stock worker
//! executable. They exercise every part of the engine surface (parameters,
//! context state, failures, daemon identity) and double as examples of the
//! [`WorkAction`] contract.

use drover_core::{
    ActionContext, DispatchError, Error, Param, ParamValue, Result, WorkAction,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::registry::ActionRegistry;

/// Register every built-in action.
pub fn register_builtin(registry: &ActionRegistry) {
    registry.register(Arc::new(HashAction));
    registry.register(Arc::new(CounterAction));
    registry.register(Arc::new(FailAction));
    registry.register(Arc::new(SleepAction));
    registry.register(Arc::new(PidAction));
}

/// `hash`: SHA-256 over the string parameters, hex encoded.
pub struct HashAction;

impl WorkAction for HashAction {
    fn name(&self) -> &str {
        "hash"
    }

    fn run(&self, _ctx: &ActionContext<'_>, params: &[Param]) -> Result<ParamValue> {
        let mut hasher = Sha256::new();
        for param in params {
            let text = param
                .value()
                .and_then(ParamValue::as_str)
                .ok_or_else(|| {
                    Error::Dispatch(DispatchError::ActionFailed(
                        "hash takes string parameters".into(),
                    ))
                })?;
            hasher.update(text.as_bytes());
        }
        Ok(ParamValue::Str(hex::encode(hasher.finalize())))
    }
}

/// `counter`: increment a named counter in the context state and return it.
///
/// The counter's visibility is exactly the isolation strategy's: shared
/// items bump one process-wide counter, isolated items one per signature,
/// process items one per daemon.
pub struct CounterAction;

impl WorkAction for CounterAction {
    fn name(&self) -> &str {
        "counter"
    }

    fn run(&self, ctx: &ActionContext<'_>, params: &[Param]) -> Result<ParamValue> {
        let name = params
            .first()
            .and_then(Param::value)
            .and_then(ParamValue::as_str)
            .unwrap_or("counter")
            .to_string();
        Ok(ctx.update(&name, |prev| {
            ParamValue::Int(prev.and_then(ParamValue::as_int).unwrap_or(0) + 1)
        }))
    }
}

/// `fail`: fail with the given message.
pub struct FailAction;

impl WorkAction for FailAction {
    fn name(&self) -> &str {
        "fail"
    }

    fn run(&self, _ctx: &ActionContext<'_>, params: &[Param]) -> Result<ParamValue> {
        let message = params
            .first()
            .and_then(Param::value)
            .and_then(ParamValue::as_str)
            .unwrap_or("failed on request")
            .to_string();
        Err(Error::Dispatch(DispatchError::ActionFailed(message)))
    }
}

/// `sleep`: block for the given number of milliseconds.
pub struct SleepAction;

impl WorkAction for SleepAction {
    fn name(&self) -> &str {
        "sleep"
    }

    fn run(&self, _ctx: &ActionContext<'_>, params: &[Param]) -> Result<ParamValue> {
        let millis = params
            .first()
            .and_then(Param::value)
            .and_then(ParamValue::as_int)
            .unwrap_or(0)
            .max(0) as u64;
        std::thread::sleep(Duration::from_millis(millis));
        Ok(ParamValue::Int(millis as i64))
    }
}

/// `pid`: report the executing process id.
///
/// Under shared or isolated context this is the host pid; under process
/// context it is the daemon's, which makes daemon reuse observable.
pub struct PidAction;

impl WorkAction for PidAction {
    fn name(&self) -> &str {
        "pid"
    }

    fn run(&self, _ctx: &ActionContext<'_>, _params: &[Param]) -> Result<ParamValue> {
        Ok(ParamValue::Int(std::process::id() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::{ContextState, WorkItemId};

    fn ctx(state: &ContextState) -> ActionContext<'_> {
        ActionContext::new(WorkItemId::new(), state)
    }

    #[test]
    fn test_register_builtin_covers_all() {
        let registry = ActionRegistry::new();
        register_builtin(&registry);
        for name in ["hash", "counter", "fail", "sleep", "pid"] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        let state = ContextState::default();
        let params = vec![Param::from("abc")];
        let a = HashAction.run(&ctx(&state), &params).unwrap();
        let b = HashAction.run(&ctx(&state), &params).unwrap();
        assert_eq!(a, b);
        // Known SHA-256 of "abc".
        assert_eq!(
            a.as_str().unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_rejects_non_strings() {
        let state = ContextState::default();
        let err = HashAction
            .run(&ctx(&state), &[Param::from(3i64)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Dispatch(DispatchError::ActionFailed(_))
        ));
    }

    #[test]
    fn test_counter_accumulates_in_context() {
        let state = ContextState::default();
        assert_eq!(
            CounterAction.run(&ctx(&state), &[]).unwrap(),
            ParamValue::Int(1)
        );
        assert_eq!(
            CounterAction.run(&ctx(&state), &[]).unwrap(),
            ParamValue::Int(2)
        );
        assert_eq!(
            CounterAction
                .run(&ctx(&state), &[Param::from("other")])
                .unwrap(),
            ParamValue::Int(1)
        );
    }

    #[test]
    fn test_fail_carries_the_message() {
        let state = ContextState::default();
        let err = FailAction
            .run(&ctx(&state), &[Param::from("on purpose")])
            .unwrap_err();
        assert!(err.to_string().contains("on purpose"));
    }
}
