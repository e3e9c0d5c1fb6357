//! # Drover Core
//!
//! `drover_core` provides the fundamental building blocks for the Drover
//! work-dispatch engine. This includes error types, ID definitions, the
//! work-item data model, and the traits implemented by execution backends
//! and units of work.
//!
//! ## Core Principles
//!
//! The engine is built around a small set of architectural decisions:
//!
//! 1. **One submission contract, three isolation strategies**: every unit of
//!    work is described by an immutable [`WorkItem`] carrying a tagged
//!    [`Isolation`] variant. Dispatch is a single match over that closed set;
//!    there is no fallback or auto-downgrade between strategies.
//!
//! 2. **Explicit ownership**: the engine, its thread pool and its daemon pool
//!    are explicitly constructed and torn down. There is no ambient global
//!    state; tests instantiate independent engines and pools.
//!
//! 3. **Failures are values**: every failure is captured at the result
//!    boundary and surfaced through [`WorkOutcome`]; nothing is thrown
//!    across engine internals uncaught.
//!
//! ## Crate Structure
//!
//! - **error**: error types for all engine components
//! - **id**: strongly-typed identifier types
//! - **types**: the work-item data model
//! - **traits**: interfaces for actions and execution backends

pub mod error;
pub mod id;
pub mod traits;
pub mod types;

// Re-export key types and traits for convenience
pub use error::{BatchFailure, DaemonError, DispatchError, Error, MarshalError, Result};
pub use id::{BatchId, DaemonId, WorkItemId};
pub use traits::{ActionContext, ContextState, ExecutionBackend, WorkAction};
pub use types::{
    ContextKey, Isolation, Param, ParamValue, ProcessOptions, SharedHandle, WorkItem, WorkOutcome,
};
