//! Core trait definitions for the Drover engine.
//!
//! - **action**: the unit-of-work interface and its execution context
//! - **backend**: the polymorphic execution-backend seam

mod action;
mod backend;

pub use action::{ActionContext, ContextState, WorkAction};
pub use backend::ExecutionBackend;
