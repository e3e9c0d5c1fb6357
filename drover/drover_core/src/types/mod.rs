//! Data structures for the Drover engine.
//!
//! This module defines the work-item data model: marshalable parameter
//! values, the immutable work descriptor, process launch options and the
//! execution-context key.

mod context;
mod value;
mod work;

pub use context::{ContextKey, ProcessOptions};
pub use value::{Param, ParamValue, SharedHandle};
pub use work::{Isolation, WorkItem, WorkOutcome};
