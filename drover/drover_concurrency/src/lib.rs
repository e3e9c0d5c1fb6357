#![deny(warnings)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Drover Concurrency
//!
//! Concurrency primitives for the Drover work-dispatch engine.
//!
//! This crate provides the in-process execution substrate:
//!
//! - A fixed-size worker pool executing submitted closures in parallel
//! - A completion latch implementing the batch barrier
//!
//! ## Integration with Other Drover Crates
//!
//! - **drover_engine**: runs shared- and isolated-context items on the
//!   worker pool and blocks batch barriers on the latch

/// Worker pooling for parallel task execution
pub mod pool;

/// Synchronization primitives for the dispatch engine
pub mod sync;

// Re-export key types for easier access
pub use pool::worker::WorkerPool;
pub use sync::latch::CompletionLatch;
