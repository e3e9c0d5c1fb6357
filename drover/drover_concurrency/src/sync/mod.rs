//! Synchronization primitives for the dispatch engine.
//!
//! This module provides the blocking primitives the engine exposes to
//! callers:
//!
//! - A completion latch implementing the batch barrier: the single point
//!   where a caller may block on outstanding work

pub mod latch;

// Re-export key types from latch
pub use latch::CompletionLatch;
