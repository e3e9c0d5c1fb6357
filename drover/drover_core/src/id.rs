//! Strongly-typed identifiers for the Drover engine.
//!
//! This module provides the identifier types used throughout the system,
//! ensuring type safety and clear semantics. Each identifier type is a thin
//! wrapper around a UUID with a phantom type parameter so that identifiers
//! for different entities cannot be mixed up.
//!
//! # Examples
//!
//! ```
//! use drover_core::id::{WorkItemId, DaemonId};
//! use std::str::FromStr;
//!
//! // Create new random IDs
//! let item_id = WorkItemId::new();
//! let daemon_id = DaemonId::new();
//!
//! // Create from string
//! let id_str = "550e8400-e29b-41d4-a716-446655440000";
//! let item_id = WorkItemId::from_str(id_str).unwrap();
//! assert_eq!(item_id.to_string(), id_str);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::{Ord, PartialOrd};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A type-safe identifier based on UUID.
///
/// This is a generic identifier type specialized for different entity types
/// via the phantom type parameter `T`. Identifiers order lexicographically by
/// their underlying UUID, which is the ordering the batch result mapping
/// relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Id<T> {
    uuid: Uuid,
    #[serde(skip)]
    _marker: std::marker::PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Create an identifier from a specific UUID.
    ///
    /// Useful when recreating an identifier received over the daemon wire
    /// protocol.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Create a nil (all zeros) identifier.
    pub fn nil() -> Self {
        Self {
            uuid: Uuid::nil(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Check if this is a nil identifier.
    pub fn is_nil(&self) -> bool {
        self.uuid == Uuid::nil()
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            uuid: Uuid::parse_str(s)?,
            _marker: std::marker::PhantomData,
        })
    }
}

/// Marker type for work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItemMarker;
/// Identifier for a unit of work.
pub type WorkItemId = Id<WorkItemMarker>;

/// Marker type for submission batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchMarker;
/// Identifier for a submission batch.
pub type BatchId = Id<BatchMarker>;

/// Marker type for daemon processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DaemonMarker;
/// Identifier for a long-lived worker daemon.
pub type DaemonId = Id<DaemonMarker>;
