//! Execution-context identity.
//!
//! This module defines [`ProcessOptions`], the opaque launch configuration
//! for daemon processes, and [`ContextKey`], the deterministic signature that
//! decides whether two work items may share a reusable execution context.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Launch configuration for a process-context daemon.
///
/// The engine does not interpret these settings beyond folding them into the
/// [`ContextKey`] signature and passing them to the process launcher. Two
/// items with byte-identical options are compatible with the same daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProcessOptions {
    /// Path to the worker executable. When `None`, the pool's configured
    /// default executable is used.
    pub executable: Option<PathBuf>,

    /// Additional launch flags passed verbatim to the executable.
    pub launch_flags: Vec<String>,

    /// Key/value properties exported into the daemon's environment.
    pub system_properties: BTreeMap<String, String>,

    /// Minimum memory hint, in megabytes.
    pub min_memory_mb: Option<u64>,

    /// Maximum memory hint, in megabytes.
    pub max_memory_mb: Option<u64>,
}

impl ProcessOptions {
    /// Create options launching the given executable with no extra settings.
    pub fn for_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
            ..Default::default()
        }
    }

    /// Fold this configuration into a context signature.
    ///
    /// Field order is fixed and `system_properties` is a sorted map, so the
    /// digest is deterministic for equal option sets.
    fn digest_into(&self, hasher: &mut Sha256) {
        if let Some(exe) = &self.executable {
            hasher.update(exe.to_string_lossy().as_bytes());
        }
        hasher.update([0u8]);
        for flag in &self.launch_flags {
            hasher.update(flag.as_bytes());
            hasher.update([0u8]);
        }
        for (key, value) in &self.system_properties {
            hasher.update(key.as_bytes());
            hasher.update([b'=']);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(self.min_memory_mb.unwrap_or(0).to_le_bytes());
        hasher.update(self.max_memory_mb.unwrap_or(0).to_le_bytes());
    }
}

/// Deterministic identity of an execution environment.
///
/// Derived from the classpath signature and the process-options signature.
/// Two work items with equal keys are compatible with the same reusable
/// context; items with different keys never share one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextKey([u8; 32]);

impl ContextKey {
    /// Derive the key for a classpath and optional process options.
    ///
    /// The classpath is an ordered set: entry order is significant, exactly
    /// as resolution order is significant in the execution environment.
    pub fn derive(classpath: &[PathBuf], options: Option<&ProcessOptions>) -> Self {
        let mut hasher = Sha256::new();
        for entry in classpath {
            hasher.update(entry.to_string_lossy().as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([0xff]);
        if let Some(options) = options {
            options.digest_into(&mut hasher);
        }
        Self(hasher.finalize().into())
    }

    /// Derive the key for a classpath alone (classloader-scoped contexts).
    pub fn for_classpath(classpath: &[PathBuf]) -> Self {
        Self::derive(classpath, None)
    }

    /// Short hexadecimal form used in logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Debug for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextKey({})", self.short())
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
