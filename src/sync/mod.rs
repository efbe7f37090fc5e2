//! Cross-context activity sharing.
//!
//! A medium is a single shared "last activity" key that several execution
//! contexts (windows, processes) read and write. The [`ActivityBroadcaster`]
//! sits on top of a medium and turns writes made by *other* contexts into
//! remote-activity callbacks, either live or through periodic drift polling.

pub mod broadcaster;
pub mod memory;
pub mod sqlite;

pub use broadcaster::*;
pub use memory::*;
pub use sqlite::*;

use crate::error::MediumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Identity of one execution context sharing a medium.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    /// Creates an id unique across processes on this host.
    pub fn generate() -> Self {
        let n = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{}", std::process::id(), n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContextId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A write to the shared key, as seen by live subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityWrite {
    pub origin: ContextId,
    pub timestamp_ms: i64,
}

/// Shared storage for the last-activity timestamp.
pub trait ActivityMedium: Send + Sync {
    /// Stores `timestamp_ms` as the latest activity. Last writer wins.
    fn publish(&self, origin: &ContextId, timestamp_ms: i64) -> Result<(), MediumError>;

    /// Reads the stored timestamp.
    fn latest(&self) -> Result<Option<i64>, MediumError>;

    /// Live feed of writes, or `None` when the medium can only be polled.
    fn subscribe(&self) -> Result<Option<broadcast::Receiver<ActivityWrite>>, MediumError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_context_ids_are_unique() {
        let a = ContextId::generate();
        let b = ContextId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(&std::process::id().to_string()));
    }
}
