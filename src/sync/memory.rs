//! Process-local medium with live notifications.

use super::{ActivityMedium, ActivityWrite, ContextId};
use crate::error::MediumError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Capacity of the live notification channel.
const CHANNEL_CAPACITY: usize = 64;

/// Medium shared by contexts living in the same process.
///
/// Clones share the same key.
#[derive(Debug, Clone)]
pub struct InMemoryMedium {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    latest: Mutex<Option<i64>>,
    tx: broadcast::Sender<ActivityWrite>,
}

impl InMemoryMedium {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Shared {
                latest: Mutex::new(None),
                tx,
            }),
        }
    }
}

impl Default for InMemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityMedium for InMemoryMedium {
    fn publish(&self, origin: &ContextId, timestamp_ms: i64) -> Result<(), MediumError> {
        *self
            .inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(timestamp_ms);

        // No subscribers is fine
        let _ = self.inner.tx.send(ActivityWrite {
            origin: origin.clone(),
            timestamp_ms,
        });
        Ok(())
    }

    fn latest(&self) -> Result<Option<i64>, MediumError> {
        Ok(*self
            .inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn subscribe(&self) -> Result<Option<broadcast::Receiver<ActivityWrite>>, MediumError> {
        Ok(Some(self.inner.tx.subscribe()))
    }
}
