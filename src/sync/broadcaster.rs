//! Per-context publisher/subscriber on top of an [`ActivityMedium`].

use super::{ActivityMedium, ContextId};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Publishes local activity and reports newer activity from other contexts.
///
/// Medium failures are logged and swallowed: the owning context keeps
/// enforcing its own timeout from local activity alone.
pub struct ActivityBroadcaster {
    medium: Arc<dyn ActivityMedium>,
    context: ContextId,
    /// Newest timestamp this context knows about, local or remote.
    known_ms: AtomicI64,
}

impl ActivityBroadcaster {
    pub fn new(medium: Arc<dyn ActivityMedium>, context: ContextId, known_ms: i64) -> Self {
        Self {
            medium,
            context,
            known_ms: AtomicI64::new(known_ms),
        }
    }

    pub fn context(&self) -> &ContextId {
        &self.context
    }

    /// Newest activity timestamp seen by this context.
    pub fn known(&self) -> i64 {
        self.known_ms.load(Ordering::Acquire)
    }

    /// Writes local activity to the shared key.
    pub fn publish(&self, timestamp_ms: i64) {
        self.known_ms.fetch_max(timestamp_ms, Ordering::AcqRel);

        if let Err(e) = self.medium.publish(&self.context, timestamp_ms) {
            tracing::warn!(
                ?e,
                context = %self.context,
                "Failed to publish activity, continuing without cross-context sync"
            );
        }
    }

    /// Records `timestamp_ms` if it is newer than anything known.
    fn accept(&self, timestamp_ms: i64) -> bool {
        self.known_ms.fetch_max(timestamp_ms, Ordering::AcqRel) < timestamp_ms
    }

    /// Re-reads the shared key once.
    ///
    /// Returns the stored timestamp if it is newer than the locally known one.
    pub fn check_drift(&self) -> Option<i64> {
        match self.medium.latest() {
            Ok(Some(ts)) if self.accept(ts) => Some(ts),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(?e, context = %self.context, "Drift check failed");
                None
            }
        }
    }

    /// Spawns a task calling `on_remote` for each newer write made by another
    /// context.
    ///
    /// Returns `None` if the medium has no live notifications; drift polling
    /// then carries remote activity alone.
    pub fn subscribe<F>(self: &Arc<Self>, runtime: &Handle, on_remote: F) -> Option<JoinHandle<()>>
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        let mut rx = match self.medium.subscribe() {
            Ok(Some(rx)) => rx,
            Ok(None) => {
                tracing::debug!(
                    context = %self.context,
                    "Medium has no live notifications, relying on drift polling"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(?e, context = %self.context, "Failed to subscribe to activity medium");
                return None;
            }
        };

        let this = Arc::clone(self);
        Some(runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(write) => {
                        if write.origin == this.context {
                            continue;
                        }
                        if this.accept(write.timestamp_ms) {
                            tracing::trace!(
                                origin = %write.origin,
                                timestamp_ms = write.timestamp_ms,
                                "Remote activity"
                            );
                            on_remote(write.timestamp_ms);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Activity notifications lagged, re-reading");
                        if let Some(ts) = this.check_drift() {
                            on_remote(ts);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }

    /// Spawns the periodic drift poll.
    ///
    /// `on_tick` runs every `period` with the newer remote timestamp, if any.
    pub fn poll_for_drift<F>(
        self: &Arc<Self>,
        runtime: &Handle,
        period: Duration,
        on_tick: F,
    ) -> JoinHandle<()>
    where
        F: Fn(Option<i64>) + Send + 'static,
    {
        let this = Arc::clone(self);
        runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                on_tick(this.check_drift());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediumError;
    use crate::sync::{ActivityWrite, InMemoryMedium};
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    struct BrokenMedium;

    impl ActivityMedium for BrokenMedium {
        fn publish(&self, _: &ContextId, _: i64) -> Result<(), MediumError> {
            Err(MediumError::Unavailable("quota exceeded".into()))
        }

        fn latest(&self) -> Result<Option<i64>, MediumError> {
            Err(MediumError::Unavailable("quota exceeded".into()))
        }

        fn subscribe(&self) -> Result<Option<broadcast::Receiver<ActivityWrite>>, MediumError> {
            Err(MediumError::Unavailable("quota exceeded".into()))
        }
    }

    fn pair(medium: &InMemoryMedium) -> (Arc<ActivityBroadcaster>, Arc<ActivityBroadcaster>) {
        let shared: Arc<dyn ActivityMedium> = Arc::new(medium.clone());
        (
            Arc::new(ActivityBroadcaster::new(Arc::clone(&shared), "a".into(), 0)),
            Arc::new(ActivityBroadcaster::new(shared, "b".into(), 0)),
        )
    }

    #[test]
    fn test_check_drift_reports_only_newer() {
        let medium = InMemoryMedium::new();
        let (a, b) = pair(&medium);

        a.publish(100);
        assert_eq!(a.check_drift(), None);
        assert_eq!(b.check_drift(), Some(100));
        assert_eq!(b.check_drift(), None);
        assert_eq!(b.known(), 100);

        // Older write does not move anything backwards
        medium.publish(&"c".into(), 50).unwrap();
        assert_eq!(b.check_drift(), None);
        assert_eq!(b.known(), 100);
    }

    #[tokio::test]
    async fn test_subscribe_skips_own_writes() {
        let medium = InMemoryMedium::new();
        let (a, b) = pair(&medium);
        let runtime = Handle::current();

        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen_a);
        let task_a = a
            .subscribe(&runtime, move |ts| sink.lock().unwrap().push(ts))
            .unwrap();
        let sink = Arc::clone(&seen_b);
        let task_b = b
            .subscribe(&runtime, move |ts| sink.lock().unwrap().push(ts))
            .unwrap();

        a.publish(1_000);
        tokio::time::sleep(Duration::from_millis(10)).await;
        b.publish(2_000);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*seen_a.lock().unwrap(), vec![2_000]);
        assert_eq!(*seen_b.lock().unwrap(), vec![1_000]);

        task_a.abort();
        task_b.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_for_drift_picks_up_missed_writes() {
        let medium = InMemoryMedium::new();
        let (a, b) = pair(&medium);

        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        let task = b.poll_for_drift(&Handle::current(), Duration::from_secs(10), move |remote| {
            sink.lock().unwrap().push(remote)
        });

        a.publish(5_000);
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![Some(5_000), None]);
        task.abort();
    }

    #[tokio::test]
    async fn test_broken_medium_degrades_quietly() {
        let broadcaster = Arc::new(ActivityBroadcaster::new(
            Arc::new(BrokenMedium),
            "solo".into(),
            0,
        ));

        broadcaster.publish(10);
        assert_eq!(broadcaster.known(), 10);
        assert_eq!(broadcaster.check_drift(), None);
        assert!(broadcaster.subscribe(&Handle::current(), |_| {}).is_none());
    }
}
