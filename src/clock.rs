//! Wall-clock sources for activity timestamps.

use chrono::Utc;
use tokio::time::Instant;

/// Source of epoch-millisecond timestamps.
///
/// Timestamps are exchanged between contexts, so every context sharing a
/// medium must use the same kind of clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Wall time read once, then advanced by the tokio timer.
///
/// Under a paused test runtime this follows virtual time.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    anchor_ms: i64,
    anchor: Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self {
            anchor_ms: Utc::now().timestamp_millis(),
            anchor: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_ms.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_runtime_clock_follows_paused_time() {
        let clock = RuntimeClock::new();
        let start = clock.now_ms();

        tokio::time::sleep(Duration::from_secs(90)).await;

        assert!((clock.now_ms() - start - 90_000).abs() <= 1);
    }

    #[test]
    fn test_system_clock_is_recent() {
        let now = SystemClock.now_ms();
        // 2020-01-01T00:00:00Z
        assert!(now > 1_577_836_800_000);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock moved by hand, independent of the runtime timer.
    #[derive(Debug, Default)]
    pub struct ManualClock(AtomicI64);

    impl ManualClock {
        pub fn new(start_ms: i64) -> Self {
            Self(AtomicI64::new(start_ms))
        }

        pub fn advance_ms(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }
}
