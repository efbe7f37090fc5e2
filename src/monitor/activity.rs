//! Activity detection with lock-free counters and throttling.
//!
//! The host forwards every raw input event to [`ActivityDetector::observe`].
//! Observing is purely passive: the detector borrows nothing from the event
//! and has no way to mark it handled, so the host's default behaviour for the
//! event always proceeds.
//!
//! Raw events are counted with atomics only, since `observe` may be called
//! from input callbacks that must never block. At most one logical activity
//! signal is emitted per throttle window.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Categories of user interaction that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    PointerDown,
    PointerMove,
    KeyDown,
    Scroll,
    TouchStart,
    Click,
    Wheel,
}

impl InputKind {
    pub const ALL: [InputKind; 7] = [
        InputKind::PointerDown,
        InputKind::PointerMove,
        InputKind::KeyDown,
        InputKind::Scroll,
        InputKind::TouchStart,
        InputKind::Click,
        InputKind::Wheel,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Raw event counts per input category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCounts {
    pub pointer_down: u64,
    pub pointer_move: u64,
    pub key_down: u64,
    pub scroll: u64,
    pub touch_start: u64,
    pub click: u64,
    pub wheel: u64,
}

impl InputCounts {
    pub fn total(&self) -> u64 {
        self.pointer_down
            + self.pointer_move
            + self.key_down
            + self.scroll
            + self.touch_start
            + self.click
            + self.wheel
    }

    fn from_array(values: [u64; 7]) -> Self {
        let [pointer_down, pointer_move, key_down, scroll, touch_start, click, wheel] = values;
        Self {
            pointer_down,
            pointer_move,
            key_down,
            scroll,
            touch_start,
            click,
            wheel,
        }
    }
}

/// Sentinel for "nothing emitted yet".
const NEVER: i64 = i64::MIN;

/// Turns raw input events into throttled activity signals.
#[derive(Debug)]
pub struct ActivityDetector {
    counts: [AtomicU64; 7],
    last_emit_ms: AtomicI64,
    throttle_ms: i64,
}

impl ActivityDetector {
    pub fn new(throttle: Duration) -> Self {
        Self {
            counts: Default::default(),
            last_emit_ms: AtomicI64::new(NEVER),
            throttle_ms: i64::try_from(throttle.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Records a raw input event observed at `now_ms`.
    ///
    /// Returns `Some(now_ms)` when this event opens a new throttle window and
    /// should be treated as activity, `None` when it falls inside the current
    /// window.
    pub fn observe(&self, kind: InputKind, now_ms: i64) -> Option<i64> {
        self.counts[kind.index()].fetch_add(1, Ordering::Relaxed);

        let mut last = self.last_emit_ms.load(Ordering::Acquire);
        loop {
            if last != NEVER && now_ms.saturating_sub(last) < self.throttle_ms {
                return None;
            }
            match self.last_emit_ms.compare_exchange_weak(
                last,
                now_ms,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(now_ms),
                Err(current) => last = current,
            }
        }
    }

    /// Timestamp of the last emitted signal.
    pub fn last_emitted(&self) -> Option<i64> {
        match self.last_emit_ms.load(Ordering::Acquire) {
            NEVER => None,
            ts => Some(ts),
        }
    }

    /// Reads current counter values without resetting them.
    pub fn counts(&self) -> InputCounts {
        InputCounts::from_array(std::array::from_fn(|i| {
            self.counts[i].load(Ordering::Relaxed)
        }))
    }

    /// Atomically reads and resets all counters.
    pub fn flush_counts(&self) -> InputCounts {
        InputCounts::from_array(std::array::from_fn(|i| {
            self.counts[i].swap(0, Ordering::Relaxed)
        }))
    }
}

impl Default for ActivityDetector {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_event_emits() {
        let detector = ActivityDetector::default();
        assert_eq!(detector.last_emitted(), None);
        assert_eq!(detector.observe(InputKind::KeyDown, 5_000), Some(5_000));
        assert_eq!(detector.last_emitted(), Some(5_000));
    }

    #[test]
    fn test_throttles_within_window() {
        let detector = ActivityDetector::default();

        assert_eq!(detector.observe(InputKind::PointerMove, 0), Some(0));
        for t in (10..1000).step_by(10) {
            assert_eq!(detector.observe(InputKind::PointerMove, t), None);
        }
        assert_eq!(detector.observe(InputKind::Click, 1000), Some(1000));
        assert_eq!(detector.observe(InputKind::Click, 1500), None);
        assert_eq!(detector.observe(InputKind::Wheel, 2100), Some(2100));
    }

    #[test]
    fn test_throttled_events_still_counted() {
        let detector = ActivityDetector::default();

        detector.observe(InputKind::KeyDown, 0);
        detector.observe(InputKind::KeyDown, 1);
        detector.observe(InputKind::Scroll, 2);
        detector.observe(InputKind::TouchStart, 3);

        let counts = detector.counts();
        assert_eq!(counts.key_down, 2);
        assert_eq!(counts.scroll, 1);
        assert_eq!(counts.touch_start, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_flush_counts_resets() {
        let detector = ActivityDetector::default();
        for kind in InputKind::ALL {
            detector.observe(kind, 0);
        }

        let flushed = detector.flush_counts();
        assert_eq!(flushed.total(), 7);
        assert_eq!(detector.counts(), InputCounts::default());
    }

    #[test]
    fn test_zero_throttle_emits_every_event() {
        let detector = ActivityDetector::new(Duration::ZERO);
        assert!(detector.observe(InputKind::Click, 10).is_some());
        assert!(detector.observe(InputKind::Click, 10).is_some());
    }

    #[test]
    fn test_input_kind_serde_names() {
        let json = serde_json::to_string(&InputKind::PointerDown).unwrap();
        assert_eq!(json, "\"pointer_down\"");
        let kind: InputKind = serde_json::from_str("\"touch_start\"").unwrap();
        assert_eq!(kind, InputKind::TouchStart);
    }
}
