//! Session monitor: wires detector, broadcaster and coordinator together.

use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::monitor::activity::{ActivityDetector, InputCounts, InputKind};
use crate::monitor::coordinator::{CoordinatorSnapshot, TimeoutHandler, TimerCoordinator};
use crate::notify::Notifier;
use crate::sync::{ActivityBroadcaster, ActivityMedium, ContextId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Everything one `start` call sets up.
struct Wiring {
    detector: ActivityDetector,
    broadcaster: Arc<ActivityBroadcaster>,
    coordinator: TimerCoordinator,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for Wiring {
    fn drop(&mut self) {
        self.coordinator.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Inactivity monitor for one execution context.
///
/// Local activity goes in through [`record_activity`](Self::record_activity);
/// activity from other contexts arrives through the shared medium. The only
/// outward effect besides notices is the timeout handler passed to
/// [`start`](Self::start), which runs at most once per idle cycle.
pub struct SessionMonitor {
    medium: Arc<dyn ActivityMedium>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    context: ContextId,
    wiring: Mutex<Option<Wiring>>,
}

impl SessionMonitor {
    /// Creates a stopped monitor bound to the current tokio runtime.
    pub fn new(
        medium: Arc<dyn ActivityMedium>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MonitorError> {
        Ok(Self {
            medium,
            notifier,
            clock: Arc::new(SystemClock),
            runtime: Handle::try_current()?,
            context: ContextId::generate(),
            wiring: Mutex::new(None),
        })
    }

    /// Replaces the timestamp source. Contexts sharing a medium must agree on it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn context_id(&self) -> &ContextId {
        &self.context
    }

    fn wiring(&self) -> MutexGuard<'_, Option<Wiring>> {
        self.wiring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts monitoring with `config`, tearing down any previous run first.
    pub fn start<F>(&self, config: MonitorConfig, on_timeout: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut wiring = self.wiring();
        // Old timers are cancelled before the new pair exists
        drop(wiring.take());

        let on_timeout: TimeoutHandler = Arc::new(on_timeout);
        let coordinator = TimerCoordinator::new(
            config.clone(),
            Arc::clone(&self.notifier),
            on_timeout,
            Arc::clone(&self.clock),
            self.runtime.clone(),
        );
        let broadcaster = Arc::new(ActivityBroadcaster::new(
            Arc::clone(&self.medium),
            self.context.clone(),
            self.clock.now_ms(),
        ));

        let mut tasks = Vec::new();
        if config.is_active() {
            let remote = coordinator.clone();
            if let Some(task) = broadcaster.subscribe(&self.runtime, move |_| remote.reset()) {
                tasks.push(task);
            }

            let drift = coordinator.clone();
            tasks.push(broadcaster.poll_for_drift(
                &self.runtime,
                config.drift_poll_interval(),
                move |remote| {
                    if remote.is_some() {
                        drift.reset();
                    }
                    drift.enforce_deadline();
                },
            ));
        }

        coordinator.reset();

        tracing::info!(
            context = %self.context,
            timeout_minutes = config.timeout_minutes,
            warning_minutes = config.warning_minutes,
            active = config.is_active(),
            "Session monitor started"
        );

        *wiring = Some(Wiring {
            detector: ActivityDetector::new(config.activity_throttle()),
            broadcaster,
            coordinator,
            tasks,
        });
    }

    /// Stops monitoring. Safe to call when not running.
    pub fn stop(&self) {
        if self.wiring().take().is_some() {
            tracing::info!(context = %self.context, "Session monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.wiring().is_some()
    }

    /// Feeds one raw input event from the host.
    ///
    /// Returns `true` when the event counted as new activity (outside the
    /// throttle window) and restarted the idle cycle.
    pub fn record_activity(&self, kind: InputKind) -> bool {
        let guard = self.wiring();
        let Some(wiring) = guard.as_ref() else {
            return false;
        };

        match wiring.detector.observe(kind, self.clock.now_ms()) {
            Some(timestamp_ms) => {
                wiring.coordinator.reset();
                wiring.broadcaster.publish(timestamp_ms);
                tracing::trace!(?kind, timestamp_ms, "Local activity");
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Option<CoordinatorSnapshot> {
        self.wiring().as_ref().map(|w| w.coordinator.snapshot())
    }

    /// Raw input counts since the monitor was started.
    pub fn input_counts(&self) -> Option<InputCounts> {
        self.wiring().as_ref().map(|w| w.detector.counts())
    }

    /// Configuration of the current run.
    pub fn config(&self) -> Option<MonitorConfig> {
        self.wiring()
            .as_ref()
            .map(|w| w.coordinator.config().clone())
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
