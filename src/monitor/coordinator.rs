//! Warning and timeout scheduling for one idle cycle.
//!
//! Every [`TimerCoordinator::reset`] starts a new cycle with a fresh
//! generation number. Scheduled callbacks carry the generation they were
//! created for and act only if it is still current, so a callback that
//! survives an abort race can never touch a later cycle.
//!
//! The drift-check path ([`TimerCoordinator::enforce_deadline`]) goes through
//! the same guards as the runtime timers. Whichever trigger arrives first wins;
//! the other finds the cycle already `Warned`/`Expired` and does nothing.

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::notify::{Notifier, SessionNotice};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Caller-supplied action run once when the session expires.
pub type TimeoutHandler = Arc<dyn Fn() + Send + Sync>;

/// Where the coordinator is within the current idle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// Counting down, no warning shown yet.
    IdleCounting,
    /// Warning shown for this cycle.
    Warned,
    /// Timeout fired; nothing is scheduled until the next reset.
    Expired,
    /// Monitoring off; nothing ever fires.
    Disabled,
}

/// Point-in-time view of the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    pub state: CoordinatorState,
    pub warned: bool,
    pub generation: u64,
    pub cycle_started_ms: i64,
    pub idle_ms: i64,
    /// Time left before expiry; `None` when no timeout is scheduled.
    pub remaining_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    DriftCheck,
}

struct Cycle {
    state: CoordinatorState,
    generation: u64,
    /// Warning already shown in this cycle.
    warned: bool,
    started_ms: i64,
    warning: Option<JoinHandle<()>>,
    timeout: Option<JoinHandle<()>>,
}

impl Cycle {
    fn abort_pending(&mut self) {
        for task in [self.warning.take(), self.timeout.take()].into_iter().flatten() {
            task.abort();
        }
    }

    /// Releases the handle of a callback that just ran, or aborts it when the
    /// callback was preempted by the drift check.
    fn settle(slot: &mut Option<JoinHandle<()>>, trigger: Trigger) {
        if let Some(task) = slot.take() {
            if trigger == Trigger::DriftCheck {
                task.abort();
            }
        }
    }
}

struct Shared {
    config: MonitorConfig,
    notifier: Arc<dyn Notifier>,
    on_timeout: TimeoutHandler,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    cycle: Mutex<Cycle>,
}

/// Owns the warning and timeout callbacks of one monitor.
///
/// Cheap to clone; clones drive the same cycle.
#[derive(Clone)]
pub struct TimerCoordinator {
    shared: Arc<Shared>,
}

impl TimerCoordinator {
    /// Creates a coordinator. Nothing is scheduled until the first reset.
    ///
    /// An inactive `config` yields a coordinator that starts out `Disabled`.
    pub fn new(
        config: MonitorConfig,
        notifier: Arc<dyn Notifier>,
        on_timeout: TimeoutHandler,
        clock: Arc<dyn Clock>,
        runtime: Handle,
    ) -> Self {
        let state = if config.is_active() {
            CoordinatorState::IdleCounting
        } else {
            CoordinatorState::Disabled
        };
        let started_ms = clock.now_ms();

        Self {
            shared: Arc::new(Shared {
                config,
                notifier,
                on_timeout,
                clock,
                runtime,
                cycle: Mutex::new(Cycle {
                    state,
                    generation: 0,
                    warned: false,
                    started_ms,
                    warning: None,
                    timeout: None,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cycle> {
        self.shared
            .cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    pub fn state(&self) -> CoordinatorState {
        self.lock().state
    }

    /// Starts a new idle cycle measured from now.
    ///
    /// Pending callbacks are aborted before new ones are scheduled, so any
    /// number of back-to-back resets leaves exactly one pair. Does nothing once
    /// the coordinator is `Disabled`.
    pub fn reset(&self) {
        let mut cycle = self.lock();
        if cycle.state == CoordinatorState::Disabled {
            return;
        }

        cycle.abort_pending();
        cycle.generation += 1;
        cycle.warned = false;
        cycle.state = CoordinatorState::IdleCounting;
        cycle.started_ms = self.shared.clock.now_ms();

        let generation = cycle.generation;
        let now = Instant::now();

        if let Some(deadline) = self.deadline(now, self.shared.config.warning_delay()) {
            let this = self.clone();
            cycle.warning = Some(self.shared.runtime.spawn(async move {
                sleep_until(deadline).await;
                this.fire_warning(generation, Trigger::Timer);
            }));
        }

        if let Some(deadline) = self.deadline(now, self.shared.config.timeout_delay()) {
            let this = self.clone();
            cycle.timeout = Some(self.shared.runtime.spawn(async move {
                sleep_until(deadline).await;
                this.fire_timeout(generation, Trigger::Timer);
            }));
        }

        tracing::trace!(generation, "Idle timers reset");
    }

    fn deadline(&self, now: Instant, delay: Option<Duration>) -> Option<Instant> {
        now.checked_add(delay?)
    }

    /// Cancels pending callbacks and disables the coordinator for good.
    pub fn cancel(&self) {
        let mut cycle = self.lock();
        cycle.abort_pending();
        cycle.generation += 1;
        if cycle.state != CoordinatorState::Disabled {
            tracing::debug!(generation = cycle.generation, "Idle timers cancelled");
        }
        cycle.state = CoordinatorState::Disabled;
    }

    /// Fires whatever is overdue according to the wall clock.
    ///
    /// Covers runtime timers that were held back, e.g. across a system
    /// suspend. An overdue timeout skips the warning.
    pub fn enforce_deadline(&self) {
        let (generation, warning_due, timeout_due) = {
            let cycle = self.lock();
            if !matches!(
                cycle.state,
                CoordinatorState::IdleCounting | CoordinatorState::Warned
            ) {
                return;
            }
            let idle_ms = self.shared.clock.now_ms() - cycle.started_ms;
            let due = |delay: Option<Duration>| delay.is_some_and(|d| idle_ms >= millis(d));
            (
                cycle.generation,
                !cycle.warned && due(self.shared.config.warning_delay()),
                due(self.shared.config.timeout_delay()),
            )
        };

        if timeout_due {
            self.fire_timeout(generation, Trigger::DriftCheck);
        } else if warning_due {
            self.fire_warning(generation, Trigger::DriftCheck);
        }
    }

    fn fire_warning(&self, generation: u64, trigger: Trigger) {
        let remaining_ms = {
            let mut cycle = self.lock();
            if cycle.generation != generation
                || cycle.state != CoordinatorState::IdleCounting
                || cycle.warned
            {
                return;
            }
            cycle.warned = true;
            cycle.state = CoordinatorState::Warned;
            Cycle::settle(&mut cycle.warning, trigger);
            self.remaining_ms(&cycle).unwrap_or(0)
        };

        tracing::info!(generation, remaining_ms, ?trigger, "Session expiring soon");
        self.shared
            .notifier
            .notify(&SessionNotice::expiring(remaining_ms));
    }

    fn fire_timeout(&self, generation: u64, trigger: Trigger) {
        {
            let mut cycle = self.lock();
            if cycle.generation != generation
                || matches!(
                    cycle.state,
                    CoordinatorState::Expired | CoordinatorState::Disabled
                )
            {
                return;
            }
            // Expired before anything observable happens: no second trigger
            // can get past the check above.
            cycle.state = CoordinatorState::Expired;
            if let Some(task) = cycle.warning.take() {
                task.abort();
            }
            Cycle::settle(&mut cycle.timeout, trigger);
        }

        tracing::info!(generation, ?trigger, "Session expired due to inactivity");
        self.shared.notifier.notify(&SessionNotice::expired());

        // A cancel or reset that landed while notifying retires this cycle
        if !self.is_current(generation, CoordinatorState::Expired) {
            tracing::debug!(generation, "Cycle retired before timeout handler ran");
            return;
        }

        let handler = Arc::clone(&self.shared.on_timeout);
        if panic::catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
            tracing::error!(generation, "Timeout handler panicked, session stays expired");
        }
    }

    fn is_current(&self, generation: u64, state: CoordinatorState) -> bool {
        let cycle = self.lock();
        cycle.generation == generation && cycle.state == state
    }

    fn remaining_ms(&self, cycle: &Cycle) -> Option<i64> {
        let timeout = self.shared.config.timeout_delay()?;
        let idle_ms = self.shared.clock.now_ms() - cycle.started_ms;
        Some(millis(timeout) - idle_ms)
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let cycle = self.lock();
        let remaining_ms = match cycle.state {
            CoordinatorState::IdleCounting | CoordinatorState::Warned => {
                self.remaining_ms(&cycle).map(|ms| ms.max(0))
            }
            CoordinatorState::Expired | CoordinatorState::Disabled => None,
        };
        CoordinatorSnapshot {
            state: cycle.state,
            warned: cycle.warned,
            generation: cycle.generation,
            cycle_started_ms: cycle.started_ms,
            idle_ms: self.shared.clock.now_ms() - cycle.started_ms,
            remaining_ms,
        }
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
