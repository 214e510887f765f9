//! Process-wide state shared between interrupt handlers and the scheduler.
//!
//! Each field has exactly one writer. The time-signal handler in [`crate::irq`]
//! owns `time`, the minute driver in [`crate::hbridge`] owns `displayed_time`,
//! and registry bits are armed by whoever detects the trigger and disarmed only
//! by the task they gate. Writers are enforced through `pub(crate)` visibility.

use portable_atomic::{AtomicU16, Ordering};

use crate::registry::TaskRegistry;
use crate::time::ClockTime;

/// Shared context handed to every interrupt handler and task.
#[derive(Debug)]
pub struct ClockShared {
    registry: TaskRegistry,
    time: AtomicU16,
    displayed_time: AtomicU16,
}

impl ClockShared {
    /// Creates the context with an empty registry and both counters at noon.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            time: AtomicU16::new(0),
            displayed_time: AtomicU16::new(0),
        }
    }

    /// Task registry coupling the interrupt handlers to the scheduler.
    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Authoritative time derived from received pulses.
    #[must_use]
    pub fn time(&self) -> ClockTime {
        ClockTime::wrapping(self.time.load(Ordering::Acquire))
    }

    /// Position the hands have been driven to.
    #[must_use]
    pub fn displayed_time(&self) -> ClockTime {
        ClockTime::wrapping(self.displayed_time.load(Ordering::Acquire))
    }

    /// Minutes the display lags behind the authoritative time.
    #[must_use]
    pub fn minutes_behind(&self) -> u16 {
        self.displayed_time().minutes_until(self.time())
    }

    /// Boot-time reset: empty registry, both counters at the given positions.
    ///
    /// Must run before any interrupt source is enabled.
    pub(crate) fn preset(&self, time: ClockTime, displayed_time: ClockTime) {
        self.registry.clear_all();
        self.time.store(time.minutes(), Ordering::Release);
        self.displayed_time
            .store(displayed_time.minutes(), Ordering::Release);
    }

    /// Advances the authoritative time. Only called from the time-signal handler.
    pub(crate) fn advance_time(&self) -> ClockTime {
        let next = self.time().next();
        self.time.store(next.minutes(), Ordering::Release);
        next
    }

    /// Advances the displayed time. Only called from the minute driver.
    pub(crate) fn advance_displayed_time(&self) -> ClockTime {
        let next = self.displayed_time().next();
        self.displayed_time.store(next.minutes(), Ordering::Release);
        next
    }
}

impl Default for ClockShared {
    fn default() -> Self {
        Self::new()
    }
}
