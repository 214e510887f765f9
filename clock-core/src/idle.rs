//! Idle check and low-power wait.
//!
//! The registry is re-read with interrupts masked, so an edge that lands between
//! the scheduler's last look and the wait instruction is never slept through:
//! its handler runs as soon as the critical section ends, and a pending
//! interrupt still wakes the core from a masked wait.

use crate::board::Sleep;
use crate::shared::ClockShared;

/// Sleeps once if no task is armed. Returns `true` when it slept.
pub fn sleep_if_idle<S>(shared: &ClockShared, sleeper: &mut S) -> bool
where
    S: Sleep + ?Sized,
{
    critical_section::with(|_| {
        if shared.registry().is_idle() {
            sleeper.sleep();
            true
        } else {
            false
        }
    })
}
