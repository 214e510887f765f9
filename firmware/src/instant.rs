//! Monotonic instant used to stamp scheduler passes.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::ops::Add;

use embassy_time::{Duration, Instant};

/// Newtype over the Embassy instant so the scheduler can add `core` durations.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl Add<core::time::Duration> for FirmwareInstant {
    type Output = FirmwareInstant;

    fn add(self, rhs: core::time::Duration) -> FirmwareInstant {
        Self(self.0 + core_duration_to_embassy(rhs))
    }
}

fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}
