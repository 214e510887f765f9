//! Twelve-hour minute counters.
//!
//! Both the authoritative time (advanced by the time-signal interrupt) and the
//! displayed time (advanced by the minute-advance task) are minutes since the
//! reference noon and wrap every twelve hours.

use core::fmt;

/// Number of minutes on a twelve-hour dial.
pub const MINUTES_PER_CYCLE: u16 = 12 * 60;

/// Minutes since the reference noon, always in `[0, MINUTES_PER_CYCLE)`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    /// The reference position (12:00).
    pub const NOON: Self = Self(0);

    /// One minute before noon (11:59).
    pub const LAST_MINUTE: Self = Self(MINUTES_PER_CYCLE - 1);

    /// Creates a time from a minute count, rejecting values outside the dial.
    #[must_use]
    pub const fn new(minutes: u16) -> Option<Self> {
        if minutes < MINUTES_PER_CYCLE {
            Some(Self(minutes))
        } else {
            None
        }
    }

    /// Creates a time from any minute count by reducing it onto the dial.
    #[must_use]
    pub const fn wrapping(minutes: u16) -> Self {
        Self(minutes % MINUTES_PER_CYCLE)
    }

    /// Raw minute count.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// The following minute, wrapping 11:59 back to noon.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.0 + 1 == MINUTES_PER_CYCLE {
            Self::NOON
        } else {
            Self(self.0 + 1)
        }
    }

    /// Returns `true` at the reference position.
    #[must_use]
    pub const fn is_noon(self) -> bool {
        self.0 == 0
    }

    /// Lowest bit of the minute count; selects the bridge polarity.
    #[must_use]
    pub const fn parity(self) -> u8 {
        (self.0 & 0b1) as u8
    }

    /// Forward distance from `self` to `target`, in minutes, modulo the dial.
    #[must_use]
    pub const fn minutes_until(self, target: Self) -> u16 {
        (target.0 + MINUTES_PER_CYCLE - self.0) % MINUTES_PER_CYCLE
    }

    /// Hour shown on a twelve-hour face (12, 1, ..., 11).
    #[must_use]
    pub const fn hour(self) -> u16 {
        match self.0 / 60 {
            0 => 12,
            hour => hour,
        }
    }

    /// Minute past the hour.
    #[must_use]
    pub const fn minute(self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}
