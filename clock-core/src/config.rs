//! Compile-time timing tables and boot configuration.

use core::time::Duration;

use crate::battery::BatteryThresholds;
use crate::time::ClockTime;

/// Number of selectable pulse durations (five jumper bits).
pub const PULSE_DURATION_COUNT: usize = 32;

const fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// H-bridge pulse lengths selectable with the duration jumpers.
pub const PULSE_DURATIONS: [Duration; PULSE_DURATION_COUNT] = [
    ms(130),
    ms(140),
    ms(150),
    ms(160),
    ms(170),
    ms(180),
    ms(190),
    ms(200),
    ms(210),
    ms(220),
    ms(230),
    ms(240),
    ms(250),
    ms(260),
    ms(270),
    ms(280),
    ms(290),
    ms(300),
    ms(320),
    ms(340),
    ms(360),
    ms(380),
    ms(400),
    ms(420),
    ms(440),
    ms(460),
    ms(480),
    ms(500),
    ms(525),
    ms(550),
    ms(600),
    ms(650),
];

/// Five-bit value read from the duration jumpers at boot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct JumperIndex(u8);

impl JumperIndex {
    const MASK: u8 = 0b1_1111;

    /// Keeps the low five bits of a raw port read.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    /// Assembles the index from individual jumper levels, bit 0 first.
    #[must_use]
    pub fn from_levels(levels: [bool; 5]) -> Self {
        let bits = levels
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, high)| acc | (u8::from(*high) << bit));
        Self::from_bits(bits)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Pulse length selected by this jumper setting.
    #[must_use]
    pub const fn pulse_duration(self) -> Duration {
        PULSE_DURATIONS[self.0 as usize]
    }
}

/// Poll intervals and pauses returned by the tasks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClockTimings {
    /// Poll interval while waiting for the time-signal line to clear before re-arming its interrupt.
    pub rearm_poll: Duration,
    /// Poll interval while a finished motor pulse waits for the time signal to clear.
    pub signal_clear_poll: Duration,
    /// Pause between consecutive catch-up pulses.
    pub catch_up_pause: Duration,
    /// Re-sample interval while the battery-check button is held.
    pub battery_poll: Duration,
}

impl ClockTimings {
    pub const DEFAULT: Self = Self {
        rearm_poll: ms(5),
        signal_clear_poll: ms(10),
        catch_up_pause: ms(500),
        battery_poll: ms(200),
    };
}

impl Default for ClockTimings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Everything fixed at boot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ClockConfig {
    pub timings: ClockTimings,
    pub thresholds: BatteryThresholds,
    pub jumpers: JumperIndex,
}

impl ClockConfig {
    /// Default timings and thresholds with the given jumper setting.
    #[must_use]
    pub const fn with_jumpers(jumpers: JumperIndex) -> Self {
        Self {
            timings: ClockTimings::DEFAULT,
            thresholds: BatteryThresholds::DEFAULT,
            jumpers,
        }
    }

    #[must_use]
    pub const fn pulse_duration(&self) -> Duration {
        self.jumpers.pulse_duration()
    }
}

/// Counter positions and pending work installed before interrupts are enabled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootOptions {
    pub time: ClockTime,
    pub displayed_time: ClockTime,
    pub arm_inc_minute: bool,
}

impl BootOptions {
    /// Cold boot: both counters at noon, nothing armed.
    pub const COLD: Self = Self {
        time: ClockTime::NOON,
        displayed_time: ClockTime::NOON,
        arm_inc_minute: false,
    };

    /// Bench preset that drives the hands once around the dial.
    pub const SWEEP: Self = Self {
        time: ClockTime::LAST_MINUTE,
        displayed_time: ClockTime::NOON,
        arm_inc_minute: true,
    };
}

impl Default for BootOptions {
    fn default() -> Self {
        Self::COLD
    }
}
