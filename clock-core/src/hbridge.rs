//! Minute-advance task and the H-bridge drive state machine.
//!
//! Every displayed minute costs one coil pulse, and consecutive pulses must
//! alternate polarity for the movement to step forward. A pulse cycle spans two
//! dispatches: the first energizes the bridge and advances the displayed time,
//! the second releases the bridge once the time-signal line has cleared. When
//! the display lags the authoritative time (for example after a pause) the task
//! re-arms itself with a longer pause between pulses until the two agree.

use core::time::Duration;

use crate::board::{BridgeOutputs, ClockInputs};
use crate::config::ClockTimings;
use crate::registry::TaskId;
use crate::scheduler::TaskOutcome;
use crate::shared::ClockShared;
use crate::telemetry::{ClockEvent, EventSink};
use crate::time::ClockTime;

/// Phase of the current pulse cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BridgePhase {
    #[default]
    Released,
    Energized,
}

/// Which bridge output drives the coil.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Polarity {
    /// Bridge output 1, used when the displayed minute is even.
    Forward,
    /// Bridge output 2, used when the displayed minute is odd.
    Reverse,
}

impl Polarity {
    /// Polarity for the pulse that moves the hands off `displayed`.
    #[must_use]
    pub const fn for_displayed(displayed: ClockTime) -> Self {
        if displayed.parity() == 0 {
            Polarity::Forward
        } else {
            Polarity::Reverse
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Polarity::Forward => "forward",
            Polarity::Reverse => "reverse",
        }
    }
}

/// Private state of the `IncMinute` task.
#[derive(Clone, Debug)]
pub struct MinuteDriver {
    phase: BridgePhase,
    pulse_duration: Duration,
    awaiting_clear: bool,
}

impl MinuteDriver {
    /// Creates a released driver that holds each pulse for `pulse_duration`.
    #[must_use]
    pub const fn new(pulse_duration: Duration) -> Self {
        Self {
            phase: BridgePhase::Released,
            pulse_duration,
            awaiting_clear: false,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> BridgePhase {
        self.phase
    }

    /// One dispatch of the `IncMinute` task.
    pub fn run<B, S>(
        &mut self,
        shared: &ClockShared,
        board: &mut B,
        timings: &ClockTimings,
        events: &mut S,
    ) -> TaskOutcome
    where
        B: ClockInputs + BridgeOutputs,
        S: EventSink,
    {
        let paused = board.clock_paused();

        match self.phase {
            BridgePhase::Released => self.energize(shared, board, paused, events),
            BridgePhase::Energized => self.release(shared, board, paused, timings, events),
        }
    }

    fn energize<B, S>(
        &mut self,
        shared: &ClockShared,
        board: &mut B,
        paused: bool,
        events: &mut S,
    ) -> TaskOutcome
    where
        B: BridgeOutputs,
        S: EventSink,
    {
        if paused {
            // Dry run: keep the cycle shape so a later resume starts cleanly.
            events.emit(ClockEvent::PulseSkippedPaused);
        } else {
            let polarity = Polarity::for_displayed(shared.displayed_time());
            board.release_bridge();
            board.set_bridge(polarity, true);
            let displayed = shared.advance_displayed_time();
            events.emit(ClockEvent::PulseStarted {
                polarity,
                displayed,
            });
        }

        self.phase = BridgePhase::Energized;
        TaskOutcome::RunAfter(self.pulse_duration)
    }

    fn release<B, S>(
        &mut self,
        shared: &ClockShared,
        board: &mut B,
        paused: bool,
        timings: &ClockTimings,
        events: &mut S,
    ) -> TaskOutcome
    where
        B: ClockInputs + BridgeOutputs,
        S: EventSink,
    {
        board.release_bridge();

        if board.time_signal_present() {
            // Reported once per hold; later polls stay quiet.
            if !self.awaiting_clear {
                self.awaiting_clear = true;
                events.emit(ClockEvent::AwaitingSignalClear);
            }
            return TaskOutcome::RunAfter(timings.signal_clear_poll);
        }

        self.phase = BridgePhase::Released;
        self.awaiting_clear = false;
        events.emit(ClockEvent::PulseReleased);

        let registry = shared.registry();
        registry.disarm(TaskId::IncMinute);

        let behind = shared.minutes_behind();
        if !paused && behind != 0 {
            registry.arm(TaskId::IncMinute);
            events.emit(ClockEvent::CatchUpScheduled { behind });
            return TaskOutcome::RunAfter(timings.catch_up_pause);
        }

        events.emit(ClockEvent::CycleComplete {
            displayed: shared.displayed_time(),
        });
        TaskOutcome::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{NullSink, TelemetryRecorder};

    #[derive(Default)]
    struct Bench {
        signal: bool,
        paused: bool,
        forward: bool,
        reverse: bool,
    }

    impl ClockInputs for Bench {
        fn time_signal_present(&self) -> bool {
            self.signal
        }

        fn check_button_pressed(&self) -> bool {
            false
        }

        fn clock_paused(&self) -> bool {
            self.paused
        }
    }

    impl BridgeOutputs for Bench {
        fn set_bridge(&mut self, polarity: Polarity, energized: bool) {
            match polarity {
                Polarity::Forward => self.forward = energized,
                Polarity::Reverse => self.reverse = energized,
            }
        }
    }

    const PULSE: Duration = Duration::from_millis(200);

    fn armed_shared(time: u16, displayed: u16) -> ClockShared {
        let shared = ClockShared::new();
        shared.preset(ClockTime::wrapping(time), ClockTime::wrapping(displayed));
        shared.registry().arm(TaskId::IncMinute);
        shared
    }

    #[test]
    fn polarity_follows_displayed_parity() {
        assert_eq!(
            Polarity::for_displayed(ClockTime::wrapping(4)),
            Polarity::Forward
        );
        assert_eq!(
            Polarity::for_displayed(ClockTime::wrapping(5)),
            Polarity::Reverse
        );
    }

    #[test]
    fn single_cycle_pulses_then_completes() {
        let shared = armed_shared(1, 0);
        let mut bench = Bench::default();
        let mut driver = MinuteDriver::new(PULSE);
        let timings = ClockTimings::DEFAULT;

        let first = driver.run(&shared, &mut bench, &timings, &mut NullSink);
        assert_eq!(first, TaskOutcome::RunAfter(PULSE));
        assert_eq!(driver.phase(), BridgePhase::Energized);
        assert!(bench.forward && !bench.reverse);
        assert_eq!(shared.displayed_time().minutes(), 1);

        let second = driver.run(&shared, &mut bench, &timings, &mut NullSink);
        assert_eq!(second, TaskOutcome::Done);
        assert_eq!(driver.phase(), BridgePhase::Released);
        assert!(!bench.forward && !bench.reverse);
        assert!(!shared.registry().is_armed(TaskId::IncMinute));
    }

    #[test]
    fn release_waits_for_time_signal_to_clear() {
        let shared = armed_shared(1, 0);
        let mut bench = Bench::default();
        let mut driver = MinuteDriver::new(PULSE);
        let timings = ClockTimings::DEFAULT;

        driver.run(&shared, &mut bench, &timings, &mut NullSink);
        bench.signal = true;

        let waiting = driver.run(&shared, &mut bench, &timings, &mut NullSink);
        assert_eq!(waiting, TaskOutcome::RunAfter(timings.signal_clear_poll));
        assert_eq!(driver.phase(), BridgePhase::Energized);
        assert!(!bench.forward && !bench.reverse);
        assert!(shared.registry().is_armed(TaskId::IncMinute));

        bench.signal = false;
        let done = driver.run(&shared, &mut bench, &timings, &mut NullSink);
        assert_eq!(done, TaskOutcome::Done);
        assert_eq!(shared.displayed_time().minutes(), 1);
    }

    #[test]
    fn long_hold_reports_waiting_once() {
        let shared = armed_shared(2, 0);
        let mut bench = Bench::default();
        let mut driver = MinuteDriver::new(PULSE);
        let timings = ClockTimings::DEFAULT;
        let mut recorder: TelemetryRecorder<u32, 64> = TelemetryRecorder::new();

        let waiting_count = |recorder: &TelemetryRecorder<u32, 64>| {
            recorder
                .oldest_first()
                .filter(|record| record.event == ClockEvent::AwaitingSignalClear)
                .count()
        };

        for cycle in 0..2u32 {
            driver.run(&shared, &mut bench, &timings, &mut recorder.stamped(cycle));
            bench.signal = true;
            for _ in 0..50 {
                driver.run(&shared, &mut bench, &timings, &mut recorder.stamped(cycle));
            }
            bench.signal = false;
            driver.run(&shared, &mut bench, &timings, &mut recorder.stamped(cycle));
        }

        assert_eq!(driver.phase(), BridgePhase::Released);
        assert_eq!(shared.displayed_time().minutes(), 2);
        // One report per held pulse, not one per poll.
        assert_eq!(waiting_count(&recorder), 2);
    }

    #[test]
    fn lagging_display_rearms_with_catch_up_pause() {
        let shared = armed_shared(3, 0);
        let mut bench = Bench::default();
        let mut driver = MinuteDriver::new(PULSE);
        let timings = ClockTimings::DEFAULT;

        driver.run(&shared, &mut bench, &timings, &mut NullSink);
        let outcome = driver.run(&shared, &mut bench, &timings, &mut NullSink);

        assert_eq!(outcome, TaskOutcome::RunAfter(timings.catch_up_pause));
        assert!(shared.registry().is_armed(TaskId::IncMinute));
        assert_eq!(shared.minutes_behind(), 2);
    }

    #[test]
    fn paused_cycle_is_a_dry_run() {
        let shared = armed_shared(1, 0);
        let mut bench = Bench {
            paused: true,
            ..Bench::default()
        };
        let mut driver = MinuteDriver::new(PULSE);
        let timings = ClockTimings::DEFAULT;

        let first = driver.run(&shared, &mut bench, &timings, &mut NullSink);
        assert_eq!(first, TaskOutcome::RunAfter(PULSE));
        assert_eq!(driver.phase(), BridgePhase::Energized);
        assert!(!bench.forward && !bench.reverse);
        assert_eq!(shared.displayed_time().minutes(), 0);

        let second = driver.run(&shared, &mut bench, &timings, &mut NullSink);
        assert_eq!(second, TaskOutcome::Done);
        assert_eq!(driver.phase(), BridgePhase::Released);
        assert!(!shared.registry().is_armed(TaskId::IncMinute));
    }

    #[test]
    fn never_energizes_both_outputs() {
        let timings = ClockTimings::DEFAULT;
        for displayed in 0..4u16 {
            for paused in [false, true] {
                for signal in [false, true] {
                    let shared = armed_shared(displayed + 2, displayed);
                    let mut bench = Bench {
                        paused,
                        signal,
                        // A stuck output from a previous cycle must not survive a new pulse.
                        reverse: displayed % 2 == 0,
                        forward: displayed % 2 == 1,
                    };
                    let mut driver = MinuteDriver::new(PULSE);
                    for _ in 0..4 {
                        driver.run(&shared, &mut bench, &timings, &mut NullSink);
                        assert!(
                            !(bench.forward && bench.reverse),
                            "both outputs energized (displayed={displayed}, paused={paused}, signal={signal})"
                        );
                    }
                }
            }
        }
    }
}
