//! Cooperative scheduler over the fixed task set.
//!
//! A pass visits every task in [`TaskId::ALL`] order and runs the ones that are
//! armed and whose previous delay has elapsed. Task bodies never block; they
//! return a [`TaskOutcome`] and the scheduler records the earliest instant the
//! same task may run again. Callers either spin passes until work is due or
//! fast-forward to [`PassReport::next_due`].

use core::ops::Add;
use core::time::Duration;

use crate::battery::BatteryCheck;
use crate::board::{Board, IrqSource, NoonIndicator};
use crate::config::{BootOptions, ClockConfig};
use crate::hbridge::{BridgePhase, MinuteDriver};
use crate::irq::TimeSignalRearm;
use crate::registry::{TASK_COUNT, TaskId};
use crate::shared::ClockShared;
use crate::telemetry::{TELEMETRY_RING_CAPACITY, TelemetryRecorder};

/// What a task body asks of the scheduler after running.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TaskOutcome {
    /// Nothing left to wait for; the task may run as soon as it is armed again.
    Done,
    /// Do not run this task again until the duration has elapsed.
    RunAfter(Duration),
}

/// Summary of one scheduler pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PassReport<TInstant> {
    /// Number of task bodies invoked during the pass.
    pub dispatched: u8,
    /// `true` when the registry was empty at the end of the pass.
    pub idle: bool,
    /// Earliest instant an armed task becomes runnable, if any task is armed.
    pub next_due: Option<TInstant>,
}

/// Scheduler-owned state for every task plus the telemetry ring.
pub struct Clock<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    config: ClockConfig,
    minute_driver: MinuteDriver,
    battery: BatteryCheck,
    rearm: TimeSignalRearm,
    not_before: [Option<TInstant>; TASK_COUNT],
    telemetry: TelemetryRecorder<TInstant, CAPACITY>,
}

impl<TInstant, const CAPACITY: usize> Clock<TInstant, CAPACITY>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
{
    /// Boot sequence: resets shared state, parks every output and enables both
    /// interrupt sources.
    #[must_use]
    pub fn initialize<B, N>(
        shared: &ClockShared,
        board: &mut B,
        noon: &mut N,
        config: ClockConfig,
        boot: BootOptions,
    ) -> Self
    where
        B: Board,
        N: NoonIndicator + ?Sized,
    {
        board.disable(IrqSource::TimeSignal);
        board.disable(IrqSource::BatteryCheck);

        shared.preset(boot.time, boot.displayed_time);

        board.release_bridge();
        board.set_voltage_fet(false);
        board.clear_battery_outputs();
        noon.set_noon(boot.time.is_noon());

        if boot.arm_inc_minute {
            shared.registry().arm(TaskId::IncMinute);
        }

        board.enable(IrqSource::TimeSignal);
        board.enable(IrqSource::BatteryCheck);

        Self {
            config,
            minute_driver: MinuteDriver::new(config.pulse_duration()),
            battery: BatteryCheck::new(config.thresholds),
            rearm: TimeSignalRearm::new(),
            not_before: [None; TASK_COUNT],
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Runs one pass over the task set at `now`.
    pub fn run_one_pass<B>(
        &mut self,
        shared: &ClockShared,
        board: &mut B,
        now: TInstant,
    ) -> PassReport<TInstant>
    where
        B: Board,
    {
        let mut dispatched = 0u8;

        for task in TaskId::ALL {
            if !self.is_runnable(shared, task, now) {
                continue;
            }

            let outcome = self.dispatch(task, shared, board, now);
            self.not_before[task.as_index()] = match outcome {
                TaskOutcome::Done => None,
                TaskOutcome::RunAfter(delay) => Some(now + delay),
            };
            dispatched = dispatched.saturating_add(1);
        }

        PassReport {
            dispatched,
            idle: shared.registry().is_idle(),
            next_due: self.next_due(shared, now),
        }
    }

    /// Returns `true` when `task` is armed and its previous delay has elapsed.
    #[must_use]
    pub fn is_runnable(&self, shared: &ClockShared, task: TaskId, now: TInstant) -> bool {
        shared.registry().is_armed(task)
            && self.not_before[task.as_index()].is_none_or(|deadline| now >= deadline)
    }

    /// Earliest instant an armed task may run, clamped to `now`.
    #[must_use]
    pub fn next_due(&self, shared: &ClockShared, now: TInstant) -> Option<TInstant> {
        shared
            .registry()
            .armed()
            .map(|task| {
                self.not_before[task.as_index()]
                    .map_or(now, |deadline| deadline.max(now))
            })
            .min()
    }

    fn dispatch<B>(
        &mut self,
        task: TaskId,
        shared: &ClockShared,
        board: &mut B,
        now: TInstant,
    ) -> TaskOutcome
    where
        B: Board,
    {
        let timings = &self.config.timings;
        let mut events = self.telemetry.stamped(now);

        match task {
            TaskId::IncMinute => self.minute_driver.run(shared, board, timings, &mut events),
            TaskId::CheckBatteries => self.battery.run(shared, board, timings, &mut events),
            TaskId::ReenableTimeSignalIrq => self.rearm.run(shared, board, timings, &mut events),
        }
    }

    /// Configuration captured at boot.
    #[must_use]
    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Current phase of the H-bridge state machine.
    #[must_use]
    pub fn bridge_phase(&self) -> BridgePhase {
        self.minute_driver.phase()
    }

    /// State of the time-signal re-arm task.
    #[must_use]
    pub fn rearm(&self) -> &TimeSignalRearm {
        &self.rearm
    }

    /// State of the battery-check task.
    #[must_use]
    pub fn battery(&self) -> &BatteryCheck {
        &self.battery
    }

    /// Earliest instant `task` may run again, if it is waiting on a delay.
    #[must_use]
    pub fn not_before(&self, task: TaskId) -> Option<TInstant> {
        self.not_before[task.as_index()]
    }

    /// Events recorded by the task bodies.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryRecorder<TInstant, CAPACITY> {
        &self.telemetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::BatteryCell;
    use crate::board::{BatteryPanel, BatterySampler, BridgeOutputs, ClockInputs, IrqControl};
    use crate::config::JumperIndex;
    use crate::hbridge::Polarity;
    use crate::irq::on_time_signal_edge;
    use crate::time::ClockTime;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    struct Ms(u64);

    impl Add<Duration> for Ms {
        type Output = Ms;

        fn add(self, rhs: Duration) -> Ms {
            Ms(self.0 + u64::try_from(rhs.as_millis()).unwrap())
        }
    }

    #[derive(Default)]
    struct Rig {
        signal: bool,
        button: bool,
        paused: bool,
        bridge: [bool; 2],
        fet: bool,
        ok: [bool; 3],
        samples: [u8; 3],
        noon: bool,
        time_signal_enabled: bool,
        battery_enabled: bool,
    }

    impl ClockInputs for Rig {
        fn time_signal_present(&self) -> bool {
            self.signal
        }

        fn check_button_pressed(&self) -> bool {
            self.button
        }

        fn clock_paused(&self) -> bool {
            self.paused
        }
    }

    impl BridgeOutputs for Rig {
        fn set_bridge(&mut self, polarity: Polarity, energized: bool) {
            let index = match polarity {
                Polarity::Forward => 0,
                Polarity::Reverse => 1,
            };
            self.bridge[index] = energized;
        }
    }

    impl BatteryPanel for Rig {
        fn set_voltage_fet(&mut self, on: bool) {
            self.fet = on;
        }

        fn set_battery_ok(&mut self, cell: BatteryCell, ok: bool) {
            self.ok[cell.as_index()] = ok;
        }
    }

    impl BatterySampler for Rig {
        fn sample_8bit(&mut self, cell: BatteryCell) -> u8 {
            self.samples[cell.as_index()]
        }
    }

    impl IrqControl for Rig {
        fn enable(&mut self, source: IrqSource) {
            match source {
                IrqSource::TimeSignal => self.time_signal_enabled = true,
                IrqSource::BatteryCheck => self.battery_enabled = true,
            }
        }

        fn disable(&mut self, source: IrqSource) {
            match source {
                IrqSource::TimeSignal => self.time_signal_enabled = false,
                IrqSource::BatteryCheck => self.battery_enabled = false,
            }
        }
    }

    impl NoonIndicator for Rig {
        fn set_noon(&mut self, asserted: bool) {
            self.noon = asserted;
        }
    }

    fn boot(shared: &ClockShared, rig: &mut Rig, boot: BootOptions) -> Clock<Ms> {
        struct Flag<'a>(&'a mut bool);

        impl NoonIndicator for Flag<'_> {
            fn set_noon(&mut self, asserted: bool) {
                *self.0 = asserted;
            }
        }

        let mut noon = false;
        let clock = Clock::initialize(
            shared,
            rig,
            &mut Flag(&mut noon),
            ClockConfig::with_jumpers(JumperIndex::from_bits(0)),
            boot,
        );
        rig.noon = noon;
        clock
    }

    #[test]
    fn initialize_leaves_board_parked_and_idle() {
        let shared = ClockShared::new();
        shared.registry().arm(TaskId::CheckBatteries);
        let mut rig = Rig {
            bridge: [true, false],
            fet: true,
            ok: [true; 3],
            ..Rig::default()
        };

        let mut clock = boot(&shared, &mut rig, BootOptions::COLD);

        assert!(shared.registry().is_idle());
        assert_eq!(shared.time(), ClockTime::NOON);
        assert_eq!(shared.displayed_time(), ClockTime::NOON);
        assert_eq!(rig.bridge, [false, false]);
        assert!(!rig.fet);
        assert_eq!(rig.ok, [false; 3]);
        assert!(rig.noon);
        assert!(rig.time_signal_enabled);
        assert!(rig.battery_enabled);
        assert_eq!(clock.bridge_phase(), BridgePhase::Released);

        let report = clock.run_one_pass(&shared, &mut rig, Ms(0));
        assert_eq!(
            report,
            PassReport {
                dispatched: 0,
                idle: true,
                next_due: None,
            }
        );
    }

    #[test]
    fn tasks_wait_for_their_not_before_instant() {
        let shared = ClockShared::new();
        let mut rig = Rig::default();
        let mut clock = boot(&shared, &mut rig, BootOptions::COLD);
        let pulse = clock.config().pulse_duration();

        rig.signal = true;
        on_time_signal_edge(&shared, &mut Rig::default(), &mut rig);

        let report = clock.run_one_pass(&shared, &mut rig, Ms(0));
        assert_eq!(report.dispatched, 2);
        assert!(!report.idle);
        assert_eq!(report.next_due, Some(Ms(5)));
        assert_eq!(rig.bridge, [true, false]);
        assert_eq!(clock.not_before(TaskId::IncMinute), Some(Ms(0) + pulse));

        let report = clock.run_one_pass(&shared, &mut rig, Ms(4));
        assert_eq!(report.dispatched, 0);

        rig.signal = false;
        let report = clock.run_one_pass(&shared, &mut rig, Ms(5));
        assert_eq!(report.dispatched, 1);
        assert!(rig.time_signal_enabled);
        assert_eq!(report.next_due, Some(Ms(0) + pulse));

        let report = clock.run_one_pass(&shared, &mut rig, Ms(0) + pulse);
        assert_eq!(report.dispatched, 1);
        assert!(report.idle);
        assert_eq!(report.next_due, None);
        assert_eq!(rig.bridge, [false, false]);
        assert_eq!(shared.displayed_time(), shared.time());
    }

    #[test]
    fn next_due_is_clamped_to_now() {
        let shared = ClockShared::new();
        let mut rig = Rig::default();
        let clock = boot(&shared, &mut rig, BootOptions::COLD);

        shared.registry().arm(TaskId::CheckBatteries);

        assert_eq!(clock.next_due(&shared, Ms(42)), Some(Ms(42)));
        assert!(clock.is_runnable(&shared, TaskId::CheckBatteries, Ms(42)));
        assert!(!clock.is_runnable(&shared, TaskId::IncMinute, Ms(42)));
    }

    #[test]
    fn pass_records_events_with_pass_timestamp() {
        let shared = ClockShared::new();
        let mut rig = Rig {
            samples: [200, 100, 200],
            ..Rig::default()
        };
        let mut clock = boot(&shared, &mut rig, BootOptions::COLD);

        shared.registry().arm(TaskId::CheckBatteries);
        clock.run_one_pass(&shared, &mut rig, Ms(7));

        let stamps: heapless::Vec<u64, 4> = clock
            .telemetry()
            .oldest_first()
            .map(|record| record.timestamp.0)
            .collect();
        assert_eq!(stamps.as_slice(), &[7, 7]);
        let report = clock.battery().last_report().copied().unwrap();
        assert!(report.is_ok(BatteryCell::One));
        assert!(!report.is_ok(BatteryCell::Two));
    }

    #[test]
    fn sweep_boot_arms_the_minute_driver() {
        let shared = ClockShared::new();
        let mut rig = Rig::default();
        let mut clock = boot(&shared, &mut rig, BootOptions::SWEEP);

        assert!(!rig.noon);
        assert_eq!(shared.minutes_behind(), ClockTime::LAST_MINUTE.minutes());

        let report = clock.run_one_pass(&shared, &mut rig, Ms(0));
        assert_eq!(report.dispatched, 1);
        assert_eq!(rig.bridge, [true, false]);
    }
}
