#![allow(dead_code)]

use core::ops::Add;
use core::time::Duration;

use clock_core::battery::BatteryCell;
use clock_core::board::{
    BatteryPanel, BatterySampler, BridgeOutputs, ClockInputs, IrqControl, IrqSource,
    NoonIndicator,
};
use clock_core::config::{BootOptions, ClockConfig, JumperIndex};
use clock_core::hbridge::Polarity;
use clock_core::irq::{on_battery_button, on_time_signal_edge};
use clock_core::telemetry::ClockEvent;
use clock_core::{Clock, ClockShared, ClockTime, PassReport};

/// Virtual millisecond clock for driving the scheduler.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Millis(pub u64);

impl Add<Duration> for Millis {
    type Output = Millis;

    fn add(self, rhs: Duration) -> Millis {
        Millis(self.0 + u64::try_from(rhs.as_millis()).expect("duration fits in u64"))
    }
}

#[derive(Debug, Default)]
pub struct SimBoard {
    pub signal: bool,
    pub button: bool,
    pub paused: bool,
    pub bridge: [bool; 2],
    pub pulses: [u32; 2],
    pub peak_energized: usize,
    pub fet: bool,
    pub ok: [bool; 3],
    pub samples: [u8; 3],
    pub time_signal_irq: bool,
    pub battery_irq: bool,
}

impl SimBoard {
    pub fn total_pulses(&self) -> u32 {
        self.pulses[0] + self.pulses[1]
    }
}

impl ClockInputs for SimBoard {
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

impl BridgeOutputs for SimBoard {
    fn set_bridge(&mut self, polarity: Polarity, energized: bool) {
        let index = match polarity {
            Polarity::Forward => 0,
            Polarity::Reverse => 1,
        };
        if energized && !self.bridge[index] {
            self.pulses[index] += 1;
        }
        self.bridge[index] = energized;
        let energized_now = self.bridge.iter().filter(|on| **on).count();
        self.peak_energized = self.peak_energized.max(energized_now);
    }
}

impl BatteryPanel for SimBoard {
    fn set_voltage_fet(&mut self, on: bool) {
        self.fet = on;
    }

    fn set_battery_ok(&mut self, cell: BatteryCell, ok: bool) {
        self.ok[cell.as_index()] = ok;
    }
}

impl BatterySampler for SimBoard {
    fn sample_8bit(&mut self, cell: BatteryCell) -> u8 {
        self.samples[cell.as_index()]
    }
}

impl IrqControl for SimBoard {
    fn enable(&mut self, source: IrqSource) {
        match source {
            IrqSource::TimeSignal => self.time_signal_irq = true,
            IrqSource::BatteryCheck => self.battery_irq = true,
        }
    }

    fn disable(&mut self, source: IrqSource) {
        match source {
            IrqSource::TimeSignal => self.time_signal_irq = false,
            IrqSource::BatteryCheck => self.battery_irq = false,
        }
    }
}

#[derive(Debug, Default)]
pub struct NoonLine {
    pub asserted: bool,
    pub rising_edges: u32,
}

impl NoonIndicator for NoonLine {
    fn set_noon(&mut self, asserted: bool) {
        if asserted && !self.asserted {
            self.rising_edges += 1;
        }
        self.asserted = asserted;
    }
}

pub const RING: usize = 64;

pub struct Bench {
    pub shared: ClockShared,
    pub board: SimBoard,
    pub noon: NoonLine,
    pub clock: Clock<Millis, RING>,
    pub now: Millis,
    pub sampled: u32,
    seen: Option<u32>,
}

impl Bench {
    pub fn boot(boot: BootOptions) -> Self {
        Self::boot_with(ClockConfig::with_jumpers(JumperIndex::from_bits(0)), boot)
    }

    pub fn boot_with(config: ClockConfig, boot: BootOptions) -> Self {
        let shared = ClockShared::new();
        let mut board = SimBoard::default();
        let mut noon = NoonLine::default();
        let clock = Clock::initialize(&shared, &mut board, &mut noon, config, boot);

        Self {
            shared,
            board,
            noon,
            clock,
            now: Millis(0),
            sampled: 0,
            seen: None,
        }
    }

    pub fn preset(time: u16, displayed: u16) -> Self {
        Self::boot(BootOptions {
            time: ClockTime::wrapping(time),
            displayed_time: ClockTime::wrapping(displayed),
            arm_inc_minute: time != displayed,
        })
    }

    /// Pulls the time-signal line. Returns `true` if the edge reached the handler.
    pub fn assert_time_signal(&mut self) -> bool {
        self.board.signal = true;
        if !self.board.time_signal_irq {
            return false;
        }
        on_time_signal_edge(&self.shared, &mut self.noon, &mut self.board);
        true
    }

    pub fn release_time_signal(&mut self) {
        self.board.signal = false;
    }

    /// Presses the check button. Returns `true` if the press reached the handler.
    pub fn press_button(&mut self) -> bool {
        self.board.button = true;
        if !self.board.battery_irq {
            return false;
        }
        on_battery_button(&self.shared, &mut self.board);
        true
    }

    pub fn release_button(&mut self) {
        self.board.button = false;
    }

    pub fn pass(&mut self) -> PassReport<Millis> {
        let report = self
            .clock
            .run_one_pass(&self.shared, &mut self.board, self.now);
        self.absorb_events();
        report
    }

    /// Runs every pass due up to and including `deadline`, then parks at `deadline`.
    pub fn run_until(&mut self, deadline: Millis) {
        loop {
            let report = self.pass();
            match report.next_due {
                Some(due) if due <= deadline => self.now = due,
                _ => break,
            }
        }
        self.now = self.now.max(deadline);
    }

    pub fn run_for(&mut self, span: Duration) {
        let deadline = self.now + span;
        self.run_until(deadline);
    }

    /// Runs passes until no task is armed.
    pub fn settle(&mut self) {
        for _ in 0..100_000 {
            let report = self.pass();
            match report.next_due {
                Some(due) => self.now = due,
                None => return,
            }
        }
        panic!("scheduler never went idle");
    }

    /// One master-clock minute: a pulse held for `hold`, then settle.
    pub fn minute(&mut self, hold: Duration) {
        self.assert_time_signal();
        self.run_for(hold);
        self.release_time_signal();
        self.settle();
    }

    fn absorb_events(&mut self) {
        let mut last = self.seen;
        for record in self.clock.telemetry().records_after(self.seen) {
            if matches!(record.event, ClockEvent::BatterySampled(_)) {
                self.sampled += 1;
            }
            last = Some(record.id);
        }
        self.seen = last;
    }
}
