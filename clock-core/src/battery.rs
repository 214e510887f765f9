//! Battery-check task.
//!
//! Samples the three cell voltages while the check button is held and mirrors
//! the result on one indicator per cell. Once the button is released the
//! indicators go dark and the button interrupt is re-enabled.

use crate::board::{BatteryPanel, BatterySampler, ClockInputs, IrqControl, IrqSource};
use crate::config::ClockTimings;
use crate::registry::TaskId;
use crate::scheduler::TaskOutcome;
use crate::shared::ClockShared;
use crate::telemetry::{ClockEvent, EventSink};

/// Reference voltage of the battery ADC, in millivolts.
pub const ADC_REFERENCE_MV: u32 = 1_100;

/// Converts a cell voltage to 8-bit ADC units against [`ADC_REFERENCE_MV`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn millivolts_to_units(millivolts: u32) -> u8 {
    let units = millivolts * 256 / ADC_REFERENCE_MV;
    if units > u8::MAX as u32 {
        u8::MAX
    } else {
        units as u8
    }
}

/// One of the three monitored cells.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BatteryCell {
    One,
    Two,
    Three,
}

impl BatteryCell {
    pub const ALL: [BatteryCell; 3] = [BatteryCell::One, BatteryCell::Two, BatteryCell::Three];

    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            BatteryCell::One => 0,
            BatteryCell::Two => 1,
            BatteryCell::Three => 2,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(BatteryCell::One),
            1 => Some(BatteryCell::Two),
            2 => Some(BatteryCell::Three),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BatteryCell::One => "batt1",
            BatteryCell::Two => "batt2",
            BatteryCell::Three => "batt3",
        }
    }
}

/// Per-cell comparator values in ADC units.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BatteryThresholds {
    pub minimum: [u8; 3],
}

impl BatteryThresholds {
    /// 0.8 V per cell against the 1.1 V reference (186 units).
    pub const DEFAULT: Self = Self::uniform(millivolts_to_units(800));

    /// Uses the same threshold for every cell.
    #[must_use]
    pub const fn uniform(units: u8) -> Self {
        Self {
            minimum: [units; 3],
        }
    }

    #[must_use]
    pub const fn for_cell(&self, cell: BatteryCell) -> u8 {
        self.minimum[cell.as_index()]
    }

    /// A cell is healthy only when its sample is strictly above the threshold.
    #[must_use]
    pub const fn is_ok(&self, cell: BatteryCell, sample: u8) -> bool {
        sample > self.for_cell(cell)
    }
}

impl Default for BatteryThresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Samples and verdicts from one pass over the cells.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BatteryReport {
    pub samples: [u8; 3],
    pub ok: [bool; 3],
}

impl BatteryReport {
    #[must_use]
    pub const fn sample(&self, cell: BatteryCell) -> u8 {
        self.samples[cell.as_index()]
    }

    #[must_use]
    pub const fn is_ok(&self, cell: BatteryCell) -> bool {
        self.ok[cell.as_index()]
    }
}

/// State for the `CheckBatteries` task.
#[derive(Clone, Debug)]
pub struct BatteryCheck {
    thresholds: BatteryThresholds,
    last_report: Option<BatteryReport>,
}

impl BatteryCheck {
    #[must_use]
    pub const fn new(thresholds: BatteryThresholds) -> Self {
        Self {
            thresholds,
            last_report: None,
        }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &BatteryThresholds {
        &self.thresholds
    }

    /// Most recent sampling result, kept after the indicators go dark.
    #[must_use]
    pub const fn last_report(&self) -> Option<&BatteryReport> {
        self.last_report.as_ref()
    }

    /// Samples every cell and drives the indicators.
    pub fn sample<B>(&mut self, board: &mut B) -> BatteryReport
    where
        B: BatteryPanel + BatterySampler,
    {
        board.set_voltage_fet(true);

        let mut report = BatteryReport {
            samples: [0; 3],
            ok: [false; 3],
        };
        for cell in BatteryCell::ALL {
            let sample = board.sample_8bit(cell);
            report.samples[cell.as_index()] = sample;
            report.ok[cell.as_index()] = self.thresholds.is_ok(cell, sample);
        }

        for cell in BatteryCell::ALL {
            board.set_battery_ok(cell, report.is_ok(cell));
        }

        self.last_report = Some(report);
        report
    }

    /// One dispatch of the `CheckBatteries` task.
    pub fn run<B, S>(
        &mut self,
        shared: &ClockShared,
        board: &mut B,
        timings: &ClockTimings,
        events: &mut S,
    ) -> TaskOutcome
    where
        B: ClockInputs + BatteryPanel + BatterySampler + IrqControl,
        S: EventSink,
    {
        let report = self.sample(board);
        events.emit(ClockEvent::BatterySampled(report));

        if board.check_button_pressed() {
            return TaskOutcome::RunAfter(timings.battery_poll);
        }

        board.set_voltage_fet(false);
        board.clear_battery_outputs();
        shared.registry().disarm(TaskId::CheckBatteries);
        board.enable(IrqSource::BatteryCheck);
        events.emit(ClockEvent::BatteryCheckFinished);

        TaskOutcome::Done
    }
}
