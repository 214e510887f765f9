//! Collaborator contracts the core consumes.
//!
//! The firmware implements these over real GPIO, ADC and EXTI peripherals; the
//! emulator implements them over a simulated board. Inputs are reported in
//! logical terms ("present", "pressed", "paused") so polarity handling stays in
//! the implementations, with [`InputPolarity`] as the shared helper.

use crate::battery::BatteryCell;
use crate::hbridge::Polarity;

/// Electrical level of a pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Builds a level from a raw bit (`true` == high).
    #[must_use]
    pub const fn from_high(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// How a sensed input encodes its active state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputPolarity {
    ActiveLow,
    ActiveHigh,
}

impl InputPolarity {
    /// Polarity shared by the time signal, check button and pause switch.
    pub const SENSED_INPUTS: Self = InputPolarity::ActiveLow;

    /// Returns `true` when `level` represents the active state.
    #[must_use]
    pub const fn is_active(self, level: Level) -> bool {
        matches!(
            (self, level),
            (InputPolarity::ActiveLow, Level::Low) | (InputPolarity::ActiveHigh, Level::High)
        )
    }
}

/// Interrupt sources owned by the core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IrqSource {
    /// Falling edge on the master-clock time-signal line.
    TimeSignal,
    /// Assertion of the battery-check button.
    BatteryCheck,
}

/// Sensed inputs, already converted to their logical meaning.
pub trait ClockInputs {
    /// Returns `true` while the master clock holds the time-signal line asserted.
    fn time_signal_present(&self) -> bool;

    /// Returns `true` while the battery-check button is held.
    fn check_button_pressed(&self) -> bool;

    /// Returns `true` while the pause switch holds the hands still.
    fn clock_paused(&self) -> bool;
}

/// H-bridge outputs driving the movement coil.
pub trait BridgeOutputs {
    /// Drives the output for `polarity` to the requested state.
    fn set_bridge(&mut self, polarity: Polarity, energized: bool);

    /// De-asserts both bridge outputs.
    fn release_bridge(&mut self) {
        self.set_bridge(Polarity::Forward, false);
        self.set_bridge(Polarity::Reverse, false);
    }
}

/// Output signalling that the authoritative time sits at noon.
pub trait NoonIndicator {
    fn set_noon(&mut self, asserted: bool);
}

/// Battery indicator outputs and the FET that connects the cells to the ADC.
pub trait BatteryPanel {
    /// Switches the FET that passes the cell voltages to the ADC inputs.
    fn set_voltage_fet(&mut self, on: bool);

    /// Drives the "battery OK" output for `cell`.
    fn set_battery_ok(&mut self, cell: BatteryCell, ok: bool);

    /// De-asserts every battery indicator.
    fn clear_battery_outputs(&mut self) {
        for cell in BatteryCell::ALL {
            self.set_battery_ok(cell, false);
        }
    }
}

/// Single-conversion 8-bit ADC against the fixed low reference.
pub trait BatterySampler {
    /// Selects the channel for `cell` and returns one 8-bit sample.
    fn sample_8bit(&mut self, cell: BatteryCell) -> u8;
}

/// Per-source interrupt mask control.
pub trait IrqControl {
    fn enable(&mut self, source: IrqSource);
    fn disable(&mut self, source: IrqSource);
}

/// Low-power wait that returns once an enabled interrupt fires.
pub trait Sleep {
    fn sleep(&mut self);
}

/// Everything the scheduler passes to its tasks.
pub trait Board: ClockInputs + BridgeOutputs + BatteryPanel + BatterySampler + IrqControl {}

impl<T> Board for T where T: ClockInputs + BridgeOutputs + BatteryPanel + BatterySampler + IrqControl
{}
