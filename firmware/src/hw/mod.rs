//! Pin map and the board the scheduler drives.
//!
//! | Signal | Pin | Direction |
//! |---|---|---|
//! | Time signal | PA0 | input, pull-up, EXTI0 |
//! | Battery-check button | PA1 | input, pull-up, EXTI1 |
//! | Pause switch | PA6 | input, pull-up |
//! | Noon indicator | PA7 | output |
//! | Duration jumpers 0-4 | PA8-PA12 | input, pull-up |
//! | Bridge output 1 / 2 | PB3 / PB4 | output |
//! | Voltage FET | PB5 | output |
//! | Battery OK 1-3 | PB6-PB8 | output |
//! | Battery sense 1-3 | PB0-PB2 | analog |

pub mod battery;
pub mod exti;

use clock_core::battery::BatteryCell;
use clock_core::board::{
    BatteryPanel, BatterySampler, BridgeOutputs, ClockInputs, InputPolarity, IrqControl,
    IrqSource, Level as LineLevel, Sleep,
};
use clock_core::config::JumperIndex;
use clock_core::hbridge::Polarity;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::Peripherals;

use self::battery::BatteryAdc;
use self::exti::ExtiLines;

fn is_active(input: &Input<'_>) -> bool {
    InputPolarity::SENSED_INPUTS.is_active(LineLevel::from_high(input.is_high()))
}

fn drive(pin: &mut Output<'_>, high: bool) {
    if high {
        pin.set_high();
    } else {
        pin.set_low();
    }
}

/// Everything the scheduler touches, built once at boot.
pub struct ClockBoard {
    time_signal: Input<'static>,
    check_button: Input<'static>,
    pause: Input<'static>,
    bridge: [Output<'static>; 2],
    voltage_fet: Output<'static>,
    battery_ok: [Output<'static>; 3],
    sampler: BatteryAdc<'static>,
    exti: ExtiLines,
}

/// Board plus the pieces that leave it at boot.
pub struct BoardParts {
    pub board: ClockBoard,
    pub noon: Output<'static>,
    pub jumpers: JumperIndex,
}

impl ClockBoard {
    /// Claims every pin. Jumpers are read once here and released.
    pub fn take(p: Peripherals) -> BoardParts {
        let jumpers = {
            let levels = [
                Input::new(p.PA8, Pull::Up),
                Input::new(p.PA9, Pull::Up),
                Input::new(p.PA10, Pull::Up),
                Input::new(p.PA11, Pull::Up),
                Input::new(p.PA12, Pull::Up),
            ]
            .map(|jumper| jumper.is_high());
            JumperIndex::from_levels(levels)
        };

        let sampler = BatteryAdc::new(
            Adc::new(p.ADC1),
            [
                p.PB0.degrade_adc(),
                p.PB1.degrade_adc(),
                p.PB2.degrade_adc(),
            ],
        );

        let board = ClockBoard {
            time_signal: Input::new(p.PA0, Pull::Up),
            check_button: Input::new(p.PA1, Pull::Up),
            pause: Input::new(p.PA6, Pull::Up),
            bridge: [
                Output::new(p.PB3, Level::Low, Speed::Low),
                Output::new(p.PB4, Level::Low, Speed::Low),
            ],
            voltage_fet: Output::new(p.PB5, Level::Low, Speed::Low),
            battery_ok: [
                Output::new(p.PB6, Level::Low, Speed::Low),
                Output::new(p.PB7, Level::Low, Speed::Low),
                Output::new(p.PB8, Level::Low, Speed::Low),
            ],
            sampler,
            exti: ExtiLines::configure(),
        };

        BoardParts {
            board,
            noon: Output::new(p.PA7, Level::Low, Speed::Low),
            jumpers,
        }
    }
}

impl ClockInputs for ClockBoard {
    fn time_signal_present(&self) -> bool {
        is_active(&self.time_signal)
    }

    fn check_button_pressed(&self) -> bool {
        is_active(&self.check_button)
    }

    fn clock_paused(&self) -> bool {
        is_active(&self.pause)
    }
}

impl BridgeOutputs for ClockBoard {
    fn set_bridge(&mut self, polarity: Polarity, energized: bool) {
        let index = match polarity {
            Polarity::Forward => 0,
            Polarity::Reverse => 1,
        };
        drive(&mut self.bridge[index], energized);
    }
}

impl BatteryPanel for ClockBoard {
    fn set_voltage_fet(&mut self, on: bool) {
        drive(&mut self.voltage_fet, on);
    }

    fn set_battery_ok(&mut self, cell: BatteryCell, ok: bool) {
        drive(&mut self.battery_ok[cell.as_index()], ok);
    }
}

impl BatterySampler for ClockBoard {
    fn sample_8bit(&mut self, cell: BatteryCell) -> u8 {
        self.sampler.sample_8bit(cell)
    }
}

impl IrqControl for ClockBoard {
    fn enable(&mut self, source: IrqSource) {
        self.exti.enable(source);
    }

    fn disable(&mut self, source: IrqSource) {
        self.exti.disable(source);
    }
}

/// Waits for an interrupt. Called with interrupts masked; a pending line still
/// ends the wait and its handler runs once the mask is lifted.
pub struct WfiSleeper;

impl Sleep for WfiSleeper {
    fn sleep(&mut self) {
        cortex_m::asm::wfi();
        // STM32 parts can resume from a masked WFI with a stale pipeline when a
        // debugger keeps the clocks running.
        cortex_m::asm::isb();
    }
}
