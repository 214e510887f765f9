//! EXTI wiring for the time-signal line and the battery-check button.
//!
//! Both inputs are active-low with pull-ups, so assertion is a falling edge.
//! PA0 sits on EXTI line 0 and PA1 on line 1; the reset value of the EXTI port
//! selectors already routes both lines to port A. The two lines share the
//! `EXTI0_1` vector.

use core::cell::RefCell;

use clock_core::board::{IrqControl, IrqSource, NoonIndicator};
use clock_core::irq;
use embassy_stm32::gpio::Output;
use embassy_stm32::pac;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use pac::interrupt;

use crate::runtime::SHARED;

/// EXTI line carrying the master-clock time signal (PA0).
const TIME_SIGNAL_LINE: usize = 0;

/// EXTI line carrying the battery-check button (PA1).
const CHECK_BUTTON_LINE: usize = 1;

/// Lines 0-31 live in the first register bank.
const BANK: usize = 0;

/// Noon output, shared between the boot sequence and the time-signal handler.
static NOON: Mutex<CriticalSectionRawMutex, RefCell<Option<Output<'static>>>> =
    Mutex::new(RefCell::new(None));

const fn line_for(source: IrqSource) -> usize {
    match source {
        IrqSource::TimeSignal => TIME_SIGNAL_LINE,
        IrqSource::BatteryCheck => CHECK_BUTTON_LINE,
    }
}

/// Hands the noon pin to the interrupt side. Call before enabling interrupts.
pub fn install_noon_pin(pin: Output<'static>) {
    NOON.lock(|cell| *cell.borrow_mut() = Some(pin));
}

/// [`NoonIndicator`] over the shared noon pin.
pub struct NoonPin;

impl NoonIndicator for NoonPin {
    fn set_noon(&mut self, asserted: bool) {
        NOON.lock(|cell| {
            if let Some(pin) = cell.borrow_mut().as_mut() {
                if asserted {
                    pin.set_high();
                } else {
                    pin.set_low();
                }
            }
        });
    }
}

/// Per-line interrupt masks in the EXTI block.
#[derive(Copy, Clone, Debug, Default)]
pub struct ExtiLines;

impl ExtiLines {
    /// Selects falling-edge triggering on both lines and unmasks the vector.
    /// Lines stay masked until [`IrqControl::enable`] is called.
    pub fn configure() -> Self {
        let exti = pac::EXTI;

        exti.imr(BANK).modify(|w| {
            w.set_line(TIME_SIGNAL_LINE, false);
            w.set_line(CHECK_BUTTON_LINE, false);
        });
        exti.rtsr(BANK).modify(|w| {
            w.set_line(TIME_SIGNAL_LINE, false);
            w.set_line(CHECK_BUTTON_LINE, false);
        });
        exti.ftsr(BANK).modify(|w| {
            w.set_line(TIME_SIGNAL_LINE, true);
            w.set_line(CHECK_BUTTON_LINE, true);
        });

        unsafe {
            cortex_m::peripheral::NVIC::unmask(embassy_stm32::interrupt::EXTI0_1);
        }

        Self
    }
}

impl IrqControl for ExtiLines {
    fn enable(&mut self, source: IrqSource) {
        let exti = pac::EXTI;
        let line = line_for(source);
        critical_section::with(|_| {
            // Drop edges latched while the line was masked.
            exti.fpr(BANK).write(|w| w.set_line(line, true));
            exti.imr(BANK).modify(|w| w.set_line(line, true));

            // Both inputs are on port A and active-low.
            let asserted = pac::GPIOA.idr().read().idr(line) == pac::gpio::vals::Idr::LOW;
            let latched = exti.fpr(BANK).read().line(line);
            irq::take_unlatched_edge(source, asserted, latched, &SHARED, &mut NoonPin, self);
        });
    }

    fn disable(&mut self, source: IrqSource) {
        pac::EXTI
            .imr(BANK)
            .modify(|w| w.set_line(line_for(source), false));
    }
}

#[interrupt]
fn EXTI0_1() {
    let exti = pac::EXTI;
    let pending = exti.fpr(BANK).read();
    let mut lines = ExtiLines;

    if pending.line(TIME_SIGNAL_LINE) {
        exti.fpr(BANK).write(|w| w.set_line(TIME_SIGNAL_LINE, true));
        irq::on_time_signal_edge(&SHARED, &mut NoonPin, &mut lines);
    }

    if pending.line(CHECK_BUTTON_LINE) {
        exti.fpr(BANK).write(|w| w.set_line(CHECK_BUTTON_LINE, true));
        irq::on_battery_button(&SHARED, &mut lines);
    }
}
