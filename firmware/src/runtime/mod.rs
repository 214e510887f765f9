use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_stm32 as hal;

use clock_core::config::{BootOptions, ClockConfig};
use clock_core::idle::sleep_if_idle;
use clock_core::{Clock, ClockShared};

use crate::hw::exti::{NoonPin, install_noon_pin};
use crate::hw::{ClockBoard, WfiSleeper};
use crate::instant::FirmwareInstant;
use crate::telemetry::{LogCursor, log_boot};

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Counters and task registry shared with the EXTI handler.
pub(crate) static SHARED: ClockShared = ClockShared::new();

#[cfg(feature = "sweep-test")]
const BOOT: BootOptions = BootOptions::SWEEP;
#[cfg(not(feature = "sweep-test"))]
const BOOT: BootOptions = BootOptions::COLD;

#[cortex_m_rt::entry]
fn main() -> ! {
    let parts = ClockBoard::take(hal::init(hal::Config::default()));
    let mut board = parts.board;
    install_noon_pin(parts.noon);

    let config = ClockConfig::with_jumpers(parts.jumpers);
    log_boot(&config, cfg!(feature = "sweep-test"));

    let mut clock: Clock<FirmwareInstant> =
        Clock::initialize(&SHARED, &mut board, &mut NoonPin, config, BOOT);
    let mut cursor = LogCursor::new();
    let mut sleeper = WfiSleeper;

    loop {
        let report = clock.run_one_pass(&SHARED, &mut board, FirmwareInstant::now());
        cursor.flush(clock.telemetry());

        if report.idle {
            sleep_if_idle(&SHARED, &mut sleeper);
        }
    }
}
