use core::panic::PanicInfo;

use defmt::error;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // Keep the handlers from touching the noon output after a fault.
    cortex_m::interrupt::disable();
    error!("panic: {}", defmt::Display2Format(info));
    cortex_m::asm::udf();
}
