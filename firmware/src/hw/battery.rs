//! Battery sampling over the STM32G0 ADC.
//!
//! The cells sit behind a divider that the voltage FET connects to three ADC
//! inputs. The converter runs at 12 bits against VDDA; readings are rescaled to
//! the 8-bit units the thresholds are expressed in (full scale = 1.1 V).

use clock_core::battery::{BatteryCell, millivolts_to_units};
use clock_core::board::BatterySampler;
use embassy_stm32::adc::{Adc, AnyAdcChannel, Resolution, SampleTime};
use embassy_stm32::peripherals::ADC1;

/// Analog supply the converter measures against.
const VDDA_MV: u32 = 3_300;

/// Largest 12-bit reading.
const FULL_SCALE: u32 = 4_095;

/// Converts a 12-bit reading against VDDA into millivolts.
pub fn reading_to_millivolts(reading: u16) -> u32 {
    u32::from(reading) * VDDA_MV / FULL_SCALE
}

pub struct BatteryAdc<'d> {
    adc: Adc<'d, ADC1>,
    channels: [AnyAdcChannel<ADC1>; 3],
}

impl<'d> BatteryAdc<'d> {
    /// Takes the converter and the three cell channels, in cell order.
    pub fn new(mut adc: Adc<'d, ADC1>, channels: [AnyAdcChannel<ADC1>; 3]) -> Self {
        adc.set_resolution(Resolution::BITS12);
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self { adc, channels }
    }

    fn read_once(&mut self, cell: BatteryCell) -> u16 {
        self.adc
            .blocking_read(&mut self.channels[cell.as_index()])
    }
}

impl BatterySampler for BatteryAdc<'_> {
    fn sample_8bit(&mut self, cell: BatteryCell) -> u8 {
        // The first conversion after switching channels carries charge from the
        // previous input.
        let _ = self.read_once(cell);
        let reading = self.read_once(cell);
        millivolts_to_units(reading_to_millivolts(reading))
    }
}
