//! Track current sensing via the ESP32 ADC.
//!
//! Each booster channel exposes a current sense output (on an Arduino
//! motor shield, a voltage proportional to track current). The ESP32 reads
//! 12 bits; readings are scaled down to the 10-bit range the ack and
//! overload thresholds are calibrated for.
//!
//! # Wiring
//!
//! - Main track sense → GPIO0 (ADC1 channel 0)
//! - Programming track sense → GPIO1 (ADC1 channel 1)
//!
//! Note: On ESP32-C3, only ADC1 is usable while WiFi is active, so both
//! channels share one `AdcDriver` on ADC1.

use crate::traits::CurrentSense;
use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::gpio::ADCPin;
use esp_idf_hal::peripheral::Peripheral;

/// One track's current sense channel.
///
/// # Example
///
/// ```ignore
/// use esp_idf_hal::adc::oneshot::AdcDriver;
/// use rs_dcc_station::hal::esp32::Esp32CurrentSense;
/// use rs_dcc_station::traits::CurrentSense;
///
/// let peripherals = Peripherals::take()?;
/// let adc = AdcDriver::new(peripherals.adc1)?;
/// let mut prog_sense = Esp32CurrentSense::new(&adc, peripherals.pins.gpio1)?;
///
/// let raw = prog_sense.read_raw(); // 0-1023
/// ```
pub struct Esp32CurrentSense<'d, T>
where
    T: ADCPin<Adc = ADC1>,
{
    /// ADC channel on the sense pin
    channel: AdcChannelDriver<'d, T, &'d AdcDriver<'d, ADC1>>,
}

impl<'d, T> Esp32CurrentSense<'d, T>
where
    T: ADCPin<Adc = ADC1>,
{
    /// Bits dropped to go from 12-bit to 10-bit readings.
    const SCALE_SHIFT: u16 = 2;

    /// Creates a sense channel.
    ///
    /// # Arguments
    ///
    /// * `adc` - Reference to ADC1 driver (must outlive this struct)
    /// * `pin` - ADC1-capable GPIO wired to the sense output
    ///
    /// # Errors
    ///
    /// Returns an error if ADC channel initialization fails.
    pub fn new(
        adc: &'d AdcDriver<'d, ADC1>,
        pin: impl Peripheral<P = T> + 'd,
    ) -> Result<Self, esp_idf_hal::sys::EspError> {
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let channel = AdcChannelDriver::new(adc, pin, &config)?;
        Ok(Self { channel })
    }
}

impl<T> CurrentSense for Esp32CurrentSense<'_, T>
where
    T: ADCPin<Adc = ADC1>,
{
    fn read_raw(&mut self) -> u16 {
        // a failed conversion reads as no current
        self.channel.read().unwrap_or(0) >> Self::SCALE_SHIFT
    }
}
