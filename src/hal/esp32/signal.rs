//! DCC signal output by busy-wait bit timing.
//!
//! A DCC `1` is 58 µs high then 58 µs low; a `0` is 100 µs each. The pin
//! drives the direction input of the booster, which turns the level into
//! track polarity.
//!
//! Timing uses the ROM busy-wait delay (`Ets`) through the `embedded-hal`
//! `DelayNs` trait, so the transmitter thread must own a core
//! (or at least run at high priority) for the waveform to stay within DCC timing limits.

use crate::traits::SignalOutput;
use embedded_hal::delay::DelayNs;
use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{Output, OutputPin, PinDriver};
use esp_idf_hal::peripheral::Peripheral;

/// Half period of a one-bit in microseconds.
pub const ONE_HALF_PERIOD_US: u32 = 58;

/// Half period of a zero-bit in microseconds.
pub const ZERO_HALF_PERIOD_US: u32 = 100;

/// DCC signal on one GPIO.
///
/// # Example
///
/// ```ignore
/// use rs_dcc_station::hal::esp32::Esp32Signal;
/// use rs_dcc_station::{MainRegisters, StationConfig, Transmitter};
///
/// let main = MainRegisters::new(&StationConfig::default());
/// let mut signal = Esp32Signal::new(peripherals.pins.gpio2)?;
/// let mut tx = Transmitter::new(main.consumer().unwrap());
/// loop {
///     tx.drive(&mut signal);
/// }
/// ```
pub struct Esp32Signal<'d, P>
where
    P: OutputPin,
{
    pin: PinDriver<'d, P, Output>,
    delay: Ets,
}

impl<'d, P> Esp32Signal<'d, P>
where
    P: OutputPin,
{
    /// Creates the signal output, starting low.
    ///
    /// # Errors
    ///
    /// Returns an error if GPIO configuration fails.
    pub fn new(pin: impl Peripheral<P = P> + 'd) -> Result<Self, esp_idf_hal::sys::EspError> {
        let mut pin = PinDriver::output(pin)?;
        pin.set_low()?;
        Ok(Self { pin, delay: Ets })
    }
}

impl<P> SignalOutput for Esp32Signal<'_, P>
where
    P: OutputPin,
{
    fn write_bit(&mut self, bit: bool) {
        let half = if bit {
            ONE_HALF_PERIOD_US
        } else {
            ZERO_HALF_PERIOD_US
        };
        // GPIO writes on an owned output pin do not fail
        let _ = self.pin.set_high();
        DelayNs::delay_us(&mut self.delay, half);
        let _ = self.pin.set_low();
        DelayNs::delay_us(&mut self.delay, half);
    }
}
