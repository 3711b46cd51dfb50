//! Booster enable pins.
//!
//! Both tracks are switched together: on an Arduino motor shield the enable
//! (PWM) inputs of channel A (main) and channel B (programming) are driven
//! high for power on and low for power off.

use crate::traits::TrackPower;
use esp_idf_hal::gpio::{Output, OutputPin, PinDriver};
use esp_idf_hal::peripheral::Peripheral;

/// Enable pins of the main and programming boosters.
///
/// # Example
///
/// ```ignore
/// use rs_dcc_station::hal::esp32::Esp32TrackPower;
/// use rs_dcc_station::traits::TrackPower;
///
/// let peripherals = Peripherals::take()?;
/// let mut power = Esp32TrackPower::new(
///     peripherals.pins.gpio6, // main enable
///     peripherals.pins.gpio7, // prog enable
/// )?;
///
/// power.set_enabled(true)?;
/// ```
pub struct Esp32TrackPower<'d, MAIN, PROG>
where
    MAIN: OutputPin,
    PROG: OutputPin,
{
    /// Main track enable
    main: PinDriver<'d, MAIN, Output>,
    /// Programming track enable
    prog: PinDriver<'d, PROG, Output>,
    /// Last commanded state
    enabled: bool,
}

impl<'d, MAIN, PROG> Esp32TrackPower<'d, MAIN, PROG>
where
    MAIN: OutputPin,
    PROG: OutputPin,
{
    /// Creates the enable outputs, starting with power off.
    ///
    /// # Errors
    ///
    /// Returns an error if GPIO configuration fails.
    pub fn new(
        main_pin: impl Peripheral<P = MAIN> + 'd,
        prog_pin: impl Peripheral<P = PROG> + 'd,
    ) -> Result<Self, esp_idf_hal::sys::EspError> {
        let mut power = Self {
            main: PinDriver::output(main_pin)?,
            prog: PinDriver::output(prog_pin)?,
            enabled: true,
        };
        power.set_enabled(false)?;
        Ok(power)
    }
}

impl<MAIN, PROG> TrackPower for Esp32TrackPower<'_, MAIN, PROG>
where
    MAIN: OutputPin,
    PROG: OutputPin,
{
    type Error = esp_idf_hal::sys::EspError;

    fn set_enabled(&mut self, on: bool) -> Result<(), Self::Error> {
        if on {
            self.main.set_high()?;
            self.prog.set_high()?;
        } else {
            self.main.set_low()?;
            self.prog.set_low()?;
        }
        self.enabled = on;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
