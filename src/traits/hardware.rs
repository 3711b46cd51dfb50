//! Hardware abstraction traits for track power, current sensing, and the
//! DCC signal output.
//!
//! This module defines the hardware interfaces that let the register engine
//! run on ESP32 hardware, in desktop simulations, and in tests.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`CurrentSense`] | Raw track current reads for acks and overload |
//! | [`TrackPower`] | Enable pins of the main and programming boosters |
//! | [`SignalOutput`] | Drives one DCC bit onto the rails |
//! | [`Clock`] | Time source for `no_std` environments |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use rs_dcc_station::traits::{CurrentSense, TrackPower};
//! use rs_dcc_station::hal::{MockCurrentSense, MockTrackPower};
//!
//! let mut power = MockTrackPower::new();
//! power.set_enabled(true).unwrap();
//! assert!(power.is_enabled());
//!
//! let mut sense = MockCurrentSense::new(12);
//! assert_eq!(sense.read_raw(), 12);
//! ```

/// Locomotive direction as encoded in the 128-step speed instruction.
///
/// # Default
///
/// Defaults to [`Forward`](Self::Forward).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Direction bit clear.
    Reverse,
    /// Direction bit set.
    #[default]
    Forward,
}

impl Direction {
    /// The wire value: 1 forward, 0 reverse.
    #[inline]
    pub const fn bit(&self) -> u8 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => 0,
        }
    }

    /// Direction from its wire value. Only 0 and 1 are valid.
    pub const fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            1 => Some(Direction::Forward),
            0 => Some(Direction::Reverse),
            _ => None,
        }
    }
}

/// Raw track current input.
///
/// Readings are on a 10-bit scale (0-1023). Acknowledgment detection only
/// looks at the rise above a baseline, so no calibration to milliamps is
/// needed.
///
/// # Implementation Notes
///
/// - Reads must not block; the ack sampler takes hundreds back to back
/// - A failed read should return 0 rather than panic
pub trait CurrentSense {
    /// Takes one raw reading.
    fn read_raw(&mut self) -> u16;
}

impl<T: CurrentSense + ?Sized> CurrentSense for &mut T {
    fn read_raw(&mut self) -> u16 {
        (**self).read_raw()
    }
}

/// Track power switching.
///
/// Both tracks are switched together, matching a motor shield where the
/// main and programming channels share one power command.
pub trait TrackPower {
    /// Error type for power switching.
    type Error;

    /// Switches both tracks on or off.
    fn set_enabled(&mut self, on: bool) -> Result<(), Self::Error>;

    /// Returns true if the tracks are powered.
    fn is_enabled(&self) -> bool;

    /// Convenience method to cut power.
    fn power_off(&mut self) -> Result<(), Self::Error> {
        self.set_enabled(false)
    }
}

/// One DCC bit onto the rails.
///
/// Implementations hold the output high then low for 58 µs each for a `1`
/// and 100 µs each for a `0`.
pub trait SignalOutput {
    /// Emits one full bit period.
    fn write_bit(&mut self, bit: bool);
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for overload sampling. On
/// desktop, this can wrap `std::time::Instant`. On embedded, use a
/// hardware timer.
///
/// # Example
///
/// ```rust
/// use rs_dcc_station::traits::Clock;
/// use rs_dcc_station::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}
