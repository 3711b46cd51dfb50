//! ESP32-C3 hardware abstraction layer for the command station.
//!
//! The board drives an Arduino-style dual H-bridge motor shield used as a
//! DCC booster: channel A feeds the main track, channel B the programming
//! track.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 SuperMini (RISC-V 160MHz, 4MB Flash)
//! - **Booster**: L298-based dual motor shield
//! - **Current sense**: shield sense outputs into ADC1
//!
//! # Pin Assignments
//!
//! See the [`pins`] module for GPIO assignments matching the SuperMini layout.

mod clock;
mod current;
mod power;
mod signal;

pub use clock::Esp32Clock;
pub use current::Esp32CurrentSense;
pub use power::Esp32TrackPower;
pub use signal::{Esp32Signal, ONE_HALF_PERIOD_US, ZERO_HALF_PERIOD_US};

/// Pin assignments for SuperMini ESP32-C3.
pub mod pins {
    // =========================================================================
    // Current Sense (ADC1)
    // =========================================================================

    /// Main track current sense
    pub const MAIN_SENSE: i32 = 0;

    /// Programming track current sense
    pub const PROG_SENSE: i32 = 1;

    // =========================================================================
    // DCC Signal (booster direction inputs)
    // =========================================================================

    /// Main track DCC signal (channel A direction)
    pub const MAIN_SIGNAL: i32 = 2;

    /// Programming track DCC signal (channel B direction)
    pub const PROG_SIGNAL: i32 = 3;

    // =========================================================================
    // Track Power (booster enable inputs)
    // =========================================================================

    /// Main track enable (channel A PWM)
    pub const MAIN_ENABLE: i32 = 6;

    /// Programming track enable (channel B PWM)
    pub const PROG_ENABLE: i32 = 7;
}
