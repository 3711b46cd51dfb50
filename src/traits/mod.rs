//! Trait definitions for hardware abstraction.
//!
//! These abstractions let the station run against real boosters on the
//! ESP32 or against the mocks in [`crate::hal::mock`] on desktop.
//!
//! # Hardware Abstraction
//!
//! - [`CurrentSense`]: Raw track current readings (ack detection, overload)
//! - [`TrackPower`]: Booster enable
//! - [`SignalOutput`]: Timed DCC bit output
//! - [`Clock`]: Time source for `no_std` environments

pub mod hardware;

pub use hardware::*;
