//! # rs-dcc-station
//!
//! A DCC command station core: the packet register engine that sits between
//! a text command interface and the track signal generator.
//!
//! ## Features
//!
//! - **Packet registers**: Double-buffered per-slot packets, handed to the
//!   transmitter through a single-slot lock-free mailbox
//! - **Bit transmitter**: Repeats, one-shot packets and round-robin refresh
//!   on a bit-by-bit stream
//! - **Operations mode**: Throttle, function, accessory and CV-on-main packets
//! - **Service mode**: CV read, byte write and bit write on the programming
//!   track with current-pulse acknowledgment
//! - **Overload protection**: Smoothed current monitoring per track
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `packet` - DCC frame and bit-packed packet encoding
//! - `register` - Register lists, mailbox and packet builders
//! - `transmitter` - Consumer that turns registers into bits
//! - `ack` - Service-mode acknowledgment detection
//! - `commands` - Text command parsing and framing
//! - `station` - Command dispatch, power and overload handling
//! - `traits` - Hardware abstractions
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use rs_dcc_station::{MainRegisters, StationConfig, Transmitter};
//! use rs_dcc_station::Direction;
//!
//! let main = MainRegisters::new(&StationConfig::default());
//! let mut tx = Transmitter::new(main.consumer().unwrap());
//!
//! // queue a speed packet, then let the transmitter pick it up
//! let reply = main.set_throttle(1, 3, 50, Direction::Forward).unwrap();
//! assert_eq!(reply.to_string(), "<T1 50 1>");
//! while !main.is_idle() {
//!     tx.next_bit();
//! }
//!
//! assert_eq!(main.speed(1), 50);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Service-mode acknowledgment sampling.
pub mod ack;
/// Text command parsing and stream framing.
pub mod commands;
/// Shared configuration for desktop and ESP32.
pub mod config;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Track current overload monitoring.
pub mod monitor;
/// DCC packet encoding.
pub mod packet;
/// Packet registers and the producer/consumer handoff.
pub mod register;
/// Reply formatting for the text protocol.
pub mod reply;
/// Command dispatch for one main and one programming track.
pub mod station;
/// Core traits for hardware abstraction.
pub mod traits;
/// Bit-level packet transmitter.
pub mod transmitter;

// Re-exports for convenience
pub use ack::AckSampler;
pub use commands::{Command, CommandFramer, Track};
pub use config::{AckConfig, DeviceConfig, MonitorConfig, StationConfig};
pub use error::{CommandError, PacketError, ParseError};
pub use monitor::CurrentMonitor;
pub use packet::{Frame, Packet};
pub use register::{Consumer, MainRegisters, ProgRegisters, RegisterList, TakenUpdate};
pub use reply::{Callback, CvBitReply, CvReply, PowerReply, ThrottleReply};
pub use station::CommandStation;
pub use traits::{Clock, CurrentSense, Direction, SignalOutput, TrackPower};
pub use transmitter::{PacketObserver, Transmitter};
