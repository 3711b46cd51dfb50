//! Typed replies and their wire format.
//!
//! Every reply renders through [`core::fmt::Display`] exactly as it is sent
//! back to the controlling program, angle brackets included.
//!
//! | Reply | Format |
//! |-------|--------|
//! | [`ThrottleReply`] | `<T REG SPEED DIR>` |
//! | [`CvReply`] | `<rCB\|SUB\|CV VALUE>` |
//! | [`CvBitReply`] | `<rCB\|SUB\|CV BIT VALUE>` |
//! | [`PowerReply`] | `<p0>`, `<p1>`, `<p2>`, `<p3>` |
//! | [`CurrentReply`] | `<aCURRENT>` |
//! | [`VersionReply`] | `<iNAME vVERSION>` |
//! | [`InvalidPacketReply`] | `<mInvalid Packet>` |
//! | [`PacketTrace`] | `<*REG: B1 ... CSUM / REPEAT>` |

use core::fmt;

use crate::packet::Frame;
use crate::traits::Direction;

/// Opaque caller tags echoed back in programming replies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Callback {
    /// Caller-chosen callback number.
    pub num: i32,
    /// Caller-chosen callback sub-number.
    pub sub: i32,
}

impl Callback {
    /// Creates a callback pair.
    pub const fn new(num: i32, sub: i32) -> Self {
        Self { num, sub }
    }
}

/// Verified value, or `-1` when the decoder did not acknowledge.
struct Verified(Option<u8>);

impl fmt::Display for Verified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{}", value),
            None => f.write_str("-1"),
        }
    }
}

/// Confirmation of a throttle command, also listed by the status command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleReply {
    /// External register number.
    pub reg: usize,
    /// Speed step actually sent (0 for an emergency stop).
    pub speed: u8,
    /// Direction sent.
    pub direction: Direction,
}

impl fmt::Display for ThrottleReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<T{} {} {}>", self.reg, self.speed, self.direction.bit())
    }
}

/// Result of a byte read or byte write on the programming track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CvReply {
    /// Caller tags.
    pub callback: Callback,
    /// CV number as requested.
    pub cv: u16,
    /// Verified value; `None` if not acknowledged.
    pub value: Option<u8>,
}

impl fmt::Display for CvReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<r{}|{}|{} {}>",
            self.callback.num,
            self.callback.sub,
            self.cv,
            Verified(self.value)
        )
    }
}

/// Result of a bit write on the programming track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CvBitReply {
    /// Caller tags.
    pub callback: Callback,
    /// CV number as requested.
    pub cv: u16,
    /// Bit position after the modulo.
    pub bit: u8,
    /// Verified bit value; `None` if not acknowledged.
    pub value: Option<u8>,
}

impl fmt::Display for CvBitReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<r{}|{}|{} {} {}>",
            self.callback.num,
            self.callback.sub,
            self.cv,
            self.bit,
            Verified(self.value)
        )
    }
}

/// Track power state changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerReply {
    /// Power switched off by command.
    Off,
    /// Power switched on by command.
    On,
    /// Main track overload cut power.
    MainOverload,
    /// Programming track overload cut power.
    ProgOverload,
}

impl PowerReply {
    /// Reply for a commanded power state.
    pub const fn from_enabled(on: bool) -> Self {
        if on {
            PowerReply::On
        } else {
            PowerReply::Off
        }
    }

    const fn code(&self) -> u8 {
        match self {
            PowerReply::Off => 0,
            PowerReply::On => 1,
            PowerReply::MainOverload => 2,
            PowerReply::ProgOverload => 3,
        }
    }
}

impl fmt::Display for PowerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<p{}>", self.code())
    }
}

/// Smoothed main track current.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentReply(pub i32);

impl fmt::Display for CurrentReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<a{}>", self.0)
    }
}

/// Station identification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionReply<'a> {
    /// Station name.
    pub name: &'a str,
    /// Version string.
    pub version: &'a str,
}

impl fmt::Display for VersionReply<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<i{} v{}>", self.name, self.version)
    }
}

/// Raw packet rejected for its byte count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidPacketReply;

impl fmt::Display for InvalidPacketReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<mInvalid Packet>")
    }
}

/// Diagnostic trace of a loaded packet. Hex bytes are upper case without
/// padding.
#[derive(Clone, Copy, Debug)]
pub struct PacketTrace<'a> {
    reg: usize,
    frame: &'a Frame,
    n_repeat: u8,
}

impl<'a> PacketTrace<'a> {
    /// Trace for `frame` loaded into external register `reg`.
    pub fn new(reg: usize, frame: &'a Frame, n_repeat: u8) -> Self {
        Self {
            reg,
            frame,
            n_repeat,
        }
    }
}

impl fmt::Display for PacketTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<*{}:", self.reg)?;
        for byte in self.frame.bytes() {
            write!(f, " {:X}", byte)?;
        }
        write!(f, " / {}>", self.n_repeat)
    }
}
