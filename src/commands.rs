//! Textual command parsing.
//!
//! Commands arrive as the text between `<` and `>`. The first character is
//! the verb and the rest are whitespace-separated fields; the space after
//! the verb is optional, so `<t1 3 60 1>` and `<t 1 3 60 1>` are the same
//! command.
//!
//! # Verbs
//!
//! | Verb | Fields | Command |
//! |------|--------|---------|
//! | `t` | REG CAB SPEED DIR | [`Command::Throttle`] |
//! | `f` | CAB BYTE1 \[BYTE2\] | [`Command::Function`] |
//! | `a` | ADDR SUBADDR ACTIVATE | [`Command::Accessory`] |
//! | `w` | CAB CV VALUE | [`Command::WriteCvByteMain`] |
//! | `b` | CAB CV BIT VALUE | [`Command::WriteCvBitMain`] |
//! | `W` | CV VALUE CB CBSUB | [`Command::WriteCvByte`] |
//! | `B` | CV BIT VALUE CB CBSUB | [`Command::WriteCvBit`] |
//! | `R` | CV CB CBSUB | [`Command::ReadCv`] |
//! | `M` / `P` | REG B1 B2 \[B3\] \[B4\] \[B5\] (hex) | [`Command::RawPacket`] |
//! | `1` / `0` | | [`Command::PowerOn`] / [`Command::PowerOff`] |
//! | `c` | | [`Command::Current`] |
//! | `s` | | [`Command::Status`] |
//! | ` ` | | [`Command::Newline`] |
//!
//! Fields past the ones a verb needs are ignored. A field that is not a
//! number ends the field list, so optional fields after it are absent.
//!
//! # Example
//!
//! ```rust
//! use rs_dcc_station::{Command, Direction};
//!
//! let cmd = Command::parse("t1 3 60 1").unwrap();
//! assert_eq!(
//!     cmd,
//!     Command::Throttle { reg: 1, cab: 3, speed: 60, direction: Direction::Forward }
//! );
//! ```

use core::str::SplitWhitespace;

use heapless::{String, Vec};

use crate::error::ParseError;
use crate::packet::MAX_PAYLOAD_BYTES;
use crate::reply::Callback;
use crate::traits::Direction;

/// Longest command body the framer accepts.
pub const MAX_COMMAND_LENGTH: usize = 64;

/// Which register list a raw packet goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Track {
    /// Operations (main) track.
    Main,
    /// Programming track.
    Prog,
}

impl Track {
    /// Returns the track as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Track::Main => "main",
            Track::Prog => "prog",
        }
    }
}

/// A parsed station command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Set speed and direction of a locomotive in a throttle register.
    Throttle {
        /// Throttle register, 1-based.
        reg: usize,
        /// Locomotive address.
        cab: u16,
        /// Speed step 0-126, negative for emergency stop.
        speed: i16,
        /// Travel direction.
        direction: Direction,
    },
    /// Set a function group.
    Function {
        /// Locomotive address.
        cab: u16,
        /// Group instruction byte, low 8 bits used.
        byte1: i32,
        /// Function states for the F13-F28 expansion, low 8 bits used.
        byte2: Option<i32>,
    },
    /// Switch a basic accessory output.
    Accessory {
        /// Decoder address.
        addr: u16,
        /// Output on the decoder, taken modulo 4.
        subaddr: i32,
        /// Odd to activate, even to deactivate.
        activate: i32,
    },
    /// Write a CV byte on the main track.
    WriteCvByteMain {
        /// Locomotive address.
        cab: u16,
        /// CV number, 1-based.
        cv: u16,
        /// Value to write, low 8 bits used.
        value: i32,
    },
    /// Write a CV bit on the main track.
    WriteCvBitMain {
        /// Locomotive address.
        cab: u16,
        /// CV number, 1-based.
        cv: u16,
        /// Bit position, taken modulo 8.
        bit: i32,
        /// Bit value, taken modulo 2.
        value: i32,
    },
    /// Write and verify a CV byte on the programming track.
    WriteCvByte {
        /// CV number, 1-based.
        cv: u16,
        /// Value to write, low 8 bits used.
        value: i32,
        /// Echoed in the reply.
        callback: Callback,
    },
    /// Write and verify a CV bit on the programming track.
    WriteCvBit {
        /// CV number, 1-based.
        cv: u16,
        /// Bit position, taken modulo 8.
        bit: i32,
        /// Bit value, taken modulo 2.
        value: i32,
        /// Echoed in the reply.
        callback: Callback,
    },
    /// Read a CV on the programming track.
    ReadCv {
        /// CV number, 1-based.
        cv: u16,
        /// Echoed in the reply.
        callback: Callback,
    },
    /// Load raw bytes into a register.
    RawPacket {
        /// Target track.
        track: Track,
        /// External register number.
        reg: usize,
        /// 2 to 5 payload bytes, checksum excluded.
        bytes: Vec<u8, MAX_PAYLOAD_BYTES>,
    },
    /// Power both tracks on.
    PowerOn,
    /// Power both tracks off.
    PowerOff,
    /// Report main track current.
    Current,
    /// Report power, throttles and version.
    Status,
    /// Emit an empty line.
    Newline,
}

impl Command {
    /// Parses a command body (the text between `<` and `>`).
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut chars = line.chars();
        let verb = chars.next().ok_or(ParseError::Empty)?;
        let mut fields = Fields::new(chars.as_str());

        let cmd = match verb {
            't' => Command::Throttle {
                reg: fields.next()?,
                cab: fields.next()?,
                speed: fields.next()?,
                direction: Direction::from_bit(fields.next()?).ok_or(ParseError::OutOfRange)?,
            },
            'f' => Command::Function {
                cab: fields.next()?,
                byte1: fields.next()?,
                byte2: fields.optional(),
            },
            'a' => Command::Accessory {
                addr: fields.next()?,
                subaddr: fields.next()?,
                activate: fields.next()?,
            },
            'w' => Command::WriteCvByteMain {
                cab: fields.next()?,
                cv: fields.next()?,
                value: fields.next()?,
            },
            'b' => Command::WriteCvBitMain {
                cab: fields.next()?,
                cv: fields.next()?,
                bit: fields.next()?,
                value: fields.next()?,
            },
            'W' => Command::WriteCvByte {
                cv: fields.next()?,
                value: fields.next()?,
                callback: fields.callback()?,
            },
            'B' => Command::WriteCvBit {
                cv: fields.next()?,
                bit: fields.next()?,
                value: fields.next()?,
                callback: fields.callback()?,
            },
            'R' => Command::ReadCv {
                cv: fields.next()?,
                callback: fields.callback()?,
            },
            'M' => fields.raw_packet(Track::Main)?,
            'P' => fields.raw_packet(Track::Prog)?,
            '1' => Command::PowerOn,
            '0' => Command::PowerOff,
            'c' => Command::Current,
            's' => Command::Status,
            c if c.is_whitespace() => Command::Newline,
            other => return Err(ParseError::UnknownCommand(other)),
        };
        Ok(cmd)
    }
}

/// Whitespace-separated decimal and hex fields.
struct Fields<'a> {
    tokens: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            tokens: s.split_whitespace(),
        }
    }

    fn next<T: TryFrom<i64>>(&mut self) -> Result<T, ParseError> {
        let token = self.tokens.next().ok_or(ParseError::MissingField)?;
        let n: i64 = token.parse().map_err(|_| ParseError::InvalidNumber)?;
        T::try_from(n).map_err(|_| ParseError::OutOfRange)
    }

    fn optional<T: TryFrom<i64>>(&mut self) -> Option<T> {
        self.next().ok()
    }

    fn hex(&mut self) -> Option<u8> {
        let token = self.tokens.next()?;
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        u8::from_str_radix(digits, 16).ok()
    }

    fn callback(&mut self) -> Result<Callback, ParseError> {
        Ok(Callback::new(self.next()?, self.next()?))
    }

    /// Register then up to five hex bytes. Anything else, including a sixth
    /// byte, is an invalid packet.
    fn raw_packet(&mut self, track: Track) -> Result<Command, ParseError> {
        let reg = self.next().map_err(|_| ParseError::InvalidPacket)?;
        let mut bytes = Vec::new();
        while let Some(byte) = self.hex() {
            bytes.push(byte).map_err(|_| ParseError::InvalidPacket)?;
        }
        if bytes.len() < 2 {
            return Err(ParseError::InvalidPacket);
        }
        Ok(Command::RawPacket { track, reg, bytes })
    }
}

// ============================================================================
// Framing
// ============================================================================

/// Extracts `<...>` command bodies from a character stream.
///
/// Text outside brackets is ignored. A body longer than
/// [`MAX_COMMAND_LENGTH`] is dropped.
#[derive(Debug, Default)]
pub struct CommandFramer {
    buf: String<MAX_COMMAND_LENGTH>,
    in_command: bool,
    overflowed: bool,
}

impl CommandFramer {
    /// Creates an idle framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one character. Returns a complete body on `>`.
    pub fn push(&mut self, c: char) -> Option<String<MAX_COMMAND_LENGTH>> {
        match c {
            '<' => {
                self.buf.clear();
                self.in_command = true;
                self.overflowed = false;
                None
            }
            '>' if self.in_command => {
                self.in_command = false;
                let body = core::mem::take(&mut self.buf);
                if self.overflowed {
                    log::warn!("command longer than {} bytes dropped", MAX_COMMAND_LENGTH);
                    return None;
                }
                Some(body)
            }
            c if self.in_command => {
                if self.buf.push(c).is_err() {
                    self.overflowed = true;
                }
                None
            }
            _ => None,
        }
    }
}
