//! Error types for packet encoding, command parsing, and command execution.
//!
//! None of these errors are fatal. The station degrades every failure to a
//! silent no-op, a `<mInvalid Packet>` reply, or a `-1` verification result.

use thiserror::Error;

/// Failures while framing or bit-packing a DCC packet.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Payload length outside the supported 2 to 5 data bytes.
    #[error("payload must be 2 to 5 bytes, got {0}")]
    InvalidLength(usize),

    /// More bits were written than the packet buffer holds.
    #[error("packet buffer overflow")]
    Overflow,

    /// Bit stream does not follow preamble / separator framing.
    #[error("malformed bit stream")]
    Malformed,

    /// XOR of all frame bytes is not zero.
    #[error("checksum mismatch")]
    Checksum,
}

/// Failures while parsing a textual command.
///
/// Commands that fail to parse are dropped without a reply, except for
/// [`ParseError::InvalidPacket`] which answers `<mInvalid Packet>`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Empty command string.
    #[error("empty command")]
    Empty,

    /// Verb character is not a known command.
    #[error("unknown command '{0}'")]
    UnknownCommand(char),

    /// Fewer fields than the verb requires.
    #[error("missing field")]
    MissingField,

    /// Field is not a valid number.
    #[error("invalid number")]
    InvalidNumber,

    /// Field is a number but does not fit the target type.
    #[error("value out of range")]
    OutOfRange,

    /// Raw packet command with a bad register or byte list.
    #[error("invalid packet")]
    InvalidPacket,
}

/// Failures while executing a parsed command against a register list.
///
/// Parse failures never reach this type; [`CommandStation::process`]
/// handles [`ParseError`] before anything runs.
///
/// [`CommandStation::process`]: crate::station::CommandStation::process
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Payload could not be encoded.
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// Throttle register outside `1..=max`.
    #[error("register {0} out of range")]
    RegisterOutOfRange(usize),

    /// Raw packet with fewer than 2 or more than 5 bytes.
    #[error("invalid packet")]
    InvalidPacket,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_error_messages() {
        assert_eq!(
            PacketError::InvalidLength(7).to_string(),
            "payload must be 2 to 5 bytes, got 7"
        );
        assert_eq!(PacketError::Checksum.to_string(), "checksum mismatch");
    }

    #[test]
    fn parse_error_messages() {
        assert_eq!(
            ParseError::UnknownCommand('x').to_string(),
            "unknown command 'x'"
        );
        assert_eq!(ParseError::InvalidPacket.to_string(), "invalid packet");
    }

    #[test]
    fn command_error_messages() {
        assert_eq!(
            CommandError::RegisterOutOfRange(13).to_string(),
            "register 13 out of range"
        );
        assert_eq!(CommandError::InvalidPacket.to_string(), "invalid packet");
    }

    #[test]
    fn command_error_wraps_packet_error() {
        let err: CommandError = PacketError::Overflow.into();
        assert_eq!(err.to_string(), "packet buffer overflow");
    }
}
