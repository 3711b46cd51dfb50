//! Operations-mode command encoders.
//!
//! Each encoder builds a payload (address, instruction, data) and hands it
//! to [`RegisterList::load_packet`]. Throttles live in their own register
//! and repeat forever; everything else is a one-shot burst in slot 0.

use super::RegisterList;
use crate::error::{CommandError, PacketError};
use crate::packet::{Payload, MAX_PAYLOAD_BYTES, MIN_PAYLOAD_BYTES};
use crate::reply::ThrottleReply;
use crate::traits::Direction;

/// Highest short (one-byte) locomotive address.
pub const MAX_SHORT_ADDRESS: u16 = 127;

/// Highest 128-step speed value.
pub const MAX_SPEED: i16 = 126;

/// Repeat count for one-shot operations-mode packets.
pub const ONE_SHOT_REPEATS: u8 = 4;

const LONG_ADDRESS_FLAG: u8 = 0xC0;
const SPEED_128_INSTRUCTION: u8 = 0x3F;
const EMERGENCY_STOP: u8 = 0x01;
const FUNCTION_GROUP_MASK_SET: u8 = 0x80;
const FUNCTION_GROUP_MASK_CLEAR: u8 = 0xBF;
const FEATURE_EXPANSION_SET: u8 = 0xDE;
const FEATURE_EXPANSION_CLEAR: u8 = 0xDF;
const CV_WRITE_BYTE_MAIN: u8 = 0xEC;
const CV_BIT_MANIPULATION_MAIN: u8 = 0xE8;
const CV_BIT_WRITE: u8 = 0xF0;

pub(crate) fn push(payload: &mut Payload, byte: u8) -> Result<(), PacketError> {
    payload
        .push(byte)
        .map_err(|_| PacketError::InvalidLength(MAX_PAYLOAD_BYTES + 1))
}

/// Payload starting with the short or long form of `cab`.
pub(crate) fn addressed(cab: u16) -> Result<Payload, PacketError> {
    let mut payload = Payload::new();
    if cab > MAX_SHORT_ADDRESS {
        push(&mut payload, (cab >> 8) as u8 | LONG_ADDRESS_FLAG)?;
    }
    push(&mut payload, (cab & 0xFF) as u8)?;
    Ok(payload)
}

/// Low byte of a decimal field, the way a byte-wide instruction field
/// receives it.
pub(crate) fn low_byte(n: i32) -> u8 {
    (n & 0xFF) as u8
}

/// `n` reduced into `0..m`.
pub(crate) fn reduce(n: i32, m: i32) -> u8 {
    n.rem_euclid(m) as u8
}

/// Splits a 1-based CV number into the two address bits carried in the
/// instruction byte and the low address byte.
pub(crate) fn cv_address(cv: u16) -> (u8, u8) {
    let addr = cv.wrapping_sub(1);
    (((addr >> 8) & 0x03) as u8, (addr & 0xFF) as u8)
}

impl<const N: usize> RegisterList<N> {
    /// Sets speed and direction of `cab` in throttle register `reg`.
    ///
    /// Speed is clamped to 126. A negative speed sends an emergency stop and
    /// is recorded as 0. The register keeps repeating the packet until it is
    /// overwritten.
    pub fn set_throttle(
        &self,
        reg: usize,
        cab: u16,
        speed: i16,
        direction: Direction,
    ) -> Result<ThrottleReply, CommandError> {
        if reg < 1 || reg > self.max_num_regs() {
            return Err(CommandError::RegisterOutOfRange(reg));
        }

        let mut payload = addressed(cab)?;
        push(&mut payload, SPEED_128_INSTRUCTION)?;
        let reported = if speed >= 0 {
            let speed = speed.min(MAX_SPEED) as u8;
            push(
                &mut payload,
                speed + u8::from(speed > 0) + direction.bit() * 128,
            )?;
            speed
        } else {
            push(&mut payload, EMERGENCY_STOP)?;
            0
        };

        self.load_packet(reg, &payload, 0, true)?;
        self.record_speed(reg, reported, direction);

        Ok(ThrottleReply {
            reg,
            speed: reported,
            direction,
        })
    }

    /// Sends a function group instruction to `cab`.
    ///
    /// With one byte this is an F0-F12 group (`10xxxxxx`). With two bytes
    /// the first selects the F13-F20 or F21-F28 expansion and the second
    /// carries the function states. Both bytes keep only their low 8 bits.
    pub fn set_function(
        &self,
        cab: u16,
        byte1: i32,
        byte2: Option<i32>,
    ) -> Result<(), CommandError> {
        let byte1 = low_byte(byte1);
        let mut payload = addressed(cab)?;
        match byte2 {
            None => push(
                &mut payload,
                (byte1 | FUNCTION_GROUP_MASK_SET) & FUNCTION_GROUP_MASK_CLEAR,
            )?,
            Some(byte2) => {
                push(
                    &mut payload,
                    (byte1 | FEATURE_EXPANSION_SET) & FEATURE_EXPANSION_CLEAR,
                )?;
                push(&mut payload, low_byte(byte2))?;
            }
        }
        self.load_packet(0, &payload, ONE_SHOT_REPEATS, true)?;
        Ok(())
    }

    /// Activates or deactivates one output of a basic accessory decoder.
    ///
    /// `addr` is the 9-bit decoder address, `subaddr` selects one of its
    /// four outputs (modulo 4). An odd `activate` switches the output on.
    pub fn set_accessory(&self, addr: u16, subaddr: i32, activate: i32) -> Result<(), CommandError> {
        let b0 = (addr % 64) as u8 + 128;
        let b1 =
            ((((addr / 64) % 8) as u8) << 4 | reduce(subaddr, 4) << 1 | reduce(activate, 2)) ^ 0xF8;
        self.load_packet(0, &[b0, b1], ONE_SHOT_REPEATS, true)?;
        Ok(())
    }

    /// Loads a raw payload verbatim into register `reg`.
    pub fn write_text_packet(&self, reg: usize, bytes: &[u8]) -> Result<(), CommandError> {
        if !(MIN_PAYLOAD_BYTES..=MAX_PAYLOAD_BYTES).contains(&bytes.len()) {
            return Err(CommandError::InvalidPacket);
        }
        self.load_packet(reg, bytes, 0, true)?;
        Ok(())
    }

    /// Writes a CV byte on the main track. No acknowledgment is possible.
    pub fn write_cv_byte_main(&self, cab: u16, cv: u16, value: i32) -> Result<(), CommandError> {
        let (hi, lo) = cv_address(cv);
        let mut payload = addressed(cab)?;
        push(&mut payload, CV_WRITE_BYTE_MAIN + hi)?;
        push(&mut payload, lo)?;
        push(&mut payload, low_byte(value))?;
        self.load_packet(0, &payload, ONE_SHOT_REPEATS, false)?;
        Ok(())
    }

    /// Writes a single CV bit on the main track. `bit` is taken modulo 8
    /// and `value` modulo 2.
    pub fn write_cv_bit_main(
        &self,
        cab: u16,
        cv: u16,
        bit: i32,
        value: i32,
    ) -> Result<(), CommandError> {
        let (hi, lo) = cv_address(cv);
        let mut payload = addressed(cab)?;
        push(&mut payload, CV_BIT_MANIPULATION_MAIN + hi)?;
        push(&mut payload, lo)?;
        push(&mut payload, CV_BIT_WRITE + reduce(value, 2) * 8 + reduce(bit, 8))?;
        self.load_packet(0, &payload, ONE_SHOT_REPEATS, false)?;
        Ok(())
    }
}
