//! DCC packet framing and bit packing.
//!
//! A [`Frame`] is a validated payload with its XOR checksum appended. A
//! [`Packet`] is the frame bit-packed the way it goes on the rails:
//!
//! | Section   | Bits                                   |
//! |-----------|----------------------------------------|
//! | Preamble  | 22 one-bits                            |
//! | Each byte | `0` separator, then 8 data bits MSB first |
//!
//! The packet end bit is not stored. It is the first preamble bit of
//! whatever the transmitter sends next, so `n_bits = 22 + 9 * n_bytes`.

use crate::error::PacketError;
use heapless::Vec;

/// Number of one-bits in front of every packet.
pub const PREAMBLE_BITS: u8 = 22;

/// Smallest payload accepted, excluding the checksum.
pub const MIN_PAYLOAD_BYTES: usize = 2;

/// Largest payload accepted, excluding the checksum.
pub const MAX_PAYLOAD_BYTES: usize = 5;

/// Largest frame, payload plus checksum.
pub const MAX_FRAME_BYTES: usize = MAX_PAYLOAD_BYTES + 1;

/// Size of the packed bit buffer in a [`Packet`].
pub const PACKET_BUF_BYTES: usize = 10;

/// Idle packet payload, sent to keep decoders powered with nothing to do.
pub const IDLE_PAYLOAD: [u8; 2] = [0xFF, 0x00];

/// Digital decoder reset payload, used around service-mode instructions.
pub const RESET_PAYLOAD: [u8; 2] = [0x00, 0x00];

/// Payload builder used by the command encoders.
pub type Payload = Vec<u8, MAX_PAYLOAD_BYTES>;

/// Bit length of a packet carrying `frame_bytes` bytes (checksum included).
pub const fn bits_for(frame_bytes: usize) -> u8 {
    PREAMBLE_BITS + 9 * frame_bytes as u8
}

// ============================================================================
// Frame
// ============================================================================

/// A 2 to 5 byte payload followed by its checksum.
///
/// The XOR of every byte in [`Frame::bytes`] is always zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8, MAX_FRAME_BYTES>,
}

impl Frame {
    /// Builds a frame from a payload, appending the XOR checksum.
    pub fn new(payload: &[u8]) -> Result<Self, PacketError> {
        if !(MIN_PAYLOAD_BYTES..=MAX_PAYLOAD_BYTES).contains(&payload.len()) {
            return Err(PacketError::InvalidLength(payload.len()));
        }

        let mut bytes = Vec::new();
        let mut checksum = 0u8;
        for &b in payload {
            checksum ^= b;
            bytes.push(b).map_err(|_| PacketError::Overflow)?;
        }
        bytes.push(checksum).map_err(|_| PacketError::Overflow)?;
        Ok(Self { bytes })
    }

    /// Builds a frame from bytes read off the wire, checksum included.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, PacketError> {
        let Some((_, payload)) = bytes.split_last() else {
            return Err(PacketError::InvalidLength(0));
        };
        let frame = Self::new(payload)?;
        if frame.bytes.as_slice() != bytes {
            return Err(PacketError::Checksum);
        }
        Ok(frame)
    }

    /// All bytes including the trailing checksum.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload bytes without the checksum.
    pub fn data(&self) -> &[u8] {
        self.bytes.split_last().map_or(&[], |(_, data)| data)
    }

    /// The checksum byte.
    pub fn checksum(&self) -> u8 {
        self.bytes.last().copied().unwrap_or(0)
    }

    /// Number of bytes including the checksum.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a frame holds at least three bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bit length of this frame once packed.
    pub fn n_bits(&self) -> u8 {
        bits_for(self.bytes.len())
    }
}

// ============================================================================
// Packet
// ============================================================================

/// A bit-packed DCC packet ready for transmission.
///
/// Bits are stored MSB first: bit `i` lives in `buf[i / 8]` under mask
/// `0x80 >> (i % 8)`. Bits past `n_bits` are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    buf: [u8; PACKET_BUF_BYTES],
    n_bits: u8,
}

impl Packet {
    /// A packet with no bits. The transmitter idles on it.
    pub const EMPTY: Packet = Packet {
        buf: [0; PACKET_BUF_BYTES],
        n_bits: 0,
    };

    /// Packs a frame: preamble, then separator and data bits per byte.
    pub fn encode(frame: &Frame) -> Result<Self, PacketError> {
        let mut writer = BitWriter::new();
        writer.push_ones(PREAMBLE_BITS)?;
        for &b in frame.bytes() {
            writer.push_bits(u32::from(b), 9)?;
        }
        Ok(writer.finish())
    }

    /// Number of meaningful bits.
    pub fn n_bits(&self) -> u8 {
        self.n_bits
    }

    /// True for a packet with no bits.
    pub fn is_empty(&self) -> bool {
        self.n_bits == 0
    }

    /// Reads bit `index`. Out-of-range bits read as zero.
    pub fn bit(&self, index: u8) -> bool {
        if index >= self.n_bits {
            return false;
        }
        self.buf[usize::from(index / 8)] & (0x80 >> (index % 8)) != 0
    }

    /// Raw packed buffer.
    pub fn as_bytes(&self) -> &[u8; PACKET_BUF_BYTES] {
        &self.buf
    }

    /// Iterates over the meaningful bits in transmission order.
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.n_bits).map(move |i| self.bit(i))
    }

    /// Unpacks the bit stream back into a frame.
    ///
    /// Fails on a short preamble, a missing separator, a trailing partial
    /// byte, or a bad checksum.
    pub fn decode(&self) -> Result<Frame, PacketError> {
        let mut reader = BitReader::new(self);

        let preamble = reader.count_ones();
        if preamble < PREAMBLE_BITS {
            return Err(PacketError::Malformed);
        }

        let mut bytes: Vec<u8, MAX_FRAME_BYTES> = Vec::new();
        while !reader.at_end() {
            let separator = reader.read_bits(1).ok_or(PacketError::Malformed)?;
            if separator != 0 {
                return Err(PacketError::Malformed);
            }
            let byte = reader.read_bits(8).ok_or(PacketError::Malformed)?;
            bytes.push(byte as u8).map_err(|_| PacketError::Overflow)?;
        }

        Frame::from_wire(&bytes)
    }
}

// ============================================================================
// Bit writer / reader
// ============================================================================

/// Appends bits MSB first into a packet buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: [u8; PACKET_BUF_BYTES],
    len: u8,
}

impl BitWriter {
    /// Creates an empty writer.
    pub const fn new() -> Self {
        Self {
            buf: [0; PACKET_BUF_BYTES],
            len: 0,
        }
    }

    /// Number of bits written so far.
    pub fn len(&self) -> u8 {
        self.len
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a single bit.
    pub fn push_bit(&mut self, bit: bool) -> Result<(), PacketError> {
        if usize::from(self.len) >= PACKET_BUF_BYTES * 8 {
            return Err(PacketError::Overflow);
        }
        if bit {
            self.buf[usize::from(self.len / 8)] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
        Ok(())
    }

    /// Appends the low `width` bits of `value`, most significant first.
    pub fn push_bits(&mut self, value: u32, width: u8) -> Result<(), PacketError> {
        for shift in (0..width.min(32)).rev() {
            self.push_bit((value >> shift) & 1 == 1)?;
        }
        Ok(())
    }

    /// Appends `count` one-bits.
    pub fn push_ones(&mut self, count: u8) -> Result<(), PacketError> {
        for _ in 0..count {
            self.push_bit(true)?;
        }
        Ok(())
    }

    /// Finishes the packet.
    pub fn finish(self) -> Packet {
        Packet {
            buf: self.buf,
            n_bits: self.len,
        }
    }
}

/// Reads bits back out of a packet in transmission order.
#[derive(Debug)]
pub struct BitReader<'a> {
    packet: &'a Packet,
    pos: u8,
}

impl<'a> BitReader<'a> {
    /// Starts reading at bit 0.
    pub fn new(packet: &'a Packet) -> Self {
        Self { packet, pos: 0 }
    }

    /// True once every meaningful bit has been read.
    pub fn at_end(&self) -> bool {
        self.pos >= self.packet.n_bits()
    }

    /// Reads the next bit.
    pub fn next_bit(&mut self) -> Option<bool> {
        if self.at_end() {
            return None;
        }
        let bit = self.packet.bit(self.pos);
        self.pos += 1;
        Some(bit)
    }

    /// Reads `width` bits MSB first. `None` if the packet runs out.
    pub fn read_bits(&mut self, width: u8) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..width.min(32) {
            value = (value << 1) | u32::from(self.next_bit()?);
        }
        Some(value)
    }

    /// Consumes a run of one-bits and returns its length.
    pub fn count_ones(&mut self) -> u8 {
        let mut count = 0;
        while !self.at_end() && self.packet.bit(self.pos) {
            self.pos += 1;
            count += 1;
        }
        count
    }
}
