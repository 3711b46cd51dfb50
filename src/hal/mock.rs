//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the hardware traits plus a
//! simulated service-mode decoder, so the whole programming protocol can be
//! exercised on desktop.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockCurrentSense`] | [`CurrentSense`] | Baseline, noise and ack pulses |
//! | [`MockDecoder`] | [`PacketObserver`] | Decoder holding CVs on the programming track |
//! | [`MockTrackPower`] | [`TrackPower`] | Tracks power switching |
//! | [`MockSignal`] | [`SignalOutput`] | Captures the bit stream |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//!
//! The decoder and the current sense share an [`AckLine`]: when the decoder
//! sees a matching verify instruction it arms a pulse, and the next reads of
//! the current sense carry it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_dcc_station::hal::{AckLine, MockCurrentSense, MockDecoder};
//! use rs_dcc_station::traits::CurrentSense;
//!
//! let line = Arc::new(AckLine::new());
//! let mut sense = MockCurrentSense::new(20).with_ack_line(line.clone());
//! let decoder = MockDecoder::new(line).with_cv(1, 3);
//!
//! assert_eq!(decoder.cv(1), 3);
//! assert_eq!(sense.read_raw(), 20);
//! ```
//!
//! [`CurrentSense`]: crate::traits::CurrentSense
//! [`PacketObserver`]: crate::transmitter::PacketObserver
//! [`TrackPower`]: crate::traits::TrackPower
//! [`SignalOutput`]: crate::traits::SignalOutput
//! [`Clock`]: crate::traits::Clock

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use crate::packet::{Frame, Packet};
use crate::register::BIT_WRITE_FLAG;
use crate::traits::{Clock, CurrentSense, SignalOutput, TrackPower};
use crate::transmitter::PacketObserver;

/// Reads an ack pulse lasts by default (about 6 ms of ADC sampling).
pub const DEFAULT_ACK_READS: u32 = 150;

/// Rise above baseline of a default ack pulse, in raw units.
pub const DEFAULT_ACK_LEVEL: u16 = 60;

/// Number of CVs a decoder holds.
pub const DECODER_CVS: usize = 1024;

// ============================================================================
// Current sensing
// ============================================================================

/// Pulse shared between a simulated decoder and a current sense.
///
/// The pulse is measured in reads rather than time, so tests do not depend
/// on thread timing.
#[derive(Debug, Default)]
pub struct AckLine {
    remaining: AtomicU32,
    level: AtomicU16,
}

impl AckLine {
    /// Creates a quiet line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the line by `level` for the next `reads` reads.
    pub fn pulse(&self, reads: u32, level: u16) {
        self.level.store(level, Ordering::Relaxed);
        self.remaining.store(reads, Ordering::Release);
    }

    /// True while a pulse has reads left.
    pub fn is_active(&self) -> bool {
        self.remaining.load(Ordering::Acquire) > 0
    }

    fn take(&self) -> u16 {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|_| self.level.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

/// Mock current sense for testing.
///
/// Returns a fixed baseline, optionally with a deterministic sawtooth noise
/// of `±noise`, plus whatever pulse the attached [`AckLine`] carries.
///
/// # Example
///
/// ```rust
/// use rs_dcc_station::hal::MockCurrentSense;
/// use rs_dcc_station::traits::CurrentSense;
///
/// let mut sense = MockCurrentSense::new(100).with_noise(2);
/// let reads: Vec<u16> = (0..5).map(|_| sense.read_raw()).collect();
/// assert_eq!(reads, [98, 99, 100, 101, 102]);
/// assert_eq!(sense.reads, 5);
/// ```
#[derive(Debug, Default)]
pub struct MockCurrentSense {
    /// Quiescent reading.
    pub base: u16,
    /// Sawtooth noise amplitude.
    pub noise: u16,
    /// Number of reads taken so far.
    pub reads: usize,
    line: Option<Arc<AckLine>>,
}

impl MockCurrentSense {
    /// Creates a sense that always reads `base`.
    pub fn new(base: u16) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Adds sawtooth noise of `±noise`.
    pub fn with_noise(mut self, noise: u16) -> Self {
        self.noise = noise;
        self
    }

    /// Adds pulses from `line` to every read.
    pub fn with_ack_line(mut self, line: Arc<AckLine>) -> Self {
        self.line = Some(line);
        self
    }
}

impl CurrentSense for MockCurrentSense {
    fn read_raw(&mut self) -> u16 {
        let offset = if self.noise == 0 {
            0
        } else {
            let span = 2 * usize::from(self.noise) + 1;
            (self.reads % span) as i32 - i32::from(self.noise)
        };
        self.reads += 1;

        let quiet = (i32::from(self.base) + offset).clamp(0, 1023) as u16;
        let pulse = self.line.as_ref().map_or(0, |line| line.take());
        quiet.saturating_add(pulse)
    }
}

// ============================================================================
// Service-mode decoder
// ============================================================================

/// Simulated decoder sitting on the programming track.
///
/// Attach it to the programming [`Transmitter`] as its observer. It
/// executes direct-mode instructions as they are swapped in:
///
/// - verify byte / verify bit: arms an ack pulse if the CV matches
/// - write byte / write bit: updates the CV without acknowledging
///
/// [`Transmitter`]: crate::transmitter::Transmitter
#[derive(Debug)]
pub struct MockDecoder {
    cvs: [u8; DECODER_CVS],
    line: Arc<AckLine>,
    /// Length of each ack pulse in reads.
    pub ack_reads: u32,
    /// Height of each ack pulse.
    pub ack_level: u16,
    /// Number of acks given.
    pub acks: usize,
    /// Every decodable packet activated, in order.
    pub history: Vec<Frame>,
    record_history: bool,
}

impl MockDecoder {
    /// Creates a decoder with every CV zero.
    pub fn new(line: Arc<AckLine>) -> Self {
        Self {
            cvs: [0; DECODER_CVS],
            line,
            ack_reads: DEFAULT_ACK_READS,
            ack_level: DEFAULT_ACK_LEVEL,
            acks: 0,
            history: Vec::new(),
            record_history: true,
        }
    }

    /// Sets CV `cv` (1-based) before the decoder goes on the track.
    pub fn with_cv(mut self, cv: u16, value: u8) -> Self {
        self.set_cv(cv, value);
        self
    }

    /// Enables or disables the packet history. Long-running simulations
    /// should turn it off.
    pub fn with_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    /// Value of CV `cv` (1-based).
    pub fn cv(&self, cv: u16) -> u8 {
        self.cvs[Self::index(cv)]
    }

    /// Sets CV `cv` (1-based).
    pub fn set_cv(&mut self, cv: u16, value: u8) {
        self.cvs[Self::index(cv)] = value;
    }

    fn index(cv: u16) -> usize {
        usize::from(cv.wrapping_sub(1)) % DECODER_CVS
    }

    fn acknowledge(&mut self) {
        self.acks += 1;
        self.line.pulse(self.ack_reads, self.ack_level);
    }

    fn execute(&mut self, instruction: u8, lo: u8, data: u8) {
        if instruction & 0xF0 != 0x70 {
            return;
        }
        let cv = usize::from(instruction & 0x03) << 8 | usize::from(lo);

        match (instruction >> 2) & 0x03 {
            // verify byte
            0b01 => {
                if self.cvs[cv] == data {
                    self.acknowledge();
                }
            }
            // write byte
            0b11 => self.cvs[cv] = data,
            // bit manipulation
            0b10 => {
                if data & 0xE0 != 0xE0 {
                    return;
                }
                let bit = data & 0x07;
                let value = (data >> 3) & 0x01;
                if data & BIT_WRITE_FLAG != 0 {
                    if value == 1 {
                        self.cvs[cv] |= 1 << bit;
                    } else {
                        self.cvs[cv] &= !(1 << bit);
                    }
                } else if (self.cvs[cv] >> bit) & 0x01 == value {
                    self.acknowledge();
                }
            }
            _ => {}
        }
    }
}

impl PacketObserver for MockDecoder {
    fn on_activate(&mut self, _slot: u8, packet: &Packet, _n_repeat: u8) {
        let Ok(frame) = packet.decode() else {
            return;
        };
        if let &[instruction, lo, data] = frame.data() {
            self.execute(instruction, lo, data);
        }
        if self.record_history {
            self.history.push(frame);
        }
    }
}

// ============================================================================
// Power, signal and time
// ============================================================================

/// Mock track power for testing.
///
/// # Example
///
/// ```rust
/// use rs_dcc_station::hal::MockTrackPower;
/// use rs_dcc_station::traits::TrackPower;
///
/// let mut power = MockTrackPower::new();
/// power.set_enabled(true).unwrap();
/// power.power_off().unwrap();
/// assert!(!power.enabled);
/// assert_eq!(power.switch_count, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockTrackPower {
    /// Current power state.
    pub enabled: bool,
    /// Number of `set_enabled` calls.
    pub switch_count: usize,
    /// Makes every switch fail.
    pub fail: bool,
}

impl MockTrackPower {
    /// Creates mock power, switched off.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackPower for MockTrackPower {
    type Error = ();

    fn set_enabled(&mut self, on: bool) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.enabled = on;
        self.switch_count += 1;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Captures every bit written to the rails.
#[derive(Debug, Default)]
pub struct MockSignal {
    /// Bits in the order they were written.
    pub bits: Vec<bool>,
}

impl MockSignal {
    /// Creates an empty capture.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalOutput for MockSignal {
    fn write_bit(&mut self, bit: bool) {
        self.bits.push(bit);
    }
}

/// Mock clock for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use rs_dcc_station::hal::MockClock;
/// use rs_dcc_station::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(1000);
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given milliseconds.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(payload: &[u8]) -> Packet {
        Packet::encode(&Frame::new(payload).unwrap()).unwrap()
    }

    // =========================================================================
    // MockCurrentSense Tests
    // =========================================================================

    #[test]
    fn sense_without_noise_is_flat() {
        let mut sense = MockCurrentSense::new(42);
        assert!((0..10).all(|_| sense.read_raw() == 42));
    }

    #[test]
    fn sense_noise_stays_in_band() {
        let mut sense = MockCurrentSense::new(50).with_noise(10);
        for _ in 0..100 {
            let read = sense.read_raw();
            assert!((40..=60).contains(&read));
        }
    }

    #[test]
    fn sense_noise_clamps_at_zero() {
        let mut sense = MockCurrentSense::new(1).with_noise(5);
        assert_eq!(sense.read_raw(), 0);
    }

    #[test]
    fn sense_carries_pulse() {
        let line = Arc::new(AckLine::new());
        let mut sense = MockCurrentSense::new(10).with_ack_line(line.clone());

        line.pulse(3, 60);
        assert!(line.is_active());
        let reads: Vec<u16> = (0..5).map(|_| sense.read_raw()).collect();
        assert_eq!(reads, [70, 70, 70, 10, 10]);
        assert!(!line.is_active());
    }

    // =========================================================================
    // MockDecoder Tests
    // =========================================================================

    #[test]
    fn decoder_acks_matching_verify_byte() {
        let line = Arc::new(AckLine::new());
        let mut decoder = MockDecoder::new(line.clone()).with_cv(29, 6);

        decoder.on_activate(0, &packet(&[0x74, 28, 5]), 5);
        assert!(!line.is_active());

        decoder.on_activate(0, &packet(&[0x74, 28, 6]), 5);
        assert!(line.is_active());
        assert_eq!(decoder.acks, 1);
    }

    #[test]
    fn decoder_writes_byte() {
        let mut decoder = MockDecoder::new(Arc::new(AckLine::new()));
        // cv 300 -> address 299 = 0x12B
        decoder.on_activate(0, &packet(&[0x7D, 0x2B, 0x42]), 4);
        assert_eq!(decoder.cv(300), 0x42);
        assert_eq!(decoder.acks, 0);
    }

    #[test]
    fn decoder_bit_verify_and_write() {
        let line = Arc::new(AckLine::new());
        let mut decoder = MockDecoder::new(line.clone()).with_cv(1, 0b0000_0100);

        // verify bit 2 is 1
        decoder.on_activate(0, &packet(&[0x78, 0x00, 0xEA]), 5);
        assert_eq!(decoder.acks, 1);
        // verify bit 3 is 1
        decoder.on_activate(0, &packet(&[0x78, 0x00, 0xEB]), 5);
        assert_eq!(decoder.acks, 1);

        // write bit 7 = 1, then bit 2 = 0
        decoder.on_activate(0, &packet(&[0x78, 0x00, 0xFF]), 4);
        decoder.on_activate(0, &packet(&[0x78, 0x00, 0xF2]), 4);
        assert_eq!(decoder.cv(1), 0b1000_0000);
    }

    #[test]
    fn decoder_ignores_other_packets() {
        let mut decoder = MockDecoder::new(Arc::new(AckLine::new()));
        decoder.on_activate(0, &packet(&[0x00, 0x00]), 3);
        decoder.on_activate(0, &packet(&[0xFF, 0x00]), 10);
        decoder.on_activate(0, &packet(&[0x03, 0xEC, 0x00, 0x07]), 4);
        decoder.on_activate(0, &Packet::EMPTY, 0);

        assert_eq!(decoder.acks, 0);
        assert_eq!(decoder.cv(1), 0);
        assert_eq!(decoder.history.len(), 3);
    }

    #[test]
    fn decoder_history_can_be_disabled() {
        let mut decoder = MockDecoder::new(Arc::new(AckLine::new())).with_history(false);
        decoder.on_activate(0, &packet(&[0x00, 0x00]), 3);
        assert!(decoder.history.is_empty());
    }

    // =========================================================================
    // Power / Signal / Clock Tests
    // =========================================================================

    #[test]
    fn track_power_failure() {
        let mut power = MockTrackPower {
            fail: true,
            ..MockTrackPower::new()
        };
        assert_eq!(power.set_enabled(true), Err(()));
        assert!(!power.is_enabled());
        assert_eq!(power.switch_count, 0);
    }

    #[test]
    fn signal_captures_bits() {
        let mut signal = MockSignal::new();
        signal.write_bit(true);
        signal.write_bit(false);
        assert_eq!(signal.bits, [true, false]);
    }

    #[test]
    fn clock_advances() {
        let mut clock = MockClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance(10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
    }
}
