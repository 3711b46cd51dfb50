//! Service-mode (programming track) read, write and verify.
//!
//! Every instruction is sent in direct mode and confirmed by watching for a
//! decoder acknowledgment pulse on the programming track current:
//!
//! 1. average a baseline while the track is quiet
//! 2. send 3 resets, the instruction 5 times, then 1 reset
//! 3. smooth the current rise over the sample window
//!
//! Loading the trailing reset blocks until the instruction packet has been
//! swapped in, so sampling always starts with the instruction on the rails.

use super::encode::{cv_address, low_byte, reduce};
use super::RegisterList;
use crate::error::{CommandError, PacketError};
use crate::packet::{IDLE_PAYLOAD, RESET_PAYLOAD};
use crate::reply::{Callback, CvBitReply, CvReply};
use crate::traits::CurrentSense;

/// Direct-mode verify byte instruction, plus the two CV high bits.
pub const VERIFY_BYTE: u8 = 0x74;
/// Direct-mode write byte instruction, plus the two CV high bits.
pub const WRITE_BYTE: u8 = 0x7C;
/// Direct-mode bit manipulation instruction, plus the two CV high bits.
pub const BIT_MANIPULATION: u8 = 0x78;
/// Bit manipulation data byte: verify that bit `i` is 1.
pub const VERIFY_BIT_ONE: u8 = 0xE8;
/// Bit manipulation data byte: write, plus `value * 8 + bit`.
pub const BIT_WRITE: u8 = 0xF0;
/// Flag separating a bit write from a bit verify.
pub const BIT_WRITE_FLAG: u8 = 0x10;

const RESET_REPEATS: u8 = 3;
const VERIFY_REPEATS: u8 = 5;
const WRITE_REPEATS: u8 = 4;
const IDLE_REPEATS: u8 = 10;

impl<const N: usize> RegisterList<N> {
    /// Reads a CV bit by bit, then verifies the assembled byte.
    ///
    /// The reply value is `None` (printed as `-1`) if the final verify is
    /// not acknowledged, which is also what an empty track produces.
    pub fn read_cv<S: CurrentSense>(
        &self,
        sense: &mut S,
        cv: u16,
        callback: Callback,
    ) -> Result<CvReply, CommandError> {
        let (hi, lo) = cv_address(cv);

        let mut value = 0u8;
        for bit in 0..8 {
            if self.acknowledged(sense, &[BIT_MANIPULATION + hi, lo, VERIFY_BIT_ONE + bit])? {
                value |= 1 << bit;
            }
        }

        let verified = self.acknowledged(sense, &[VERIFY_BYTE + hi, lo, value])?;
        log::debug!("read cv {}: {} (verified: {})", cv, value, verified);

        Ok(CvReply {
            callback,
            cv,
            value: verified.then_some(value),
        })
    }

    /// Writes a CV byte and verifies it.
    ///
    /// Only the low 8 bits of `value` are written, and the reply reports
    /// that byte.
    pub fn write_cv_byte<S: CurrentSense>(
        &self,
        sense: &mut S,
        cv: u16,
        value: i32,
        callback: Callback,
    ) -> Result<CvReply, CommandError> {
        let (hi, lo) = cv_address(cv);
        let value = low_byte(value);

        self.send_write(&[WRITE_BYTE + hi, lo, value])?;
        let verified = self.acknowledged(sense, &[VERIFY_BYTE + hi, lo, value])?;
        log::debug!("write cv {} = {} (verified: {})", cv, value, verified);

        Ok(CvReply {
            callback,
            cv,
            value: verified.then_some(value),
        })
    }

    /// Writes a single CV bit and verifies it.
    ///
    /// `bit` is taken modulo 8 and `value` modulo 2.
    pub fn write_cv_bit<S: CurrentSense>(
        &self,
        sense: &mut S,
        cv: u16,
        bit: i32,
        value: i32,
        callback: Callback,
    ) -> Result<CvBitReply, CommandError> {
        let (hi, lo) = cv_address(cv);
        let bit = reduce(bit, 8);
        let value = reduce(value, 2);

        let write = [BIT_MANIPULATION + hi, lo, BIT_WRITE + value * 8 + bit];
        self.send_write(&write)?;
        let verify = [write[0], write[1], write[2] & !BIT_WRITE_FLAG];
        let verified = self.acknowledged(sense, &verify)?;
        log::debug!(
            "write cv {} bit {} = {} (verified: {})",
            cv,
            bit,
            value,
            verified
        );

        Ok(CvBitReply {
            callback,
            cv,
            bit,
            value: verified.then_some(value),
        })
    }

    /// Reset, the write instruction, reset, then idles for the decoder to
    /// finish the write.
    fn send_write(&self, instruction: &[u8]) -> Result<(), PacketError> {
        self.load_packet(0, &RESET_PAYLOAD, 1, false)?;
        self.load_packet(0, instruction, WRITE_REPEATS, false)?;
        self.load_packet(0, &RESET_PAYLOAD, 1, false)?;
        self.load_packet(0, &IDLE_PAYLOAD, IDLE_REPEATS, false)
    }

    /// Sends one verify instruction and reports whether it was acknowledged.
    fn acknowledged<S: CurrentSense>(
        &self,
        sense: &mut S,
        instruction: &[u8],
    ) -> Result<bool, PacketError> {
        let base = self.ack.baseline(sense);
        self.load_packet(0, &RESET_PAYLOAD, RESET_REPEATS, false)?;
        self.load_packet(0, instruction, VERIFY_REPEATS, false)?;
        self.load_packet(0, &RESET_PAYLOAD, 1, false)?;
        Ok(self.ack.detect(sense, base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::register::ProgRegisters;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::vec::Vec;

    struct Quiet;

    impl CurrentSense for Quiet {
        fn read_raw(&mut self) -> u16 {
            5
        }
    }

    /// Drains updates on a background thread and records what was sent.
    fn with_drain<R>(regs: &ProgRegisters, op: impl FnOnce() -> R) -> (R, Vec<(Vec<u8>, u8)>) {
        let stop = AtomicBool::new(false);
        let log = Mutex::new(Vec::new());
        let result = std::thread::scope(|s| {
            s.spawn(|| {
                let mut consumer = regs.consumer().unwrap();
                loop {
                    if let Some(update) = consumer.take_update() {
                        let frame = update.packet().decode().unwrap();
                        log.lock()
                            .unwrap()
                            .push((frame.data().to_vec(), update.n_repeat()));
                    } else if stop.load(Ordering::Acquire) {
                        break;
                    }
                    std::hint::spin_loop();
                }
            });
            let result = op();
            while !regs.is_idle() {
                std::hint::spin_loop();
            }
            stop.store(true, Ordering::Release);
            result
        });
        (result, log.into_inner().unwrap())
    }

    // ========================================================================
    // Packet sequences
    // ========================================================================

    #[test]
    fn read_sequence_per_bit() {
        let regs = ProgRegisters::new(&StationConfig::default());
        let (reply, sent) = with_drain(&regs, || {
            regs.read_cv(&mut Quiet, 29, Callback::new(1, 2)).unwrap()
        });

        assert_eq!(reply.value, None);
        // 8 bit verifies and one byte verify, 3 packets each
        assert_eq!(sent.len(), 27);
        assert_eq!(sent[0], (std::vec![0x00, 0x00], 3));
        assert_eq!(sent[1], (std::vec![0x78, 28, 0xE8], 5));
        assert_eq!(sent[2], (std::vec![0x00, 0x00], 1));
        assert_eq!(sent[22].0, std::vec![0x78, 28, 0xEF]);
        assert_eq!(sent[25], (std::vec![0x74, 28, 0x00], 5));
    }

    #[test]
    fn write_byte_sequence() {
        let regs = ProgRegisters::new(&StationConfig::default());
        let (reply, sent) = with_drain(&regs, || {
            regs.write_cv_byte(&mut Quiet, 300, 0x42, Callback::new(0, 0))
                .unwrap()
        });

        assert_eq!(reply.value, None);
        assert_eq!(
            sent,
            std::vec![
                (std::vec![0x00, 0x00], 1),
                (std::vec![0x7D, 43, 0x42], 4),
                (std::vec![0x00, 0x00], 1),
                (std::vec![0xFF, 0x00], 10),
                (std::vec![0x00, 0x00], 3),
                (std::vec![0x75, 43, 0x42], 5),
                (std::vec![0x00, 0x00], 1),
            ]
        );
    }

    #[test]
    fn write_bit_sequence() {
        let regs = ProgRegisters::new(&StationConfig::default());
        let (reply, sent) = with_drain(&regs, || {
            regs.write_cv_bit(&mut Quiet, 1, 13, 3, Callback::new(0, 0))
                .unwrap()
        });

        // bit 13 % 8 = 5, value 3 % 2 = 1
        assert_eq!(reply.bit, 5);
        assert_eq!(reply.value, None);
        assert_eq!(sent[1], (std::vec![0x78, 0x00, 0xFD], 4));
        assert_eq!(sent[5], (std::vec![0x78, 0x00, 0xED], 5));
    }
}
