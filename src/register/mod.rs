//! The packet register engine.
//!
//! A [`RegisterList`] owns a fixed pool of double-buffered [`Register`]s.
//! Commands build a payload and call [`RegisterList::load_packet`], which
//! encodes it into the register's update buffer and publishes it through the
//! [`Mailbox`]. The single [`Consumer`] (the transmitter) swaps the update
//! in at the next packet boundary.
//!
//! Slot 0 is reserved for one-shot packets (functions, accessories,
//! programming). External register numbers map to slots lazily, in the
//! order they are first used, and a mapping is never reassigned.

mod encode;
mod mailbox;
mod service;

pub use mailbox::{Claim, Mailbox, Pending, MAX_SLOTS};
pub use service::{
    BIT_MANIPULATION, BIT_WRITE, BIT_WRITE_FLAG, VERIFY_BIT_ONE, VERIFY_BYTE, WRITE_BYTE,
};

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU8, Ordering};

use crate::ack::AckSampler;
use crate::config::StationConfig;
use crate::error::PacketError;
use crate::packet::{Frame, Packet};
use crate::reply::{PacketTrace, ThrottleReply};
use crate::traits::Direction;

/// Main track register list: 12 throttle registers plus slot 0.
pub type MainRegisters = RegisterList<13>;

/// Programming track register list: 2 registers plus slot 0.
pub type ProgRegisters = RegisterList<3>;

const UNMAPPED: u8 = u8::MAX;

// ============================================================================
// Register
// ============================================================================

/// Two packet buffers and the index of the one being transmitted.
///
/// The inactive buffer is the update buffer. Producers only write it while
/// holding the mailbox claim; the consumer only swaps while it holds the
/// pending update, so the two sides never touch the same buffer.
#[derive(Debug)]
pub struct Register {
    packets: [UnsafeCell<Packet>; 2],
    active: AtomicU8,
}

// SAFETY: buffer access is serialized by the mailbox protocol described on
// the type. The active buffer is only read by the consumer, the update
// buffer is only written by the producer holding the claim.
unsafe impl Sync for Register {}

impl Register {
    const fn new() -> Self {
        Self {
            packets: [UnsafeCell::new(Packet::EMPTY), UnsafeCell::new(Packet::EMPTY)],
            active: AtomicU8::new(0),
        }
    }

    fn active_index(&self) -> usize {
        usize::from(self.active.load(Ordering::Acquire) & 1)
    }

    /// # Safety
    ///
    /// Caller must hold the mailbox claim.
    unsafe fn write_update(&self, packet: Packet) {
        let update = 1 - self.active_index();
        // SAFETY: the consumer never reads the update buffer, and no other
        // producer holds the claim.
        unsafe { *self.packets[update].get() = packet };
    }

    /// # Safety
    ///
    /// Caller must be the unique consumer.
    unsafe fn active(&self) -> &Packet {
        // SAFETY: producers never write the active buffer.
        unsafe { &*self.packets[self.active_index()].get() }
    }

    fn swap(&self) {
        self.active.fetch_xor(1, Ordering::AcqRel);
    }
}

// ============================================================================
// RegisterList
// ============================================================================

/// A fixed pool of `N` registers feeding one track.
///
/// `N - 1` registers are addressable by throttles; slot 0 carries one-shot
/// packets. The list is shared by reference between the command side and
/// one transmitter.
#[derive(Debug)]
pub struct RegisterList<const N: usize> {
    regs: [Register; N],
    reg_map: [AtomicU8; N],
    speed_table: [AtomicI16; N],
    max_loaded: AtomicU8,
    mailbox: Mailbox,
    consumer_taken: AtomicBool,
    pub(crate) ack: AckSampler,
    show_packets: bool,
}

impl<const N: usize> RegisterList<N> {
    const VALID_SIZE: () = assert!(
        N >= 2 && N < MAX_SLOTS,
        "register list needs slot 0 plus at least one register"
    );

    /// Creates an empty list. Only external register 0 is mapped.
    pub fn new(config: &StationConfig) -> Self {
        let () = Self::VALID_SIZE;
        Self {
            regs: core::array::from_fn(|_| Register::new()),
            reg_map: core::array::from_fn(|i| AtomicU8::new(if i == 0 { 0 } else { UNMAPPED })),
            speed_table: core::array::from_fn(|_| AtomicI16::new(0)),
            max_loaded: AtomicU8::new(0),
            mailbox: Mailbox::new(),
            consumer_taken: AtomicBool::new(false),
            ack: AckSampler::new(config.ack),
            show_packets: config.show_packets,
        }
    }

    /// Number of throttle-addressable registers.
    pub const fn max_num_regs(&self) -> usize {
        N - 1
    }

    /// Highest slot allocated so far.
    pub fn max_loaded(&self) -> u8 {
        self.max_loaded.load(Ordering::Acquire)
    }

    /// Slot backing external register `n_reg`, if it has been used.
    pub fn slot_of(&self, n_reg: usize) -> Option<u8> {
        let slot = self.reg_map[n_reg % N].load(Ordering::Acquire);
        (slot != UNMAPPED).then_some(slot)
    }

    /// True if no update is waiting for the transmitter.
    pub fn is_idle(&self) -> bool {
        self.mailbox.is_empty()
    }

    /// Encodes `payload` and queues it for external register `n_reg`.
    ///
    /// Register numbers wrap modulo `N`. Spins until the mailbox is empty,
    /// so consecutive loads are serialized behind the transmitter. The
    /// packet goes out once, then `n_repeat` more times before the
    /// transmitter moves on.
    pub fn load_packet(
        &self,
        n_reg: usize,
        payload: &[u8],
        n_repeat: u8,
        trace: bool,
    ) -> Result<(), PacketError> {
        let n_reg = n_reg % N;
        let frame = Frame::new(payload)?;
        let packet = Packet::encode(&frame)?;

        let claim = self.mailbox.claim();
        let slot = self.slot_for(n_reg);
        // SAFETY: we hold the claim.
        unsafe { self.regs[usize::from(slot)].write_update(packet) };
        claim.publish(slot, n_repeat);

        if trace && self.show_packets {
            log::info!(target: "dcc::packets", "{}", PacketTrace::new(n_reg, &frame, n_repeat));
        }
        Ok(())
    }

    /// Resolves or allocates the slot for `n_reg`. Caller holds the claim.
    fn slot_for(&self, n_reg: usize) -> u8 {
        let mapped = self.reg_map[n_reg].load(Ordering::Relaxed);
        if mapped != UNMAPPED {
            return mapped;
        }
        // every external register in 1..N gets a distinct slot in 1..N
        let slot = self.max_loaded.load(Ordering::Relaxed) + 1;
        self.reg_map[n_reg].store(slot, Ordering::Release);
        self.max_loaded.store(slot, Ordering::Release);
        log::debug!("register {} mapped to slot {}", n_reg, slot);
        slot
    }

    /// Last commanded signed speed of register `reg` (negative = reverse).
    pub fn speed(&self, reg: usize) -> i16 {
        self.speed_table[reg % N].load(Ordering::Relaxed)
    }

    fn record_speed(&self, reg: usize, speed: u8, direction: Direction) {
        let speed = i16::from(speed);
        let signed = match direction {
            Direction::Forward => speed,
            Direction::Reverse => -speed,
        };
        self.speed_table[reg % N].store(signed, Ordering::Relaxed);
    }

    /// Every throttle register with a non-zero recorded speed.
    pub fn throttles(&self) -> impl Iterator<Item = ThrottleReply> + '_ {
        (1..N).filter_map(move |reg| {
            let speed = self.speed(reg);
            (speed != 0).then(|| ThrottleReply {
                reg,
                speed: u8::try_from(speed.unsigned_abs()).unwrap_or(u8::MAX),
                direction: if speed > 0 {
                    Direction::Forward
                } else {
                    Direction::Reverse
                },
            })
        })
    }

    /// Takes the consumer handle. `None` if it is already taken.
    pub fn consumer(&self) -> Option<Consumer<'_, N>> {
        self.consumer_taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Consumer { list: self })
    }
}

// ============================================================================
// Consumer
// ============================================================================

/// The unique transmitter-side handle of a [`RegisterList`].
///
/// Dropping it allows a new consumer to be taken.
#[derive(Debug)]
pub struct Consumer<'a, const N: usize> {
    list: &'a RegisterList<N>,
}

impl<'a, const N: usize> Consumer<'a, N> {
    /// The list this consumer drains.
    pub fn registers(&self) -> &'a RegisterList<N> {
        self.list
    }

    /// Highest slot allocated so far.
    pub fn max_loaded(&self) -> u8 {
        self.list.max_loaded()
    }

    /// Swaps in the pending update, if any.
    ///
    /// The mailbox stays full until the returned guard drops, so producers
    /// stay blocked while the caller inspects the new packet.
    pub fn take_update(&mut self) -> Option<TakenUpdate<'_>> {
        let pending = self.list.mailbox.pending()?;
        let register = &self.list.regs[usize::from(pending.slot)];
        register.swap();
        // SAFETY: we are the unique consumer.
        let packet = unsafe { *register.active() };
        Some(TakenUpdate {
            mailbox: &self.list.mailbox,
            slot: pending.slot,
            n_repeat: pending.n_repeat,
            packet,
        })
    }

    /// Active packet of `slot`.
    pub fn active_packet(&self, slot: u8) -> Packet {
        // SAFETY: we are the unique consumer.
        unsafe { *self.list.regs[usize::from(slot) % N].active() }
    }

    /// Bit length of the active packet of `slot`.
    pub fn active_len(&self, slot: u8) -> u8 {
        // SAFETY: we are the unique consumer.
        unsafe { self.list.regs[usize::from(slot) % N].active().n_bits() }
    }

    /// Bit `index` of the active packet of `slot`.
    pub fn active_bit(&self, slot: u8, index: u8) -> bool {
        // SAFETY: we are the unique consumer.
        unsafe { self.list.regs[usize::from(slot) % N].active().bit(index) }
    }
}

impl<const N: usize> Drop for Consumer<'_, N> {
    fn drop(&mut self) {
        self.list.consumer_taken.store(false, Ordering::Release);
    }
}

/// An update that has been swapped in but not yet released.
///
/// The mailbox is released when this guard drops.
#[derive(Debug)]
pub struct TakenUpdate<'a> {
    mailbox: &'a Mailbox,
    slot: u8,
    n_repeat: u8,
    packet: Packet,
}

impl TakenUpdate<'_> {
    /// Slot that was swapped.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Repeat count published with the update.
    pub fn n_repeat(&self) -> u8 {
        self.n_repeat
    }

    /// The packet that is now active.
    pub fn packet(&self) -> &Packet {
        &self.packet
    }
}

impl Drop for TakenUpdate<'_> {
    fn drop(&mut self) {
        self.mailbox.release();
    }
}
