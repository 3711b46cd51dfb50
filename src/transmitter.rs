//! Bit-level transmitter driving one track.
//!
//! The transmitter is the consumer side of a [`RegisterList`]. On hardware
//! it runs from the bit-timing interrupt; in tests and on desktop it runs on
//! its own thread. Each call to [`Transmitter::next_bit`] yields the next
//! bit of the DCC stream.
//!
//! At every packet boundary:
//!
//! 1. if the current packet has repeats left, send it again
//! 2. else if an update is pending, swap it in and make it current
//! 3. else move round-robin to the next allocated register
//!
//! Slot 0 is never reached by round-robin; one-shot packets only go out
//! when they are swapped in.

use crate::packet::Packet;
use crate::register::{Consumer, RegisterList};
use crate::traits::SignalOutput;

/// Notified whenever an update becomes the current packet.
///
/// The mailbox is still held during the call, so the producer is blocked
/// until it returns.
pub trait PacketObserver {
    /// Called with the slot, the packet now active and its repeat count.
    fn on_activate(&mut self, slot: u8, packet: &Packet, n_repeat: u8);
}

impl PacketObserver for () {
    fn on_activate(&mut self, _slot: u8, _packet: &Packet, _n_repeat: u8) {}
}

/// Walks the active packets of a register list bit by bit.
#[derive(Debug)]
pub struct Transmitter<'a, const N: usize, O: PacketObserver = ()> {
    consumer: Consumer<'a, N>,
    observer: O,
    current_reg: u8,
    current_bit: u8,
    repeats_left: u8,
}

impl<'a, const N: usize> Transmitter<'a, N, ()> {
    /// Creates a transmitter with no observer.
    pub fn new(consumer: Consumer<'a, N>) -> Self {
        Self::with_observer(consumer, ())
    }
}

impl<'a, const N: usize, O: PacketObserver> Transmitter<'a, N, O> {
    /// Creates a transmitter that reports activations to `observer`.
    pub fn with_observer(consumer: Consumer<'a, N>, observer: O) -> Self {
        Self {
            consumer,
            observer,
            current_reg: 1,
            current_bit: 0,
            repeats_left: 0,
        }
    }

    /// The list being transmitted.
    pub fn registers(&self) -> &'a RegisterList<N> {
        self.consumer.registers()
    }

    /// Current slot and bit position.
    pub fn cursor(&self) -> (u8, u8) {
        (self.current_reg, self.current_bit)
    }

    /// The observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable access to the observer.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Releases the consumer handle and returns the observer.
    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Next bit of the stream. Returns `1` while the current register holds
    /// no packet, which keeps the line in preamble.
    pub fn next_bit(&mut self) -> bool {
        if self.current_bit >= self.consumer.active_len(self.current_reg) {
            self.current_bit = 0;
            self.advance();
            if self.consumer.active_len(self.current_reg) == 0 {
                return true;
            }
        }
        let bit = self.consumer.active_bit(self.current_reg, self.current_bit);
        self.current_bit += 1;
        bit
    }

    /// Sends the next bit to `output`.
    pub fn drive<S: SignalOutput>(&mut self, output: &mut S) {
        let bit = self.next_bit();
        output.write_bit(bit);
    }

    fn advance(&mut self) {
        if self.repeats_left > 0 {
            self.repeats_left -= 1;
            return;
        }

        if let Some(update) = self.consumer.take_update() {
            self.observer
                .on_activate(update.slot(), update.packet(), update.n_repeat());
            self.current_reg = update.slot();
            self.repeats_left = update.n_repeat();
            return;
        }

        let max = self.consumer.max_loaded();
        self.current_reg = if self.current_reg >= max {
            1
        } else {
            self.current_reg + 1
        };
    }
}
