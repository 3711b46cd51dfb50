//! Single-slot handoff between the command side and the transmitter.
//!
//! The state byte is the only synchronization point:
//!
//! | State        | Meaning                                         |
//! |--------------|-------------------------------------------------|
//! | `EMPTY`      | No pending update, a producer may claim         |
//! | `CLAIMED`    | A producer is writing an update packet          |
//! | slot index   | Update for that register is ready to swap in    |
//!
//! Producers spin on `EMPTY -> CLAIMED` with acquire ordering, then publish
//! the slot with release ordering. The consumer reads the slot with acquire
//! ordering and stores `EMPTY` with release ordering once it has swapped.

use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = u8::MAX;
const CLAIMED: u8 = u8::MAX - 1;

/// Register slots must stay below this to be distinguishable from the
/// sentinel states.
pub const MAX_SLOTS: usize = CLAIMED as usize;

/// Lock-free single-slot mailbox.
#[derive(Debug)]
pub struct Mailbox {
    state: AtomicU8,
    n_repeat: AtomicU8,
}

/// An update published by a producer and not yet released by the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pending {
    /// Register slot whose update buffer holds the new packet.
    pub slot: u8,
    /// Extra transmissions after the first.
    pub n_repeat: u8,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Creates an empty mailbox.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            n_repeat: AtomicU8::new(0),
        }
    }

    /// Spins until the mailbox is empty and claims it.
    ///
    /// There is no timeout. If the consumer never drains, this never returns.
    pub fn claim(&self) -> Claim<'_> {
        loop {
            if let Some(claim) = self.try_claim() {
                return claim;
            }
            core::hint::spin_loop();
        }
    }

    /// Claims the mailbox if it is empty.
    pub fn try_claim(&self) -> Option<Claim<'_>> {
        self.state
            .compare_exchange(EMPTY, CLAIMED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Claim {
                mailbox: self,
                published: false,
            })
    }

    /// True if nothing is claimed or pending.
    pub fn is_empty(&self) -> bool {
        self.state.load(Ordering::Acquire) == EMPTY
    }

    /// Published update, if any. Consumer side.
    pub fn pending(&self) -> Option<Pending> {
        let state = self.state.load(Ordering::Acquire);
        (state < CLAIMED).then(|| Pending {
            slot: state,
            n_repeat: self.n_repeat.load(Ordering::Relaxed),
        })
    }

    /// Marks the pending update as consumed. Consumer side.
    pub fn release(&self) {
        self.state.store(EMPTY, Ordering::Release);
    }
}

/// Exclusive producer access to the mailbox.
///
/// Dropping a claim without publishing returns the mailbox to empty.
#[derive(Debug)]
pub struct Claim<'a> {
    mailbox: &'a Mailbox,
    published: bool,
}

impl Claim<'_> {
    /// Hands the update for `slot` to the consumer.
    pub fn publish(mut self, slot: u8, n_repeat: u8) {
        debug_assert!(usize::from(slot) < MAX_SLOTS);
        self.mailbox.n_repeat.store(n_repeat, Ordering::Relaxed);
        self.mailbox.state.store(slot, Ordering::Release);
        self.published = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.mailbox.state.store(EMPTY, Ordering::Release);
        }
    }
}
