//! Actor Mailbox
//!
//! Unbounded multi-producer/single-consumer queue with an atomic dispatch
//! flag. Producers enqueue from any task; the flag guarantees at most one
//! drain worker is active per mailbox at any instant. The queue itself is
//! tokio's unbounded channel (a lock-free MPSC linked queue); the receiver
//! sits behind a mutex that is only ever touched by the current drainer.
//!
//! The no-strand protocol: a producer enqueues first, then tries to claim
//! the flag. A drainer that observes an empty queue releases the flag and
//! re-checks emptiness; if a racing producer slipped its item in between,
//! the drainer re-claims (or the producer's own claim attempt succeeds).
//! Either way the enqueue happens-before some schedule attempt.

use crate::envelope::Envelope;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

/// MPSC queue feeding one actor
pub(crate) struct Mailbox {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    state: AtomicU8,
}

impl Mailbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            state: AtomicU8::new(IDLE),
        }
    }

    /// Enqueue; never blocks on the consumer.
    pub fn push(&self, env: Envelope) {
        // The receiver lives inside this struct, so the channel can only
        // close when the mailbox itself is dropped.
        let _ = self.tx.send(env);
    }

    /// Claim the drain flag. The winner must eventually call `release`.
    pub fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Return the flag to idle.
    pub fn release(&self) {
        self.state.store(IDLE, Ordering::Release);
    }

    /// Pop one item; only the current drainer may call this.
    pub fn try_pop(&self) -> Option<Envelope> {
        self.rx.lock().try_recv().ok()
    }

    /// Snapshot; may be stale by the time the caller acts on it.
    pub fn is_empty(&self) -> bool {
        self.rx.lock().is_empty()
    }
}
