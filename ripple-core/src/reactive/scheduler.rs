//! Effect Scheduler
//!
//! The scheduler collects the effects affected by writes and decides when a
//! flush has to be requested from the host.
//!
//! # Phases
//!
//! ```text
//! Idle --write with subscribers--> Armed --deferred callback--> Flushing
//!   ^                                                              |
//!   +------------------------ queue exhausted ---------------------+
//! ```
//!
//! Exactly one flush is requested per turn: only the `Idle -> Armed`
//! transition asks the host for a callback. Writes made while `Armed` or
//! `Flushing` only append to the queue; a running flush keeps consuming the
//! queue until it is empty, so effects enqueued by other effects run in the
//! same pass.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use super::subscriber::EffectId;

/// Where the scheduler is in its flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPhase {
    /// Nothing queued, no flush requested.
    Idle,

    /// A flush has been requested and will run after the current turn.
    Armed,

    /// A flush is consuming the queue.
    Flushing,
}

/// Pending queue plus phase.
#[derive(Debug)]
pub(crate) struct Scheduler {
    queue: RefCell<VecDeque<EffectId>>,
    phase: Cell<FlushPhase>,

    /// Skip effects that are already waiting in the queue.
    dedupe_pending: bool,
}

impl Scheduler {
    pub(crate) fn new(dedupe_pending: bool) -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            phase: Cell::new(FlushPhase::Idle),
            dedupe_pending,
        }
    }

    /// Append an effect to the pending queue.
    ///
    /// Returns `false` if the effect was already waiting and deduplication is
    /// enabled.
    pub(crate) fn enqueue(&self, id: EffectId) -> bool {
        let mut queue = self.queue.borrow_mut();
        if self.dedupe_pending && queue.contains(&id) {
            return false;
        }
        queue.push_back(id);
        true
    }

    /// Move from `Idle` to `Armed` if there is work queued.
    ///
    /// Returns `true` when the caller must request a deferred flush.
    pub(crate) fn arm(&self) -> bool {
        if self.phase.get() == FlushPhase::Idle && !self.queue.borrow().is_empty() {
            self.phase.set(FlushPhase::Armed);
            true
        } else {
            false
        }
    }

    pub(crate) fn begin_flush(&self) {
        self.phase.set(FlushPhase::Flushing);
    }

    /// Take the next effect off the front of the queue.
    pub(crate) fn next(&self) -> Option<EffectId> {
        self.queue.borrow_mut().pop_front()
    }

    /// Clear whatever is left and return to `Idle`.
    ///
    /// Returns the number of queued effects that were discarded.
    pub(crate) fn finish(&self) -> usize {
        let discarded = {
            let mut queue = self.queue.borrow_mut();
            let len = queue.len();
            queue.clear();
            len
        };
        self.phase.set(FlushPhase::Idle);
        discarded
    }

    /// Drop every queued occurrence of `id`.
    pub(crate) fn remove(&self, id: EffectId) {
        self.queue.borrow_mut().retain(|queued| *queued != id);
    }

    pub(crate) fn phase(&self) -> FlushPhase {
        self.phase.get()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.borrow().len()
    }
}
