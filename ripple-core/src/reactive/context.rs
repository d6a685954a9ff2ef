//! Tracking Context
//!
//! The tracking context records which effect is currently running so that
//! reads can be attributed to it.
//!
//! # Implementation
//!
//! Each store keeps a stack of frames. Running an effect pushes a frame for
//! it; every tracked read appends its key to the top frame, and the first read
//! of a key in a frame is reported back so the store can subscribe the effect
//! on the spot. When the effect returns, the frame is popped and its read set
//! handed back to the store, which drops subscriptions the run no longer used.
//!
//! Because this is a stack and not a single slot, an effect registered from
//! inside another effect's body gets its own frame. The outer effect resumes
//! collecting into its own frame once the inner one is popped.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::key::PropertyKey;
use super::subscriber::EffectId;

/// An entry in the tracking stack.
#[derive(Debug)]
struct Frame {
    /// The effect whose body is executing.
    effect: EffectId,
    /// Keys read so far, in first-read order.
    reads: IndexSet<PropertyKey>,
}

/// Stack of running effects for one store.
#[derive(Debug, Default)]
pub(crate) struct TrackingStack {
    frames: RefCell<Vec<Frame>>,
}

impl TrackingStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Push a frame for `effect`.
    ///
    /// The frame is popped when the returned guard is finished or dropped,
    /// so an effect that panics does not leave a stale frame behind.
    pub(crate) fn enter(&self, effect: EffectId) -> FrameGuard<'_> {
        self.frames.borrow_mut().push(Frame {
            effect,
            reads: IndexSet::new(),
        });

        FrameGuard {
            stack: self,
            effect,
            finished: false,
        }
    }

    /// Check if an effect is currently running.
    pub(crate) fn is_active(&self) -> bool {
        !self.frames.borrow().is_empty()
    }

    /// The effect on top of the stack, if any.
    pub(crate) fn current(&self) -> Option<EffectId> {
        self.frames.borrow().last().map(|frame| frame.effect)
    }

    /// Record a read of `key` against the running effect.
    ///
    /// Returns the effect when this is its first read of `key` in the current
    /// frame, `None` for repeated reads or when no effect is running.
    pub(crate) fn track(&self, key: &PropertyKey) -> Option<EffectId> {
        let mut frames = self.frames.borrow_mut();
        let frame = frames.last_mut()?;

        if frame.reads.contains(key) {
            return None;
        }
        frame.reads.insert(key.clone());
        Some(frame.effect)
    }

    fn pop(&self, effect: EffectId) -> Option<IndexSet<PropertyKey>> {
        let popped = self.frames.borrow_mut().pop();

        popped.map(|frame| {
            debug_assert_eq!(
                frame.effect, effect,
                "tracking frame mismatch: expected {:?}, got {:?}",
                effect, frame.effect
            );
            frame.reads
        })
    }
}

/// Guard that pops its frame when finished or dropped.
pub(crate) struct FrameGuard<'a> {
    stack: &'a TrackingStack,
    effect: EffectId,
    finished: bool,
}

impl FrameGuard<'_> {
    /// Pop the frame and return the keys read while it was on top.
    pub(crate) fn finish(mut self) -> IndexSet<PropertyKey> {
        self.finished = true;
        self.stack.pop(self.effect).unwrap_or_default()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.stack.pop(self.effect);
        }
    }
}
