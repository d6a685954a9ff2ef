//! Deferred Callbacks
//!
//! A store never runs effects from inside a write. It asks its host to run a
//! flush "after the current turn", through the [`Defer`] trait.
//!
//! Two hosts are provided:
//!
//! - [`MicrotaskQueue`]: a deterministic FIFO drained explicitly, either by
//!   [`MicrotaskQueue::turn`] or [`MicrotaskQueue::run_until_idle`]. This is
//!   what tests and synchronous drivers use.
//! - [`TokioDefer`]: spawns the callback onto the current `LocalSet`, so the
//!   flush runs once the writing task yields.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A callback to run after the current turn.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Host primitive that runs a callback once the current turn is over.
pub trait Defer {
    /// Schedule `task` to run after the current synchronous turn.
    fn defer(&self, task: Task);
}

impl<D> Defer for Rc<D>
where
    D: Defer + ?Sized,
{
    fn defer(&self, task: Task) {
        (**self).defer(task)
    }
}

/// A FIFO of deferred callbacks, drained by the caller.
///
/// Clones share the same queue, so a store can hold one clone while the
/// driver holds another.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `body` as one turn, then drain every deferred callback.
    ///
    /// Writes made inside `body` are therefore observed by effects only after
    /// `body` has returned.
    pub fn turn<R>(&self, body: impl FnOnce() -> R) -> R {
        let result = body();
        self.run_until_idle();
        result
    }

    /// Run queued callbacks until the queue is empty.
    ///
    /// Callbacks deferred while draining run in the same call. Returns the
    /// number of callbacks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;

        loop {
            // Release the borrow before running so the task may defer more work
            let next = self.tasks.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }

        ran
    }

    /// Number of callbacks waiting.
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Check if no callbacks are waiting.
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl Defer for MicrotaskQueue {
    fn defer(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Defers callbacks onto the current tokio `LocalSet`.
///
/// # Panics
///
/// [`Defer::defer`] panics when called outside a `LocalSet`, like
/// `tokio::task::spawn_local` itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDefer;

impl Defer for TokioDefer {
    fn defer(&self, task: Task) {
        tokio::task::spawn_local(async move {
            task();
        });
    }
}
