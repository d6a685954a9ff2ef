//! Effect identity and bookkeeping.
//!
//! An effect is any computation registered with a store. The store keeps one
//! [`EffectRecord`] per effect: the closure, the keys it read on its last run,
//! and a little accounting.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use super::key::PropertyKey;

/// Unique identifier for an effect.
///
/// Identity belongs to the registration, not the closure: registering the
/// same function twice yields two distinct effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    ///
    /// Uses an atomic counter so IDs stay unique across stores and threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// A registered effect.
pub(crate) struct EffectRecord {
    id: EffectId,

    /// The effect body.
    run: Rc<dyn Fn()>,

    /// Keys read during the most recent completed run.
    tracked: RefCell<IndexSet<PropertyKey>>,

    /// Number of times the body has been entered.
    run_count: Cell<usize>,

    disposed: Cell<bool>,
}

impl EffectRecord {
    pub(crate) fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            id: EffectId::new(),
            run: Rc::new(run),
            tracked: RefCell::new(IndexSet::new()),
            run_count: Cell::new(0),
            disposed: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    /// A handle to the body that can be called without borrowing the record.
    pub(crate) fn body(&self) -> Rc<dyn Fn()> {
        Rc::clone(&self.run)
    }

    pub(crate) fn record_run(&self) {
        self.run_count.set(self.run_count.get() + 1);
    }

    pub(crate) fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Replace the tracked key set, returning the previous one.
    pub(crate) fn replace_tracked(&self, keys: IndexSet<PropertyKey>) -> IndexSet<PropertyKey> {
        self.tracked.replace(keys)
    }

    pub(crate) fn tracked(&self) -> IndexSet<PropertyKey> {
        self.tracked.borrow().clone()
    }

    pub(crate) fn dispose(&self) {
        self.disposed.set(true);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl fmt::Debug for EffectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRecord")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("tracked", &self.tracked.borrow().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
