//! Dependency Store
//!
//! The store is the central coordinator: it owns the property values, the
//! dependency map from keys to effects, the effect registry and the pending
//! queue.
//!
//! # How It Works
//!
//! 1. [`Effects::use_effect`] registers an effect and runs it once, right away,
//!    inside a tracking frame.
//!
//! 2. Every [`State::get`] made while the effect runs subscribes the effect
//!    to the key at once. When the effect returns, the store compares the
//!    keys it read against the previous run and unsubscribes it from keys it
//!    no longer reads.
//!
//! 3. [`State::set`] stores the value and queues every subscriber of the key,
//!    the running effect included. The first write of a turn that queues
//!    anything asks the [`Defer`] host for a flush; later writes in the same
//!    turn only queue.
//!
//! 4. The flush runs queued effects front to back, re-tracking each one.
//!    Effects queued by effects during the flush run in the same pass.
//!
//! An effect subscribed to several keys written in one turn is queued once
//! per write unless [`StoreConfig::dedupe_pending`] is set. An effect that
//! writes a key it reads queues itself again unless
//! [`StoreConfig::ignore_own_writes`] is set; such an effect must stop writing
//! at some point or the flush never ends.
//!
//! # Failure
//!
//! Effect bodies are not isolated. A panic at registration unwinds to the
//! `use_effect` caller; a panic during a flush unwinds out of the deferred
//! callback. Either way the effect stays registered: keys it read before
//! panicking stay subscribed and nothing it subscribed to earlier is dropped.
//! During a flush the rest of the queue is discarded and the scheduler
//! returns to idle, so the next write can arm a fresh flush.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

use crate::config::StoreConfig;

use super::context::{FrameGuard, TrackingStack};
use super::defer::Defer;
use super::key::PropertyKey;
use super::scheduler::{FlushPhase, Scheduler};
use super::subscriber::{EffectId, EffectRecord};

/// Shared state behind [`State`] and [`Effects`].
struct StoreInner<V> {
    /// Current property values.
    values: RefCell<IndexMap<PropertyKey, V>>,

    /// Key -> effects that read it on their last run.
    ///
    /// Entries are created on first read and never removed.
    dependencies: RefCell<IndexMap<PropertyKey, Vec<EffectId>>>,

    effects: RefCell<HashMap<EffectId, Rc<EffectRecord>>>,

    tracking: TrackingStack,

    scheduler: Scheduler,

    /// Writes by the running effect skip that effect.
    ignore_own_writes: bool,

    defer: Rc<dyn Defer>,
}

/// Create a store with the default configuration.
///
/// Returns the state container and the effect registrar that share it.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{create_state, MicrotaskQueue};
///
/// let queue = MicrotaskQueue::new();
/// let (state, effects) = create_state::<i32>(queue.clone());
///
/// state.set("count", 1);
///
/// let observer = state.clone();
/// effects.use_effect(move || {
///     let doubled = observer.get("count").unwrap_or_default() * 2;
///     observer.set("doubled", doubled);
/// });
/// assert_eq!(state.get("doubled"), Some(2));
///
/// queue.turn(|| state.set("count", 5));
/// assert_eq!(state.get("doubled"), Some(10));
/// ```
pub fn create_state<V>(defer: impl Defer + 'static) -> (State<V>, Effects<V>)
where
    V: Clone + 'static,
{
    create_state_with_config(defer, StoreConfig::default())
}

/// Create a store with an explicit configuration.
pub fn create_state_with_config<V>(
    defer: impl Defer + 'static,
    config: StoreConfig,
) -> (State<V>, Effects<V>)
where
    V: Clone + 'static,
{
    let inner = Rc::new(StoreInner {
        values: RefCell::new(IndexMap::new()),
        dependencies: RefCell::new(IndexMap::new()),
        effects: RefCell::new(HashMap::new()),
        tracking: TrackingStack::new(),
        scheduler: Scheduler::new(config.dedupe_pending),
        ignore_own_writes: config.ignore_own_writes,
        defer: Rc::new(defer),
    });

    (
        State {
            inner: Rc::clone(&inner),
        },
        Effects { inner },
    )
}

impl<V> StoreInner<V>
where
    V: Clone + 'static,
{
    fn read(&self, key: &PropertyKey) -> Option<V> {
        let reader = self
            .tracking
            .track(key)
            .filter(|effect| self.effects.borrow().contains_key(effect));

        {
            let mut dependencies = self.dependencies.borrow_mut();
            let subscribers = dependencies.entry(key.clone()).or_default();

            if let Some(effect) = reader {
                if !subscribers.contains(&effect) {
                    subscribers.push(effect);
                    tracing::trace!(effect = %effect, key = %key, "subscribed");
                }
            }
        }

        self.values.borrow().get(key).cloned()
    }

    fn write(self: &Rc<Self>, key: PropertyKey, value: V) {
        self.values.borrow_mut().insert(key.clone(), value);

        let subscribers = self.dependencies.borrow().get(&key).cloned();

        if let Some(subscribers) = subscribers {
            let running = self.tracking.current();

            for id in subscribers {
                if self.ignore_own_writes && Some(id) == running {
                    continue;
                }
                self.scheduler.enqueue(id);
            }
        }

        if self.scheduler.arm() {
            tracing::trace!(key = %key, "flush armed");

            let store = Rc::downgrade(self);
            self.defer.defer(Box::new(move || flush_if_alive(&store)));
        }
    }

    fn run_effect(&self, record: &EffectRecord) {
        let run = EffectRun {
            store: self,
            record,
            frame: Some(self.tracking.enter(record.id())),
        };

        record.record_run();
        let body = record.body();
        body();

        run.complete();
    }

    fn flush(&self) {
        self.scheduler.begin_flush();
        tracing::debug!(pending = self.scheduler.len(), "flush started");

        let guard = FlushGuard {
            scheduler: &self.scheduler,
            completed: false,
        };

        let mut ran = 0usize;
        while let Some(id) = self.scheduler.next() {
            let record = self.effects.borrow().get(&id).cloned();

            if let Some(record) = record {
                if record.is_disposed() {
                    continue;
                }
                tracing::trace!(effect = %id, "running effect");
                self.run_effect(&record);
                ran += 1;
            }
        }

        guard.complete();
        tracing::debug!(effects_run = ran, "flush finished");
    }

    fn dispose(&self, id: EffectId) -> bool {
        let record = self.effects.borrow_mut().remove(&id);

        match record {
            Some(record) => {
                record.dispose();

                for subscribers in self.dependencies.borrow_mut().values_mut() {
                    subscribers.retain(|subscriber| *subscriber != id);
                }
                self.scheduler.remove(id);

                tracing::debug!(effect = %id, "effect disposed");
                true
            }
            None => false,
        }
    }
}

impl<V> StoreInner<V> {
    /// Unsubscribe the effect from keys its last run did not read.
    fn reconcile(&self, record: &EffectRecord, reads: IndexSet<PropertyKey>) {
        let id = record.id();
        let previous = record.replace_tracked(reads.clone());
        let mut dependencies = self.dependencies.borrow_mut();

        for stale in previous.difference(&reads) {
            if let Some(subscribers) = dependencies.get_mut(stale) {
                subscribers.retain(|subscriber| *subscriber != id);
            }
            tracing::trace!(effect = %id, key = %stale, "unsubscribed");
        }
    }

    /// Settle a run that unwound: add its reads, drop nothing.
    fn keep_partial(&self, record: &EffectRecord, reads: IndexSet<PropertyKey>) {
        let mut tracked = record.tracked();
        tracked.extend(reads);
        record.replace_tracked(tracked);

        tracing::debug!(effect = %record.id(), "effect panicked, subscriptions kept");
    }
}

/// An effect body in progress.
///
/// Completing it prunes stale subscriptions. Dropping it without completing
/// (the body panicked) keeps every subscription, old and new.
struct EffectRun<'a, V> {
    store: &'a StoreInner<V>,
    record: &'a EffectRecord,
    frame: Option<FrameGuard<'a>>,
}

impl<V> EffectRun<'_, V> {
    fn complete(mut self) {
        if let Some(frame) = self.frame.take() {
            let reads = frame.finish();
            if !self.record.is_disposed() {
                self.store.reconcile(self.record, reads);
            }
        }
    }
}

impl<V> Drop for EffectRun<'_, V> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            let reads = frame.finish();
            if !self.record.is_disposed() {
                self.store.keep_partial(self.record, reads);
            }
        }
    }
}

fn flush_if_alive<V>(store: &Weak<StoreInner<V>>)
where
    V: Clone + 'static,
{
    if let Some(store) = store.upgrade() {
        store.flush();
    }
}

/// Resets the scheduler if a flush unwinds.
struct FlushGuard<'a> {
    scheduler: &'a Scheduler,
    completed: bool,
}

impl FlushGuard<'_> {
    fn complete(mut self) {
        self.completed = true;
        self.scheduler.finish();
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            let discarded = self.scheduler.finish();
            tracing::warn!(discarded, "flush interrupted by a panicking effect");
        }
    }
}

// ----------------------------------------------------------------------------
// State
// ----------------------------------------------------------------------------

/// The mutable state container of a store.
///
/// Clones share the same store.
pub struct State<V> {
    inner: Rc<StoreInner<V>>,
}

impl<V> State<V>
where
    V: Clone + 'static,
{
    /// Seed initial values without notifying anyone.
    pub fn with_values<K, I>(self, values: I) -> Self
    where
        K: Into<PropertyKey>,
        I: IntoIterator<Item = (K, V)>,
    {
        {
            let mut stored = self.inner.values.borrow_mut();
            for (key, value) in values {
                stored.insert(key.into(), value);
            }
        }
        self
    }

    /// Read a property.
    ///
    /// Creates the key's dependency entry if it does not exist yet and, if an
    /// effect is running, records the key as one of its dependencies.
    /// Returns `None` for a key that was never written.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Option<V> {
        self.inner.read(&key.into())
    }

    /// Read a property without recording a dependency.
    pub fn get_untracked(&self, key: impl Into<PropertyKey>) -> Option<V> {
        self.inner.values.borrow().get(&key.into()).cloned()
    }

    /// Write a property and queue the effects that read it.
    ///
    /// The effects do not run here; they run in the flush the host performs
    /// after the current turn.
    pub fn set(&self, key: impl Into<PropertyKey>, value: V) {
        self.inner.write(key.into(), value);
    }

    /// Replace a property's value using its current value.
    ///
    /// Returns `false`, writing nothing, if the property was never set.
    pub fn update<F>(&self, key: impl Into<PropertyKey>, f: F) -> bool
    where
        F: FnOnce(&V) -> V,
    {
        let key = key.into();
        let next = {
            let values = self.inner.values.borrow();
            values.get(&key).map(f)
        };

        match next {
            Some(value) => {
                self.inner.write(key, value);
                true
            }
            None => false,
        }
    }

    /// Check if a property has a value.
    pub fn contains(&self, key: impl Into<PropertyKey>) -> bool {
        self.inner.values.borrow().contains_key(&key.into())
    }

    /// Keys that hold a value, in first-write order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.inner.values.borrow().keys().cloned().collect()
    }

    /// Check if the key has a dependency entry (it has been read at least once).
    pub fn has_entry(&self, key: impl Into<PropertyKey>) -> bool {
        self.inner.dependencies.borrow().contains_key(&key.into())
    }

    /// Effects currently subscribed to a key, in subscription order.
    pub fn subscribers(&self, key: impl Into<PropertyKey>) -> Vec<EffectId> {
        self.inner
            .dependencies
            .borrow()
            .get(&key.into())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of effects subscribed to a key.
    pub fn subscriber_count(&self, key: impl Into<PropertyKey>) -> usize {
        self.inner
            .dependencies
            .borrow()
            .get(&key.into())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// The effect registrar for this store.
    pub fn effects(&self) -> Effects<V> {
        Effects {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> Clone for State<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for State<V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("values", &*self.inner.values.borrow())
            .field("dependencies", &*self.inner.dependencies.borrow())
            .field("phase", &self.inner.scheduler.phase())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Effects
// ----------------------------------------------------------------------------

/// Registers and manages the effects of a store.
pub struct Effects<V> {
    inner: Rc<StoreInner<V>>,
}

impl<V> Effects<V>
where
    V: Clone + 'static,
{
    /// Register an effect and run it once, synchronously.
    ///
    /// That first run happens before this call returns, regardless of
    /// whether a flush is armed, and establishes the effect's dependencies.
    /// If it panics the effect stays registered with whatever it read before
    /// the panic.
    ///
    /// Calling `use_effect` from inside another effect is allowed: the inner
    /// effect is tracked in its own frame and the outer effect keeps its own
    /// dependencies. Note that the outer effect registers a new inner effect
    /// on every run.
    pub fn use_effect<F>(&self, effect: F) -> EffectId
    where
        F: Fn() + 'static,
    {
        let record = Rc::new(EffectRecord::new(effect));
        let id = record.id();

        self.inner
            .effects
            .borrow_mut()
            .insert(id, Rc::clone(&record));

        tracing::trace!(effect = %id, "effect registered");
        self.inner.run_effect(&record);

        id
    }

    /// Stop an effect from running again.
    ///
    /// Returns `false` if the effect is unknown or already disposed.
    pub fn dispose(&self, id: EffectId) -> bool {
        self.inner.dispose(id)
    }

    /// Number of times an effect has run, including its registration run.
    pub fn run_count(&self, id: EffectId) -> Option<usize> {
        self.inner
            .effects
            .borrow()
            .get(&id)
            .map(|record| record.run_count())
    }

    /// Keys the effect read on its last run.
    pub fn dependencies(&self, id: EffectId) -> Option<Vec<PropertyKey>> {
        self.inner
            .effects
            .borrow()
            .get(&id)
            .map(|record| record.tracked().into_iter().collect())
    }

    /// Number of live effects.
    pub fn len(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    /// Check if the store has no live effects.
    pub fn is_empty(&self) -> bool {
        self.inner.effects.borrow().is_empty()
    }

    /// Check if an effect of this store is running right now.
    pub fn is_tracking(&self) -> bool {
        self.inner.tracking.is_active()
    }

    /// The scheduler's current phase.
    pub fn phase(&self) -> FlushPhase {
        self.inner.scheduler.phase()
    }

    /// Number of effects waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.inner.scheduler.len()
    }

    /// The state container of this store.
    pub fn state(&self) -> State<V> {
        State {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> Clone for Effects<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for Effects<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effects")
            .field("effects", &self.inner.effects.borrow().len())
            .field("pending", &self.inner.scheduler.len())
            .field("phase", &self.inner.scheduler.phase())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
