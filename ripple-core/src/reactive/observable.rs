//! Observable Cells
//!
//! An [`Observable`] is a typed handle to one key of a store. It exposes the
//! key's value through explicit `read` / `write` calls and its subscribers as
//! a plain list, so callers never need to spell the key again.
//!
//! Reads and writes go through the store exactly like [`State::get`] and
//! [`State::set`]: a `read` inside an effect subscribes the effect, a `write`
//! queues the subscribers for the next flush.

use std::fmt::{self, Debug};

use super::key::PropertyKey;
use super::store::State;
use super::subscriber::EffectId;

/// A typed handle to one property of a store.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{create_state, MicrotaskQueue};
///
/// let queue = MicrotaskQueue::new();
/// let (state, _effects) = create_state::<u32>(queue);
///
/// let count = state.observable("count");
/// count.write(5);
/// assert_eq!(count.read(), Some(5));
/// ```
pub struct Observable<V> {
    state: State<V>,
    key: PropertyKey,
}

impl<V> Observable<V>
where
    V: Clone + 'static,
{
    /// The key this cell reads and writes.
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }

    /// Get the current value, subscribing the running effect if there is one.
    pub fn read(&self) -> Option<V> {
        self.state.get(&self.key)
    }

    /// Get the current value without subscribing anything.
    pub fn read_untracked(&self) -> Option<V> {
        self.state.get_untracked(&self.key)
    }

    /// Set a new value and queue the subscribers.
    pub fn write(&self, value: V) {
        self.state.set(&self.key, value);
    }

    /// Update the value using a function.
    ///
    /// Returns `false` if the cell has never been written.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&V) -> V,
    {
        self.state.update(&self.key, f)
    }

    /// Effects currently subscribed to this cell.
    pub fn subscribers(&self) -> Vec<EffectId> {
        self.state.subscribers(&self.key)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.subscriber_count(&self.key)
    }
}

impl<V> State<V>
where
    V: Clone + 'static,
{
    /// A typed handle to `key`.
    pub fn observable(&self, key: impl Into<PropertyKey>) -> Observable<V> {
        Observable {
            state: self.clone(),
            key: key.into(),
        }
    }
}

impl<V> Clone for Observable<V> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            key: self.key.clone(),
        }
    }
}

impl<V> Debug for Observable<V>
where
    V: Clone + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("key", &self.key)
            .field("value", &self.read_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
