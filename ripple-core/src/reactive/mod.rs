//! Reactive Primitives
//!
//! This module implements the dependency store: property values, the effects
//! that read them, and the scheduler that batches their re-execution.
//!
//! # Concepts
//!
//! ## State
//!
//! A [`State`] is a container of named properties. Reading a property inside
//! an effect subscribes the effect to it; writing a property queues every
//! subscriber.
//!
//! ## Effects
//!
//! An effect is a side-effecting computation registered through
//! [`Effects::use_effect`]. It runs once at registration and again after any
//! turn in which a property it read was written. Effects are used to
//! synchronize state with the outside world, typically by rendering a
//! template into a [`Mount`](crate::template::Mount).
//!
//! ## Turns and flushes
//!
//! Writes never run effects directly. The first write of a turn asks the
//! store's [`Defer`] host for a callback; that callback flushes the queue once
//! the turn is over. Effects therefore only ever observe the final value of
//! each property written during a turn.
//!
//! # Implementation Notes
//!
//! Dependencies are tracked per run: a read subscribes the running effect at
//! once, and when the run ends the store diffs the keys it read against the
//! previous run to unsubscribe the ones it dropped. A subscriber list never
//! holds the same effect twice; the pending queue may, once per write.
//!
//! Everything here is single-threaded (`Rc` / `RefCell`); handles are `!Send`.

mod key;
mod context;
mod subscriber;
mod defer;
mod scheduler;
mod store;
mod observable;

pub use key::PropertyKey;
pub use subscriber::EffectId;
pub use defer::{Defer, MicrotaskQueue, Task, TokioDefer};
pub use scheduler::FlushPhase;
pub use store::{create_state, create_state_with_config, Effects, State};
pub use observable::Observable;
