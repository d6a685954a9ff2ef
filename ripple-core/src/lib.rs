//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive templating
//! toolkit. It implements:
//!
//! - A dependency-tracking store (properties, effects, batched flushes)
//! - A template cache that compiles markup once and renders by cloning
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: state container, effects, tracking context and scheduler
//! - `template`: DOM model, markup parsing, template compilation and caching
//! - `config`: serde-backed options for stores and caches
//! - `error`: error types
//!
//! A write to a tracked property queues the effects that read it. After the
//! current turn the store flushes the queue; an effect that renders calls
//! into the template cache, which hands back a fresh element to swap into a
//! [`Mount`](template::Mount).
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{create_state, MicrotaskQueue};
//!
//! let queue = MicrotaskQueue::new();
//! let (state, effects) = create_state::<i32>(queue.clone());
//! state.set("foo", 1);
//! state.set("bar", 2);
//!
//! let sum = state.clone();
//! effects.use_effect(move || {
//!     let total = sum.get("foo").unwrap_or(0) + sum.get("bar").unwrap_or(0);
//!     sum.set("sum", total);
//! });
//! assert_eq!(state.get("sum"), Some(3));
//!
//! queue.turn(|| {
//!     state.set("foo", 4);
//!     state.set("bar", 4);
//!     // Effects have not run yet
//!     assert_eq!(state.get("sum"), Some(3));
//! });
//! assert_eq!(state.get("sum"), Some(8));
//! ```

pub mod reactive;
pub mod template;
pub mod config;
pub mod error;

pub use config::{StoreConfig, TemplateConfig};
pub use error::{ConfigError, Error, Result, TemplateError};
