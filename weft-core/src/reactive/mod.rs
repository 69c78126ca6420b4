//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computed
//! signals, and effects, plus the ambient runtime that connects them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect is executing, the signal registers that effect as a
//! subscriber. When the value changes, all subscribers are notified.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever any
//! signal it read on its most recent execution changes. Effects synchronize
//! reactive state with the outside world.
//!
//! ## Computed signals
//!
//! A Computed is a signal whose value is derived from other signals and
//! kept in sync by an internal effect. It recomputes only when one of its
//! own dependencies changes.
//!
//! ## Batches and scopes
//!
//! `batch` defers and coalesces notifications until the outermost batch
//! exits, so each subscriber runs at most once per batch. `root` collects
//! the disposers of effects created inside it, releasing them as a unit.
//!
//! # Implementation Notes
//!
//! Dependency detection is implicit: a thread-local runtime records which
//! effect is currently executing, and signal reads consult it. This
//! approach ("automatic dependency tracking") is the one used by SolidJS,
//! Vue 3, and Leptos. All ambient state for one thread lives in a single
//! runtime value, so independent threads host independent reactive graphs.

mod computed;
mod effect;
mod memo;
mod runtime;
mod scope;
mod signal;
mod subscriber;

pub use computed::{computed, Computed};
pub use effect::{effect, on, on_cleanup, Effect};
pub use memo::{memo, Memo};
pub use runtime::{batch, untrack, Runtime};
pub use scope::{root, ScopeDisposer};
pub use signal::{signal, store, Readable, Signal, SignalKind, Subscription};
pub use subscriber::SubscriberId;
