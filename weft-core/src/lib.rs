//! Weft Core
//!
//! This crate provides the dependency-tracking runtime for the Weft
//! fine-grained reactivity library. It implements:
//!
//! - Reactive primitives (signals, computed signals, effects)
//! - Implicit dependency registration during reads
//! - Batched, coalesced change notification
//! - Scoped lifecycle management (roots and disposers)
//!
//! # Architecture
//!
//! Everything lives under the `reactive` module:
//!
//! - `signal`: mutable value cells with subscriber sets
//! - `effect`: re-runnable side-effecting subscribers
//! - `computed`: derived cells kept in sync by a backing effect
//! - `runtime`: ambient tracking state, batching, and the flush loop
//! - `scope`: ownership lists that release effects as a unit
//! - `memo`: a strict run-once cache, independent of tracking
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::reactive::{batch, computed, effect, signal};
//!
//! let count = signal(0);
//! let doubled = computed({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! effect({
//!     let count = count.clone();
//!     let doubled = doubled.clone();
//!     move || println!("count: {}, doubled: {}", count.get(), doubled.get())
//! });
//!
//! count.set(5);
//! // Effect re-runs automatically, prints: "count: 5, doubled: 10"
//!
//! batch(|| {
//!     count.set(6);
//!     count.set(7);
//! });
//! // Effect ran once more, after the batch exited.
//! ```

pub mod reactive;
