//! Subscriber identity for the reactive system.
//!
//! Every notifiable party (an effect runner or a manual subscription) gets
//! a `SubscriberId` when created. Signals key their subscriber sets by this
//! ID, which is what makes re-tracking an existing subscriber idempotent
//! and lets a batch flush run each subscriber at most once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle that re-executes a subscriber.
///
/// For an effect this re-runs the effect body; for a manual subscription it
/// invokes the registered callback. Signals store these in their subscriber
/// sets and the runtime queues them while a batch is active.
pub(crate) type NotifyHandle = Arc<dyn Fn() + Send + Sync>;
