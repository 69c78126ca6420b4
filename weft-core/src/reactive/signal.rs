//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which subscribers depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is executing, the signal
//!    registers that effect in its subscriber set. Registration is keyed by
//!    subscriber ID, so re-reading inside the same run is a no-op.
//!
//! 2. When the value changes (under `PartialEq`), subscribers are notified:
//!    run synchronously outside a batch, queued for a coalesced flush
//!    inside one. A write of an equal value notifies nobody.
//!
//! 3. `peek` reads without ever touching the tracker.
//!
//! # Thread Safety
//!
//! The value and subscriber set live behind `RwLock`s shared by all clones
//! of a signal. Dependency tracking itself is per thread: reads only
//! subscribe the effect running on the reading thread.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::runtime::Runtime;
use super::subscriber::{NotifyHandle, SubscriberId};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Distinguishes plain signals from computed-backed cells.
///
/// Carried in the cell itself so introspection never has to infer
/// capabilities structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// A plain mutable cell created by `signal` / `Signal::new`.
    Plain,
    /// A cell written by the backing effect of a [`Computed`].
    ///
    /// [`Computed`]: super::Computed
    Computed,
}

/// Subscriber set shared by all clones of a signal.
///
/// Insertion order is incidental: callers must not rely on the execution
/// order of independent subscribers.
type SubscriberMap = RwLock<IndexMap<SubscriberId, NotifyHandle>>;

/// A reactive signal holding a value of type `T`.
///
/// Cloning a signal shares its state; all clones see the same value and the
/// same subscriber set.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let value = count.get(); // tracked read
/// count.set(5);            // notifies subscribers
/// count.update(|v| v + 1); // write derived from the current value
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: u64,

    /// Plain or computed-backed.
    kind: SignalKind,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Subscribers keyed by ID; effects insert themselves on tracked reads.
    subscribers: Arc<SubscriberMap>,
}

/// Create a new signal with the given initial value.
pub fn signal<T>(initial: T) -> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Signal::new(initial)
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_kind(value, SignalKind::Plain)
    }

    pub(crate) fn with_kind(value: T, kind: SignalKind) -> Self {
        Self {
            id: next_signal_id(),
            kind,
            value: Arc::new(RwLock::new(value)),
            subscribers: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the signal's kind tag.
    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Get the current value.
    ///
    /// If an effect is currently executing, it is registered as a
    /// subscriber of this signal. Registering an existing subscriber again
    /// is a no-op.
    pub fn get(&self) -> T {
        if let Some(observer) = Runtime::observer() {
            self.subscribers
                .write()
                .expect("subscriber lock poisoned")
                .insert(observer.id, observer.notify);
        }

        self.value.read().expect("value lock poisoned").clone()
    }

    /// Get the current value without registering a dependency.
    pub fn peek(&self) -> T {
        self.value.read().expect("value lock poisoned").clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Writing a value equal to the current one is a complete no-op: the
    /// value is not stored and no subscriber is notified. Otherwise,
    /// subscribers run synchronously, unless a batch is active, in which
    /// case they are queued for the flush at the outermost batch exit.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.value.write().expect("value lock poisoned");
            if *guard == value {
                tracing::trace!(signal = self.id, "unchanged write skipped");
                return;
            }
            *guard = value;
        }

        self.notify_subscribers();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read().expect("value lock poisoned");
            f(&guard)
        };
        self.set(new_value);
    }

    /// Register a manual subscriber callback.
    ///
    /// The callback is invoked whenever the value changes, with the same
    /// batching and per-flush deduplication as effect runners. The returned
    /// [`Subscription`] removes exactly this callback; dropping it without
    /// calling [`Subscription::unsubscribe`] leaves the callback in place.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.subscribers
            .write()
            .expect("subscriber lock poisoned")
            .insert(id, Arc::new(notify));

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Notify every current subscriber, or queue them if a batch is active.
    fn notify_subscribers(&self) {
        // Snapshot first so subscriber callbacks can freely mutate the set.
        let snapshot: SmallVec<[(SubscriberId, NotifyHandle); 4]> = {
            let subscribers = self.subscribers.read().expect("subscriber lock poisoned");
            subscribers
                .iter()
                .map(|(id, notify)| (*id, Arc::clone(notify)))
                .collect()
        };

        if Runtime::is_batching() {
            tracing::trace!(signal = self.id, count = snapshot.len(), "queueing subscribers");
            for (id, notify) in snapshot {
                Runtime::enqueue(id, notify);
            }
        } else {
            tracing::trace!(signal = self.id, count = snapshot.len(), "notifying subscribers");
            for (_, notify) in snapshot {
                notify();
            }
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("subscriber lock poisoned")
            .len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("value", &self.peek())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Tracked-read access shared by [`Signal`] and [`Computed`].
///
/// `on` and similar combinators accept any readable source through this
/// trait instead of naming a concrete cell type.
///
/// [`Computed`]: super::Computed
pub trait Readable<T> {
    /// Tracked read: registers the current effect as a subscriber.
    fn get(&self) -> T;

    /// Untracked read.
    fn peek(&self) -> T;
}

impl<T> Readable<T> for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn peek(&self) -> T {
        Signal::peek(self)
    }
}

/// Handle for removing a manual subscriber from a signal.
///
/// Holds only a weak reference to the subscriber set, so keeping a
/// `Subscription` around does not keep the signal alive.
pub struct Subscription {
    id: SubscriberId,
    subscribers: Weak<SubscriberMap>,
}

impl Subscription {
    /// Remove the subscribed callback. Calling this twice is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .write()
                .expect("subscriber lock poisoned")
                .shift_remove(&self.id);
        }
    }

    /// Get the subscriber ID this subscription was registered under.
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

/// Create one independent signal per entry of the input map.
///
/// Key order is preserved. No linkage exists between the resulting signals;
/// writing one field never notifies subscribers of another.
///
/// # Example
///
/// ```rust,ignore
/// let state = store(IndexMap::from([
///     ("count", 0),
///     ("step", 1),
/// ]));
/// state["count"].set(5);
/// ```
pub fn store<K, V>(initial: IndexMap<K, V>) -> IndexMap<K, Signal<V>>
where
    K: std::hash::Hash + Eq,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    initial
        .into_iter()
        .map(|(key, value)| (key, Signal::new(value)))
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
