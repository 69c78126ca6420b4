//! Computed Signal Implementation
//!
//! A Computed is a signal cell driven by a backing effect: whenever one of
//! the computation's dependencies changes, the effect re-runs and writes
//! the new result into the cell. Readers subscribe to the cell exactly as
//! they would to a plain signal.
//!
//! # Differences from a plain signal
//!
//! - No public `set`/`update`: the backing effect owns the value.
//! - The cell carries [`SignalKind::Computed`] for introspection.
//! - Because the computation is encapsulated in its own effect with its own
//!   subscriptions, it recomputes only when one of its own dependencies
//!   changes, not when some enclosing effect re-runs.
//!
//! The backing effect's first execution happens synchronously during
//! construction, so a computed holds a valid value before `computed`
//! returns. An equal recomputation result is swallowed by the cell's
//! unchanged-write check and notifies nobody.

use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use super::effect::Effect;
use super::signal::{Readable, Signal, SignalKind, Subscription};

/// A read-only signal whose value is derived and kept in sync by an
/// internal effect.
///
/// Cloning shares state with the original.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(2);
/// let doubled = computed({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 4);
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10); // no read trigger needed
/// ```
pub struct Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    cell: Signal<T>,
    backing: Effect,
}

/// Create a computed signal from a computation function.
///
/// `f` runs once, synchronously, before this returns; dependencies it reads
/// during that run (and every re-run) drive recomputation. If a scope is
/// active, the backing effect registers with it, so disposing the scope
/// also stops recomputation.
pub fn computed<T, F>(f: F) -> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(f)
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new computed signal.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        // The cell is created on the backing effect's first run, which is
        // the only place the initial value exists.
        let slot: Arc<RwLock<Option<Signal<T>>>> = Arc::new(RwLock::new(None));

        let backing = Effect::new({
            let slot = Arc::clone(&slot);
            move || {
                let value = f();
                let existing = slot.read().expect("computed slot lock poisoned").clone();
                match existing {
                    Some(cell) => cell.set(value),
                    None => {
                        *slot.write().expect("computed slot lock poisoned") =
                            Some(Signal::with_kind(value, SignalKind::Computed));
                    }
                }
            }
        });

        let cell = slot
            .read()
            .expect("computed slot lock poisoned")
            .clone()
            .expect("backing effect runs before computed returns");

        Self { cell, backing }
    }

    /// Get the current value, registering the running effect as a
    /// subscriber.
    pub fn get(&self) -> T {
        self.cell.get()
    }

    /// Get the current value without registering a dependency.
    pub fn peek(&self) -> T {
        self.cell.peek()
    }

    /// Register a manual subscriber callback on the underlying cell.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.cell.subscribe(notify)
    }

    /// Get the underlying cell's unique ID.
    pub fn id(&self) -> u64 {
        self.cell.id()
    }

    /// Always [`SignalKind::Computed`].
    pub fn kind(&self) -> SignalKind {
        self.cell.kind()
    }

    /// Get the number of subscribers on the underlying cell.
    pub fn subscriber_count(&self) -> usize {
        self.cell.subscriber_count()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            backing: self.backing.clone(),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.cell.id())
            .field("value", &self.peek())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<T> Readable<T> for Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Computed::get(self)
    }

    fn peek(&self) -> T {
        Computed::peek(self)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;
    use crate::reactive::{effect, signal};

    #[test]
    fn computed_is_valid_immediately() {
        let count = signal(3);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });

        assert_eq!(doubled.get(), 6);
        assert_eq!(doubled.kind(), SignalKind::Computed);
    }

    #[test]
    fn computed_updates_without_a_read_trigger() {
        let count = signal(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });
        assert_eq!(doubled.get(), 2);

        count.set(10);

        // The backing effect already wrote the new value; no intervening
        // read was needed to refresh it.
        assert_eq!(doubled.peek(), 20);
    }

    #[test]
    fn computed_chain_propagates() {
        let a = signal(1);
        let b = computed({
            let a = a.clone();
            move || a.get() * 2
        });
        let c = computed({
            let b = b.clone();
            move || b.get() * 2
        });
        assert_eq!(c.get(), 4);

        a.set(2);
        assert_eq!(c.get(), 8);
    }

    #[test]
    fn computed_recomputes_only_for_its_own_dependencies() {
        let dep = signal(1);
        let unrelated = signal(0);
        let computations = Arc::new(AtomicI32::new(0));

        let derived = computed({
            let dep = dep.clone();
            let computations = computations.clone();
            move || {
                computations.fetch_add(1, Ordering::SeqCst);
                dep.get() * 2
            }
        });

        // An enclosing effect reads both the computed and another signal.
        let _outer = effect({
            let derived = derived.clone();
            let unrelated = unrelated.clone();
            move || {
                derived.get();
                unrelated.get();
            }
        });
        assert_eq!(computations.load(Ordering::SeqCst), 1);

        // Re-running the outer effect must not re-run the computation.
        unrelated.set(1);
        assert_eq!(computations.load(Ordering::SeqCst), 1);

        dep.set(2);
        assert_eq!(computations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn equal_recomputation_notifies_nobody() {
        let count = signal(1);
        let parity = computed({
            let count = count.clone();
            move || count.get() % 2
        });
        let notifications = Arc::new(AtomicI32::new(0));
        let _subscription = parity.subscribe({
            let notifications = notifications.clone();
            move || {
                notifications.fetch_add(1, Ordering::SeqCst);
            }
        });

        // 1 -> 3 keeps parity at 1; the cell swallows the equal write.
        count.set(3);
        assert_eq!(notifications.load(Ordering::SeqCst), 0);

        count.set(4);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effects_subscribe_to_computed_cells() {
        let count = signal(1);
        let doubled = computed({
            let count = count.clone();
            move || count.get() * 2
        });
        let observed = Arc::new(AtomicI32::new(0));

        let _effect = effect({
            let doubled = doubled.clone();
            let observed = observed.clone();
            move || {
                observed.store(doubled.get(), Ordering::SeqCst);
            }
        });
        assert_eq!(observed.load(Ordering::SeqCst), 2);

        count.set(4);
        assert_eq!(observed.load(Ordering::SeqCst), 8);
    }
}
