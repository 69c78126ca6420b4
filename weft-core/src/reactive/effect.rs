//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever any
//! signal it read on its most recent execution changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial subscriptions.
//!
//! 2. While the body executes, the effect is installed as the runtime's
//!    current observer. Any signal read during that window registers the
//!    effect as a subscriber.
//!
//! 3. When a subscribed signal changes, the effect re-executes (or is
//!    queued if a batch is active). Once disposed, execution is a
//!    permanent no-op.
//!
//! # Cleanup
//!
//! An effect body can register a cleanup with [`on_cleanup`]. The cleanup
//! runs exactly once: immediately before the next execution of the same
//! effect, or on disposal, whichever comes first. A body that registers no
//! cleanup leaves nothing to run.
//!
//! # Errors
//!
//! The runtime does not catch panics from effect bodies; they propagate to
//! whoever triggered the execution (the constructor for the first run, the
//! signal write for re-runs). Ambient tracking state is restored by guards
//! either way.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::runtime::{untrack, ExecutionGuard, Observer, Runtime};
use super::signal::Readable;
use super::subscriber::{NotifyHandle, SubscriberId};

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique effect ID.
fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Cleanup registered by an effect body, run once before the next execution
/// or on disposal.
pub(crate) type Cleanup = Box<dyn FnOnce() + Send>;

/// Shared state of one effect runner.
pub(crate) struct EffectInner {
    id: u64,

    /// Identity under which this effect appears in subscriber sets and the
    /// pending queue.
    subscriber_id: SubscriberId,

    /// The effect body.
    body: Box<dyn Fn() + Send + Sync>,

    /// Cleanup pending from the most recent execution, if any.
    ///
    /// A `Mutex` rather than an `RwLock`: the slot holds a `FnOnce`, which
    /// is `Send` but not `Sync`.
    cleanup: Mutex<Option<Cleanup>>,

    /// Once set, execution is a no-op forever.
    disposed: AtomicBool,

    /// Number of completed executions.
    run_count: AtomicU64,
}

impl EffectInner {
    /// Execute the effect body, tracking dependencies.
    ///
    /// Runs any pending cleanup first, then installs this effect as the
    /// current observer for the dynamic extent of the body. The previous
    /// observer is restored by guard even if the body panics.
    pub(crate) fn execute(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if let Some(cleanup) = self.cleanup.lock().expect("cleanup lock poisoned").take() {
            cleanup();
        }

        let observer = Observer {
            id: self.subscriber_id,
            notify: self.notify_handle(),
        };
        let _ctx = ExecutionGuard::enter(observer, Arc::clone(self));

        tracing::trace!(effect = self.id, "executing effect body");
        (self.body)();

        self.run_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Handle that re-executes this effect when invoked.
    ///
    /// Signals hold these in their subscriber sets; the strong reference
    /// keeps the effect alive for as long as anything it read does.
    fn notify_handle(self: &Arc<Self>) -> NotifyHandle {
        let inner = Arc::clone(self);
        Arc::new(move || inner.execute())
    }

    /// Mark disposed and run any outstanding cleanup. Idempotent.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(effect = self.id, "disposing effect");
        if let Some(cleanup) = self.cleanup.lock().expect("cleanup lock poisoned").take() {
            cleanup();
        }
    }

    /// Store the cleanup for the current execution.
    ///
    /// A later registration within the same run replaces the earlier one;
    /// the replaced cleanup is dropped without running.
    pub(crate) fn set_cleanup(&self, cleanup: Cleanup) {
        *self.cleanup.lock().expect("cleanup lock poisoned") = Some(cleanup);
    }
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// Cloning shares state. Dropping every `Effect` handle does not stop the
/// effect: the subscriber sets of the signals it reads keep it alive, as in
/// any implicitly-tracked reactive system. Call [`Effect::dispose`] to stop
/// it.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(0);
/// let effect = effect({
///     let count = count.clone();
///     move || println!("count is {}", count.get())
/// });
///
/// count.set(5); // prints: "count is 5"
/// effect.dispose();
/// count.set(6); // prints nothing
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

/// Create an effect and run it once, synchronously.
///
/// If a scope created by [`root`] is active, the effect's disposer is
/// registered with the innermost one.
///
/// [`root`]: super::root
pub fn effect<F>(body: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(body)
}

impl Effect {
    /// Create a new effect with the given body.
    ///
    /// The body runs immediately to establish initial subscriptions; a
    /// panic during that run propagates to the caller and the effect is
    /// not registered with any scope.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            id: next_effect_id(),
            subscriber_id: SubscriberId::new(),
            body: Box::new(body),
            cleanup: Mutex::new(None),
            disposed: AtomicBool::new(false),
            run_count: AtomicU64::new(0),
        });

        // Run immediately to establish dependencies.
        inner.execute();

        let effect = Self { inner };
        if let Some(scope) = Runtime::current_scope() {
            scope.register(effect.disposer());
        }
        effect
    }

    fn disposer(&self) -> Box<dyn Fn() + Send + Sync> {
        let inner = Arc::clone(&self.inner);
        Box::new(move || inner.dispose())
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Dispose of the effect.
    ///
    /// The first call runs any outstanding cleanup and makes every future
    /// execution a no-op. Further calls do nothing.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> u64 {
        self.inner.run_count.load(Ordering::SeqCst)
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Register a cleanup for the currently executing effect.
///
/// The cleanup runs exactly once: before the effect's next execution, or
/// when the effect is disposed. Registration works inside [`untrack`] too;
/// untracking suspends dependency collection, not the executing effect.
/// Outside any effect this is a no-op.
///
/// # Example
///
/// ```rust,ignore
/// effect(move || {
///     let listener = attach_listener(count.get());
///     on_cleanup(move || listener.detach());
/// });
/// ```
pub fn on_cleanup<F>(cleanup: F)
where
    F: FnOnce() + Send + 'static,
{
    match Runtime::running() {
        Some(inner) => inner.set_cleanup(Box::new(cleanup)),
        None => tracing::debug!("on_cleanup called outside an effect; ignored"),
    }
}

/// Run `f(value, previous)` whenever `source` changes.
///
/// `previous` is the value captured at the end of the prior invocation; the
/// very first call sees `previous == value`. `f` runs under [`untrack`], so
/// signals it reads do not become additional dependencies: only `source`
/// drives re-execution.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(0);
/// let _watch = on(&count, |value, previous| {
///     println!("changed from {previous} to {value}");
/// });
/// ```
pub fn on<T, S, F>(source: &S, f: F) -> Effect
where
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Readable<T> + Clone + Send + Sync + 'static,
    F: Fn(&T, &T) + Send + Sync + 'static,
{
    let source = source.clone();
    let previous = Arc::new(RwLock::new(source.peek()));

    Effect::new(move || {
        let value = source.get();
        let prev = previous
            .read()
            .expect("previous-value lock poisoned")
            .clone();
        untrack(|| f(&value, &prev));
        *previous.write().expect("previous-value lock poisoned") = value;
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;
    use crate::reactive::signal;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let count = signal(0);
        let runs = Arc::new(AtomicI32::new(0));

        let _effect = effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                count.get();
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        count.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        count.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn peek_is_non_tracking() {
        let count = signal(0);
        let runs = Arc::new(AtomicI32::new(0));

        let _effect = effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                count.peek();
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        count.set(1);
        count.set(2);
        count.set(3);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let tracked = signal(0);
        let ignored = signal(0);
        let runs = Arc::new(AtomicI32::new(0));

        let _effect = effect({
            let tracked = tracked.clone();
            let ignored = ignored.clone();
            let runs = runs.clone();
            move || {
                tracked.get();
                untrack(|| ignored.get());
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        ignored.set(5);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tracked.set(5);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let count = signal(0);
        let cleanups = Arc::new(AtomicI32::new(0));

        let effect = effect({
            let count = count.clone();
            let cleanups = cleanups.clone();
            move || {
                count.get();
                let cleanups = cleanups.clone();
                on_cleanup(move || {
                    cleanups.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);

        // Re-run: the previous run's cleanup fires first.
        count.set(1);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        count.set(2);
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);

        // Disposal fires the final outstanding cleanup, exactly once.
        effect.dispose();
        assert_eq!(cleanups.load(Ordering::SeqCst), 3);

        effect.dispose();
        assert_eq!(cleanups.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dispose_stops_execution_and_is_idempotent() {
        let count = signal(0);
        let runs = Arc::new(AtomicI32::new(0));

        let effect = effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                count.get();
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert!(effect.is_disposed());

        count.set(1);
        count.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert!(effect.is_disposed());
    }

    #[test]
    fn nested_effect_creation_restores_outer_tracking() {
        let outer_signal = signal(0);
        let inner_signal = signal(0);
        let outer_runs = Arc::new(AtomicI32::new(0));
        let inner_runs = Arc::new(AtomicI32::new(0));

        let _outer = effect({
            let outer_signal = outer_signal.clone();
            let inner_signal = inner_signal.clone();
            let outer_runs = outer_runs.clone();
            let inner_runs = inner_runs.clone();
            move || {
                outer_runs.fetch_add(1, Ordering::SeqCst);
                // Creating an effect mid-body swaps the observer and must
                // restore it afterward.
                let _inner = effect({
                    let inner_signal = inner_signal.clone();
                    let inner_runs = inner_runs.clone();
                    move || {
                        inner_signal.get();
                        inner_runs.fetch_add(1, Ordering::SeqCst);
                    }
                });
                // Read after the nested creation: must still subscribe the
                // outer effect.
                outer_signal.get();
            }
        });
        assert_eq!(outer_runs.load(Ordering::SeqCst), 1);
        assert_eq!(inner_runs.load(Ordering::SeqCst), 1);

        outer_signal.set(1);
        assert_eq!(outer_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert_eq!(effect1.run_count(), 1);
        assert_eq!(effect2.run_count(), 1);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn on_receives_current_and_previous_values() {
        let count = signal(0);
        let seen: Arc<RwLock<Vec<(i32, i32)>>> = Arc::new(RwLock::new(Vec::new()));

        let _watch = on(&count, {
            let seen = seen.clone();
            move |value: &i32, previous: &i32| {
                seen.write().unwrap().push((*value, *previous));
            }
        });

        count.set(5);
        count.set(10);

        assert_eq!(*seen.read().unwrap(), vec![(0, 0), (5, 0), (10, 5)]);
    }

    #[test]
    fn on_only_tracks_its_source() {
        let source = signal(0);
        let other = signal(0);
        let calls = Arc::new(AtomicI32::new(0));

        let _watch = on(&source, {
            let other = other.clone();
            let calls = calls.clone();
            move |_value: &i32, _previous: &i32| {
                // This read happens under untrack and must not subscribe.
                other.get();
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        other.set(99);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        source.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn on_cleanup_outside_an_effect_is_a_noop() {
        on_cleanup(|| panic!("must never run"));
    }
}
