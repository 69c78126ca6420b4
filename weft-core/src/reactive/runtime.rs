//! Reactive Runtime
//!
//! The runtime holds the ambient state that connects signals, effects, and
//! scopes: which effect is currently executing, which scope is collecting
//! disposers, and the batch bookkeeping used to coalesce notifications.
//!
//! # How It Works
//!
//! 1. While an effect executes, the runtime records it as the current
//!    observer. Signal reads consult this to register subscriptions.
//!
//! 2. Signal writes ask the runtime whether a batch is active. If so, the
//!    subscriber handles are queued instead of run; the queue is drained
//!    when the outermost batch exits.
//!
//! 3. During the drain, batch depth is held at one so that writes performed
//!    by flushing effects re-enter the queue instead of cascading
//!    synchronously. A per-flush set guarantees each subscriber runs at
//!    most once per batch.
//!
//! # Thread Safety
//!
//! All ambient state for one thread lives in a single thread-local value.
//! Each thread therefore hosts an independent reactive graph, and tests
//! running on separate threads cannot interfere with each other. Every
//! save/restore of an ambient pointer goes through a guard type whose
//! `Drop` impl restores the previous value, so a panicking user callback
//! cannot corrupt the tracker or scope stack.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::effect::EffectInner;
use super::scope::ScopeInner;
use super::subscriber::{NotifyHandle, SubscriberId};

/// The subscriber currently collecting dependencies.
///
/// Installed for the dynamic extent of an effect body; signal reads add
/// `notify` to their subscriber sets under `id`.
#[derive(Clone)]
pub(crate) struct Observer {
    pub(crate) id: SubscriberId,
    pub(crate) notify: NotifyHandle,
}

/// Ambient state for one thread's reactive graph.
struct RuntimeState {
    /// Observer registered by tracked reads. Cleared by `untrack`.
    observer: Option<Observer>,

    /// Innermost executing effect. Receives `on_cleanup` registrations.
    /// Unlike `observer`, this survives `untrack`.
    running: Option<Arc<EffectInner>>,

    /// Innermost active scope, collecting effect disposers.
    scope: Option<Arc<ScopeInner>>,

    /// Batch nesting depth. Notifications are queued while this is > 0.
    batch_depth: usize,

    /// Subscribers queued during a batch, deduplicated by ID.
    pending: IndexMap<SubscriberId, NotifyHandle>,

    /// Subscribers already run in the current flush.
    flushed: HashSet<SubscriberId>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            observer: None,
            running: None,
            scope: None,
            batch_depth: 0,
            pending: IndexMap::new(),
            flushed: HashSet::new(),
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

/// Access point for the thread's ambient reactive state.
///
/// The public methods form a read-only debug surface; everything that
/// mutates the state goes through crate-internal methods or guards.
pub struct Runtime;

impl Runtime {
    /// Check if a tracked read would currently register a dependency.
    pub fn is_tracking() -> bool {
        RUNTIME.with(|rt| rt.borrow().observer.is_some())
    }

    /// Get the subscriber ID of the current observer, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        RUNTIME.with(|rt| rt.borrow().observer.as_ref().map(|obs| obs.id))
    }

    /// Get the current batch nesting depth.
    ///
    /// During a flush this reads one, matching the queue-instead-of-run
    /// behavior writes observe at that point.
    pub fn batch_depth() -> usize {
        RUNTIME.with(|rt| rt.borrow().batch_depth)
    }

    /// Get the number of subscribers queued for the next flush.
    pub fn pending_count() -> usize {
        RUNTIME.with(|rt| rt.borrow().pending.len())
    }

    pub(crate) fn observer() -> Option<Observer> {
        RUNTIME.with(|rt| rt.borrow().observer.clone())
    }

    pub(crate) fn running() -> Option<Arc<EffectInner>> {
        RUNTIME.with(|rt| rt.borrow().running.clone())
    }

    pub(crate) fn current_scope() -> Option<Arc<ScopeInner>> {
        RUNTIME.with(|rt| rt.borrow().scope.clone())
    }

    /// Swap the current scope, returning the previous one.
    pub(crate) fn swap_scope(scope: Option<Arc<ScopeInner>>) -> Option<Arc<ScopeInner>> {
        RUNTIME.with(|rt| std::mem::replace(&mut rt.borrow_mut().scope, scope))
    }

    pub(crate) fn is_batching() -> bool {
        RUNTIME.with(|rt| rt.borrow().batch_depth > 0)
    }

    /// Queue a subscriber for the next flush.
    ///
    /// Queuing an already-pending subscriber is a no-op apart from
    /// refreshing its handle.
    pub(crate) fn enqueue(id: SubscriberId, notify: NotifyHandle) {
        RUNTIME.with(|rt| {
            rt.borrow_mut().pending.insert(id, notify);
        });
    }
}

/// Installs an effect as the current observer and running effect for the
/// dynamic extent of its body, restoring the previous values on drop.
///
/// The `Drop` impl is what makes nested effect creation and panicking
/// effect bodies safe.
pub(crate) struct ExecutionGuard {
    prev_observer: Option<Observer>,
    prev_running: Option<Arc<EffectInner>>,
}

impl ExecutionGuard {
    pub(crate) fn enter(observer: Observer, running: Arc<EffectInner>) -> Self {
        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            Self {
                prev_observer: rt.observer.replace(observer),
                prev_running: rt.running.replace(running),
            }
        })
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.observer = self.prev_observer.take();
            rt.running = self.prev_running.take();
        });
    }
}

/// Run `f` without registering any dependencies.
///
/// Signal reads inside `f` do not subscribe the enclosing effect, no matter
/// how deeply nested the reads are. The previous observer is restored even
/// if `f` panics. `on_cleanup` registration still works inside `untrack`;
/// only dependency tracking is suspended.
///
/// # Example
///
/// ```rust,ignore
/// let watched = signal(0);
/// let ignored = signal(0);
/// effect(move || {
///     watched.get();
///     untrack(|| ignored.get()); // never re-runs this effect
/// });
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = RUNTIME.with(|rt| rt.borrow_mut().observer.take());
    let _guard = UntrackGuard { prev };
    f()
}

struct UntrackGuard {
    prev: Option<Observer>,
}

impl Drop for UntrackGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| rt.borrow_mut().observer = self.prev.take());
    }
}

/// Group signal writes, deferring subscriber execution until the outermost
/// batch exits.
///
/// Returns `f`'s result. Batches nest: inner batches only adjust the depth,
/// and a single flush happens when the outermost batch finishes. During the
/// flush each subscriber runs at most once, even if several of its
/// dependencies changed, and writes performed by flushing effects are
/// drained in the same flush.
///
/// A panicking `f` still decrements the depth and still flushes at the
/// outermost exit, so subscribers queued before the panic run exactly as
/// they would have on the normal path; the panic is re-raised afterwards.
///
/// # Example
///
/// ```rust,ignore
/// let a = signal(1);
/// let b = signal(2);
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// }); // an effect reading both runs once, not twice
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    RUNTIME.with(|rt| rt.borrow_mut().batch_depth += 1);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    let depth = RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.batch_depth -= 1;
        rt.batch_depth
    });
    if depth == 0 {
        flush();
    }

    match result {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Drain the pending queue, running each subscriber at most once.
///
/// Depth is held at one for the whole drain so that writes from flushing
/// effects queue follow-up work instead of running it inline; the loop
/// picks that work up until a drain cycle comes up empty.
fn flush() {
    RUNTIME.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.batch_depth = 1;
        rt.flushed.clear();
    });
    let _guard = FlushGuard;

    loop {
        let pending = RUNTIME.with(|rt| std::mem::take(&mut rt.borrow_mut().pending));
        if pending.is_empty() {
            break;
        }
        tracing::trace!(count = pending.len(), "flushing pending subscribers");
        for (id, notify) in pending {
            let first_run = RUNTIME.with(|rt| rt.borrow_mut().flushed.insert(id));
            if first_run {
                notify();
            }
        }
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.batch_depth = 0;
            rt.flushed.clear();
        });
    }
}
