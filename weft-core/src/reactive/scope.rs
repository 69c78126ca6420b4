//! Scope Implementation
//!
//! A scope is an ownership list: while it is active, every effect created
//! registers its disposer with it, and disposing the scope releases them
//! all in registration order. Scopes track disposers only; they take no
//! part in value propagation.

use std::sync::{Arc, RwLock};

use smallvec::SmallVec;

use super::runtime::Runtime;

/// Disposer registered by an effect. Idempotent by construction.
type Disposer = Box<dyn Fn() + Send + Sync>;

/// Shared state of one scope.
pub(crate) struct ScopeInner {
    disposers: RwLock<SmallVec<[Disposer; 4]>>,

    /// The scope that was active when this one was entered. Restored by
    /// `dispose` while this scope is still the current one.
    prev: Option<Arc<ScopeInner>>,
}

impl ScopeInner {
    fn new(prev: Option<Arc<ScopeInner>>) -> Self {
        Self {
            disposers: RwLock::new(SmallVec::new()),
            prev,
        }
    }

    /// Register a disposer with this scope.
    pub(crate) fn register(&self, disposer: Disposer) {
        self.disposers
            .write()
            .expect("disposer lock poisoned")
            .push(disposer);
    }

    /// Run every registered disposer in registration order, then clear.
    ///
    /// If this scope is still the current one, the enclosing scope becomes
    /// current again, so effects created after an in-body dispose register
    /// with the enclosing scope rather than a dead one. When dispose runs
    /// later, under some unrelated scope, the pointer is left alone.
    ///
    /// The list is taken before running, so a second dispose (or one
    /// triggered from inside a disposer) sees it empty.
    fn dispose(this: &Arc<Self>) {
        let is_current = Runtime::current_scope()
            .is_some_and(|current| Arc::ptr_eq(&current, this));
        if is_current {
            Runtime::swap_scope(this.prev.clone());
        }

        let disposers =
            std::mem::take(&mut *this.disposers.write().expect("disposer lock poisoned"));
        if disposers.is_empty() {
            return;
        }
        tracing::debug!(count = disposers.len(), "disposing scope");
        for disposer in disposers {
            disposer();
        }
    }
}

/// Handle for releasing everything a [`root`] scope collected.
///
/// Cloneable; all clones refer to the same scope.
#[derive(Clone)]
pub struct ScopeDisposer {
    inner: Arc<ScopeInner>,
}

impl ScopeDisposer {
    /// Invoke every registered disposer in registration order and clear
    /// the list. If this scope is still the current one, the scope that
    /// enclosed it becomes current again. A second call is a no-op.
    pub fn dispose(&self) {
        ScopeInner::dispose(&self.inner);
    }
}

/// Run `f` with a fresh scope active, passing it the scope's disposer.
///
/// Effects created while `f` runs (directly or through `computed`/`on`)
/// register with this scope rather than any outer one; the outer scope is
/// restored when `f` returns, even on panic. The disposer may be called
/// inside `f`, in which case the outer scope becomes current for the rest
/// of the body, or kept and called later. Returns `f`'s result.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(0);
/// root(|scope| {
///     effect({
///         let count = count.clone();
///         move || println!("count: {}", count.get())
///     });
///     count.set(1); // prints
///     scope.dispose();
///     count.set(2); // prints nothing
/// });
/// ```
pub fn root<T>(f: impl FnOnce(ScopeDisposer) -> T) -> T {
    let prev = Runtime::current_scope();
    let inner = Arc::new(ScopeInner::new(prev.clone()));
    Runtime::swap_scope(Some(Arc::clone(&inner)));
    let _guard = ScopeGuard { prev };
    f(ScopeDisposer { inner })
}

/// Restores the previously active scope on drop, panic or not.
struct ScopeGuard {
    prev: Option<Arc<ScopeInner>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        Runtime::swap_scope(self.prev.take());
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
