//! Run-once memoization.
//!
//! `Memo` is a strict, non-reactive cache: the computation runs at most
//! once successfully, on first access, and the result is returned forever
//! after. A computation that panics leaves the memo uncached, and the next
//! access retries it. `Memo` is completely independent of dependency
//! tracking; reading a memo inside an effect creates no subscription, and
//! signal changes never invalidate it. For a derived value that stays in
//! sync, use `computed` instead.

use std::fmt::Debug;
use std::sync::{Mutex, OnceLock};

/// A lazily computed, permanently cached value.
pub struct Memo<T> {
    /// The computation, dropped after its first successful run. `FnMut` so
    /// it can be put back and retried if it panics; a `Mutex` because the
    /// boxed closure is `Send` but not `Sync`.
    compute: Mutex<Option<Box<dyn FnMut() -> T + Send>>>,

    /// The cached result.
    value: OnceLock<T>,
}

/// Create a run-once cache around an expensive computation.
///
/// # Example
///
/// ```rust,ignore
/// let table = memo(|| build_lookup_table());
/// let a = table.get(); // computes
/// let b = table.get(); // cached
/// ```
pub fn memo<T, F>(f: F) -> Memo<T>
where
    T: Clone,
    F: FnMut() -> T + Send + 'static,
{
    Memo::new(f)
}

impl<T> Memo<T>
where
    T: Clone,
{
    /// Create a new memo. The computation does not run until first access.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        Self {
            compute: Mutex::new(Some(Box::new(f))),
            value: OnceLock::new(),
        }
    }

    /// Get the value, computing it on the first call.
    ///
    /// A panicking computation propagates and leaves the memo uncached;
    /// the next call runs it again. The computation is taken out of its
    /// slot while it runs, so it does not poison the slot's lock, and is
    /// put back on the panic path.
    pub fn get(&self) -> T {
        if let Some(value) = self.value.get() {
            return value.clone();
        }

        let mut compute = self
            .compute
            .lock()
            .expect("compute lock poisoned")
            .take()
            .expect("recursive memo initialization");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| compute()));
        match result {
            Ok(value) => self.value.get_or_init(|| value).clone(),
            Err(payload) => {
                *self.compute.lock().expect("compute lock poisoned") = Some(compute);
                std::panic::resume_unwind(payload)
            }
        }
    }

    /// Check whether the value has been computed yet.
    pub fn has_value(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.value.get())
            .finish()
    }
}
