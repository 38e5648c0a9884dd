//! Safe global initialization without a heap.
//!
//! Provides a safe alternative to `static mut` for the kernel's handful of
//! singletons (log service, filesystem image, terminal table, process
//! table). No heap allocation is needed or used: the wrapped value lives
//! inline inside a `spin::Mutex<Option<T>>`.

use spin::Mutex;

/// Safe global state, lazily initialized exactly once.
pub struct GlobalState<T> {
    inner: Mutex<Option<T>>,
}

impl<T> GlobalState<T> {
    /// Create new uninitialized global state.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Initialize the global state. Returns `Err(value)` if already
    /// initialized.
    pub fn init(&self, value: T) -> Result<(), T> {
        let mut lock = self.inner.lock();
        if lock.is_some() {
            Err(value)
        } else {
            *lock = Some(value);
            Ok(())
        }
    }

    /// Get a reference via closure; `None` if not yet initialized.
    pub fn with<R, F: FnOnce(&T) -> R>(&self, f: F) -> Option<R> {
        let lock = self.inner.lock();
        lock.as_ref().map(f)
    }

    /// Get a mutable reference via closure; `None` if not yet initialized.
    pub fn with_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> Option<R> {
        let mut lock = self.inner.lock();
        lock.as_mut().map(f)
    }
}

impl<T> Default for GlobalState<T> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: GlobalState<T> can be sent across threads if T: Send. The inner
// spin::Mutex serializes all access to the Option<T>, so no concurrent
// access to T is possible.
unsafe impl<T: Send> Send for GlobalState<T> {}
// SAFETY: GlobalState<T> can be shared across threads if T: Send. The
// spin::Mutex ensures every access goes through the lock, so T itself never
// needs to be Sync.
unsafe impl<T: Send> Sync for GlobalState<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_read() {
        let state: GlobalState<u32> = GlobalState::new();
        assert!(state.with(|_| ()).is_none());
        assert!(state.init(42).is_ok());
        assert_eq!(state.with(|v| *v), Some(42));
    }

    #[test]
    fn double_init_fails() {
        let state: GlobalState<u32> = GlobalState::new();
        assert!(state.init(1).is_ok());
        assert!(state.init(2).is_err());
        assert_eq!(state.with(|v| *v), Some(1));
    }

    #[test]
    fn with_mut_mutates() {
        let state: GlobalState<u32> = GlobalState::new();
        state.init(10).unwrap();
        state.with_mut(|v| *v += 5);
        assert_eq!(state.with(|v| *v), Some(15));
    }
}
