/*!
 * Atomic Spinlock
 *
 * One memory word, acquired by a single atomic test-and-set and released by
 * a store. What happens between failed probes is the `Relax` policy: a CPU
 * spin hint under OS threads, a task yield under a cooperative runtime.
 */

use super::traits::{Relax, Spin, TryLock};
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

/// Test-and-set spinlock
pub struct AtomicLock<R: Relax = Spin> {
    locked: AtomicBool,
    _relax: PhantomData<fn() -> R>,
}

impl<R: Relax> AtomicLock<R> {
    /// Create a lock, initially held if `locked`
    #[inline]
    pub const fn new(locked: bool) -> Self {
        Self {
            locked: AtomicBool::new(locked),
            _relax: PhantomData,
        }
    }

    /// Probe once
    #[inline(always)]
    pub fn try_lock(&self) -> TryLock {
        if self.locked.swap(true, Ordering::Acquire) {
            TryLock::Busy
        } else {
            TryLock::Acquired
        }
    }

    /// Probe until acquired, relaxing between probes
    #[inline]
    pub fn lock(&self) {
        while self.try_lock().is_busy() {
            R::relax();
        }
    }

    #[inline(always)]
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl<R: Relax> Default for AtomicLock<R> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<R: Relax> fmt::Debug for AtomicLock<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Data guarded by an `AtomicLock`, reachable only inside `with`
pub struct SpinCell<T, R: Relax = Spin> {
    lock: AtomicLock<R>,
    data: UnsafeCell<T>,
}

// Safety: the spinlock serializes every access to `data`
unsafe impl<T: Send, R: Relax> Send for SpinCell<T, R> {}
unsafe impl<T: Send, R: Relax> Sync for SpinCell<T, R> {}

impl<T, R: Relax> SpinCell<T, R> {
    #[inline]
    pub const fn new(value: T) -> Self {
        Self {
            lock: AtomicLock::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Run `f` with exclusive access; the lock is held for exactly its
    /// duration, including if it unwinds
    #[inline]
    pub fn with<F, O>(&self, f: F) -> O
    where
        F: FnOnce(&mut T) -> O,
    {
        struct Release<'a, R: Relax>(&'a AtomicLock<R>);
        impl<R: Relax> Drop for Release<'_, R> {
            fn drop(&mut self) {
                self.0.unlock();
            }
        }

        self.lock.lock();
        let _release = Release(&self.lock);
        // SAFETY: the spinlock is held until `_release` drops
        f(unsafe { &mut *self.data.get() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::traits::Yield;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_try_lock_on_held_lock() {
        let lock: AtomicLock = AtomicLock::new(false);
        assert_eq!(lock.try_lock(), TryLock::Acquired);
        assert_eq!(lock.try_lock(), TryLock::Busy);
        lock.unlock();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_initially_locked() {
        let lock: AtomicLock = AtomicLock::new(true);
        assert!(lock.try_lock().is_busy());
        lock.unlock();
        assert!(lock.try_lock().is_acquired());
    }

    #[test]
    fn test_spin_cell_exclusion() {
        let cell = Arc::new(SpinCell::<u64, Yield>::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..2_500 {
                        cell.with(|n| *n += 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cell.with(|n| *n), 10_000);
    }

    #[test]
    fn test_spin_cell_releases_on_unwind() {
        let cell = SpinCell::<u32>::new(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cell.with(|_| panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(cell.with(|n| *n), 1);
    }
}
