/*!
 * Synchronization Traits
 *
 * The contract every backend implements. A backend supplies a raw lock, a
 * raw condition variable built for that lock, and a relax policy used
 * between failed spinlock probes.
 *
 * # Design: Monomorphized Backends
 *
 * Only one backend is active per build, so `Mutex` and `Condition` are
 * generic over `Backend` and the build picks the default type parameter.
 * There is no vtable and no runtime branch on the backend.
 */

use crate::core::errors::SyncResult;

/// Result of a non-blocking acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TryLock {
    /// The caller now owns the lock
    Acquired,
    /// Someone else holds the lock; nothing changed
    Busy,
}

impl TryLock {
    /// `true` when ownership could not be obtained
    #[inline(always)]
    pub fn is_busy(self) -> bool {
        matches!(self, TryLock::Busy)
    }

    #[inline(always)]
    pub fn is_acquired(self) -> bool {
        matches!(self, TryLock::Acquired)
    }
}

/// Result of a wake operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Successfully woke N waiters (N >= 1)
    Woken(usize),
    /// No waiters were waiting
    NoWaiters,
}

impl WakeResult {
    #[inline]
    pub(crate) fn from_count(n: usize) -> Self {
        if n == 0 {
            WakeResult::NoWaiters
        } else {
            WakeResult::Woken(n)
        }
    }

    /// Check if any waiters were woken
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    /// Get number of woken waiters (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }
}

/// What a failed spinlock probe does before probing again
pub trait Relax {
    fn relax();
}

/// Burn a CPU spin hint; for backends with true parallelism
pub struct Spin;

impl Relax for Spin {
    #[inline(always)]
    fn relax() {
        std::hint::spin_loop();
    }
}

/// Yield the current cooperative task; a plain spin would monopolize the
/// OS thread hosting the runtime
pub struct Yield;

impl Relax for Yield {
    #[inline]
    fn relax() {
        super::runtime::yield_now();
    }
}

/// A backend's exclusive lock
///
/// Implementations track the owning task so misuse can be detected instead
/// of corrupting state. Failures are returned, never panicked on; the lock
/// probe in `Mutex` decides how loud to be.
pub trait RawLock: Send + Sync + Sized {
    /// Free, non-recursive lock
    const INIT: Self;
    /// Free, recursive lock
    const INIT_RECURSIVE: Self;

    /// Block until the calling task owns the lock.
    ///
    /// A non-recursive lock already held by the caller returns
    /// `SyncError::Deadlock` without touching the lock.
    fn lock(&self) -> SyncResult<()>;

    /// Acquire without blocking
    fn try_lock(&self) -> SyncResult<TryLock>;

    /// Release one level of ownership
    fn unlock(&self) -> SyncResult<()>;

    fn is_recursive(&self) -> bool;

    fn is_locked(&self) -> bool;

    fn is_owned_by_current(&self) -> bool;

    /// Levels held by the current owner; 0 when free
    fn depth(&self) -> usize;
}

/// A condition variable paired with a backend lock type
pub trait RawCond<L: RawLock>: Send + Sync + Sized {
    const INIT: Self;

    /// Atomically release `lock`, wait for a wake, reacquire `lock`.
    ///
    /// Returns `SyncError::NotOwner` without waiting if the caller does not
    /// hold `lock`, and `SyncError::NestedWait` if it holds more than one
    /// level of a recursive `lock`.
    fn wait(&self, lock: &L) -> SyncResult<()>;

    /// Wake at most one waiter
    fn signal(&self) -> WakeResult;

    /// Wake every current waiter
    fn broadcast(&self) -> WakeResult;

    /// Approximate number of tasks currently waiting (for diagnostics)
    fn waiter_count(&self) -> usize;
}

/// One concurrency substrate
pub trait Backend: Send + Sync + 'static {
    type Lock: RawLock;
    type Cond: RawCond<Self::Lock>;
    /// Policy between atomic spinlock probes
    type Relax: Relax;

    const NAME: &'static str;

    /// Make sure the runtime behind this backend is up. Idempotent.
    #[inline]
    fn ensure_init() {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_lock_busy_flag() {
        assert!(TryLock::Busy.is_busy());
        assert!(!TryLock::Acquired.is_busy());
        assert!(TryLock::Acquired.is_acquired());
    }

    #[test]
    fn test_wake_result_from_count() {
        assert_eq!(WakeResult::from_count(0), WakeResult::NoWaiters);
        assert_eq!(WakeResult::from_count(3), WakeResult::Woken(3));
        assert_eq!(WakeResult::Woken(3).count(), 3);
        assert!(!WakeResult::NoWaiters.is_woken());
    }
}
