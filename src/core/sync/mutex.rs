/*!
 * Mutex
 *
 * Backend-independent lock. Each mutex carries two independent locks:
 *
 * - the backend lock (`lock`/`try_lock`/`unlock`), which may be recursive
 *   and is the one condition variables release and reacquire;
 * - an atomic spinlock (`atomic_lock`/`atomic_try_lock`/`atomic_unlock`),
 *   the lowest-latency uncontended path on every backend.
 *
 * They guard unrelated critical sections. Never protect one invariant with
 * both.
 */

use super::atomic::AtomicLock;
use super::backends::ActiveBackend;
use super::probe::{ActiveProbe, LockProbe, LockSite};
use super::threads;
use super::traits::{Backend, RawLock, TryLock};
use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;

/// Exclusive lock, binary or recursive
///
/// # Examples
///
/// ```
/// use portable_sync::Mutex;
///
/// static TABLE_LOCK: Mutex = Mutex::new();
///
/// TABLE_LOCK.lock();
/// // ... critical section ...
/// TABLE_LOCK.unlock();
///
/// let nested: Mutex = Mutex::init(true);
/// nested.lock();
/// nested.lock();
/// nested.unlock();
/// nested.unlock();
/// ```
pub struct Mutex<B: Backend = ActiveBackend, P: LockProbe = ActiveProbe> {
    raw: B::Lock,
    atomic: AtomicLock<B::Relax>,
    meta: P::Meta,
}

impl<B: Backend, P: LockProbe> Mutex<B, P> {
    /// Free, non-recursive mutex; usable in `static`s
    pub const fn new() -> Self {
        Self {
            raw: <B::Lock as RawLock>::INIT,
            atomic: AtomicLock::new(false),
            meta: P::META_INIT,
        }
    }

    /// Free, recursive mutex; usable in `static`s
    pub const fn new_recursive() -> Self {
        Self {
            raw: <B::Lock as RawLock>::INIT_RECURSIVE,
            atomic: AtomicLock::new(false),
            meta: P::META_INIT,
        }
    }

    /// Free mutex; `recursive` is fixed for the mutex's lifetime
    pub fn init(recursive: bool) -> Self {
        if recursive {
            Self::new_recursive()
        } else {
            Self::new()
        }
    }

    /// Block until the calling task owns the mutex.
    ///
    /// A recursive mutex already held by the caller just gains a level.
    #[track_caller]
    #[inline]
    pub fn lock(&self) {
        B::ensure_init();
        let result = self.raw.lock();
        P::locked(&self.meta, "lock", result, Location::caller());
    }

    /// Acquire without blocking
    #[track_caller]
    #[inline]
    pub fn try_lock(&self) -> TryLock {
        B::ensure_init();
        let result = self.raw.try_lock();
        P::try_locked(&self.meta, result, Location::caller())
    }

    /// Release one level of ownership; only the owner may call this
    #[track_caller]
    #[inline]
    pub fn unlock(&self) {
        let result = self.raw.unlock();
        P::unlocked(&self.meta, "unlock", result, Location::caller());
    }

    /// Consume the mutex
    pub fn destroy(self) {
        drop(self);
    }

    /// Lock and return a guard that unlocks on drop
    #[track_caller]
    pub fn guard(&self) -> MutexGuard<'_, B, P> {
        self.lock();
        MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Like `guard`, but skips locking entirely in single-task programs
    #[track_caller]
    pub fn guard_if_threaded(&self) -> Option<MutexGuard<'_, B, P>> {
        threads::uses_threads().then(|| self.guard())
    }

    /// Spin on the atomic lock
    #[inline(always)]
    pub fn atomic_lock(&self) {
        self.atomic.lock();
    }

    #[inline(always)]
    pub fn atomic_try_lock(&self) -> TryLock {
        self.atomic.try_lock()
    }

    #[inline(always)]
    pub fn atomic_unlock(&self) {
        self.atomic.unlock();
    }

    pub fn is_recursive(&self) -> bool {
        self.raw.is_recursive()
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    pub fn is_owned_by_current(&self) -> bool {
        self.raw.is_owned_by_current()
    }

    /// Last acquisition site; always `None` without instrumentation
    pub fn last_site(&self) -> Option<LockSite> {
        P::site(&self.meta)
    }

    #[inline(always)]
    pub(crate) fn raw(&self) -> &B::Lock {
        &self.raw
    }

    #[inline(always)]
    pub(crate) fn meta(&self) -> &P::Meta {
        &self.meta
    }
}

impl<B: Backend, P: LockProbe> Default for Mutex<B, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend, P: LockProbe> Drop for Mutex<B, P> {
    fn drop(&mut self) {
        P::destroyed(&self.meta, self.raw.is_locked());
    }
}

impl<B: Backend, P: LockProbe> fmt::Debug for Mutex<B, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("backend", &B::NAME)
            .field("recursive", &self.is_recursive())
            .field("locked", &self.is_locked())
            .field("last_site", &self.last_site())
            .finish()
    }
}

/// Holds one level of a `Mutex` until dropped
///
/// Not `Send`: the task that locked must be the one that unlocks.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, B: Backend = ActiveBackend, P: LockProbe = ActiveProbe> {
    mutex: &'a Mutex<B, P>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, B: Backend, P: LockProbe> MutexGuard<'a, B, P> {
    pub fn mutex(&self) -> &'a Mutex<B, P> {
        self.mutex
    }
}

impl<B: Backend, P: LockProbe> Drop for MutexGuard<'_, B, P> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
