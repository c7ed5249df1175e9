/*!
 * Spin Backend
 *
 * Cooperative runtime without a lock of its own. Every lock is an atomic
 * test-and-set word; a failed probe yields the task, and every release
 * yields once so a tight acquire/release loop cannot starve the other tasks
 * sharing the OS thread.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::atomic::AtomicLock;
use crate::core::sync::fifo::FifoCond;
use crate::core::sync::runtime;
use crate::core::sync::traits::{Backend, RawLock, TryLock, Yield};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Spinlock-only cooperative backend
pub struct SpinBackend;

impl Backend for SpinBackend {
    type Lock = SpinLock;
    type Cond = FifoCond;
    type Relax = Yield;

    const NAME: &'static str = "spin";

    #[inline]
    fn ensure_init() {
        runtime::ensure_init();
    }
}

/// Yielding spinlock with owner and depth bookkeeping
pub struct SpinLock {
    word: AtomicLock<Yield>,
    /// Holder's task id, 0 when free
    owner: AtomicUsize,
    /// Only touched by the owner
    depth: AtomicUsize,
    recursive: bool,
}

impl SpinLock {
    const fn with_mode(recursive: bool) -> Self {
        Self {
            word: AtomicLock::new(false),
            owner: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            recursive,
        }
    }

    /// Re-entry by the current owner; `None` when the caller is not owner
    fn reenter(&self, me: usize) -> Option<SyncResult<()>> {
        if self.owner.load(Ordering::Relaxed) != me {
            return None;
        }
        if !self.recursive {
            return Some(Err(SyncError::Deadlock { task: me }));
        }
        self.depth.fetch_add(1, Ordering::Relaxed);
        Some(Ok(()))
    }

    #[inline]
    fn take(&self, me: usize) {
        self.owner.store(me, Ordering::Relaxed);
        self.depth.store(1, Ordering::Relaxed);
    }
}

impl RawLock for SpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = SpinLock::with_mode(false);
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT_RECURSIVE: Self = SpinLock::with_mode(true);

    fn lock(&self) -> SyncResult<()> {
        let me = runtime::current_task();
        if let Some(result) = self.reenter(me) {
            return result;
        }
        self.word.lock();
        self.take(me);
        Ok(())
    }

    fn try_lock(&self) -> SyncResult<TryLock> {
        let me = runtime::current_task();
        if let Some(result) = self.reenter(me) {
            return result.map(|_| TryLock::Acquired);
        }
        match self.word.try_lock() {
            TryLock::Acquired => {
                self.take(me);
                Ok(TryLock::Acquired)
            }
            TryLock::Busy => {
                // Let the holder run, or a caller polling in a loop deadlocks
                runtime::yield_now();
                Ok(TryLock::Busy)
            }
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        let me = runtime::current_task();
        if self.owner.load(Ordering::Relaxed) != me {
            return Err(SyncError::NotOwner { task: me });
        }
        if self.depth.fetch_sub(1, Ordering::Relaxed) > 1 {
            return Ok(());
        }
        self.owner.store(0, Ordering::Relaxed);
        self.word.unlock();
        runtime::yield_now();
        Ok(())
    }

    fn is_recursive(&self) -> bool {
        self.recursive
    }

    fn is_locked(&self) -> bool {
        self.word.is_locked()
    }

    fn is_owned_by_current(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == runtime::current_task()
    }

    fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}
