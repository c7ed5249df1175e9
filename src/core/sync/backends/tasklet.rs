/*!
 * Tasklet Backend
 *
 * Cooperative runtime that ships its own mutex: a ticket lock whose waiters
 * yield instead of spinning, so contended tasks are served in arrival
 * order. Releases yield once for fairness, like the spin backend.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::fifo::FifoCond;
use crate::core::sync::runtime;
use crate::core::sync::traits::{Backend, RawLock, TryLock, Yield};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cooperative backend with a runtime-native ticket mutex
pub struct TaskletBackend;

impl Backend for TaskletBackend {
    type Lock = TicketLock;
    type Cond = FifoCond;
    type Relax = Yield;

    const NAME: &'static str = "tasklet";

    #[inline]
    fn ensure_init() {
        runtime::ensure_init();
    }
}

/// FIFO ticket lock with owner and depth bookkeeping
pub struct TicketLock {
    next_ticket: AtomicUsize,
    now_serving: AtomicUsize,
    owner: AtomicUsize,
    depth: AtomicUsize,
    recursive: bool,
}

impl TicketLock {
    const fn with_mode(recursive: bool) -> Self {
        Self {
            next_ticket: AtomicUsize::new(0),
            now_serving: AtomicUsize::new(0),
            owner: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            recursive,
        }
    }

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

    /// Tasks holding or queued for the lock
    pub fn queued(&self) -> usize {
        self.next_ticket
            .load(Ordering::Relaxed)
            .wrapping_sub(self.now_serving.load(Ordering::Relaxed))
    }
}

impl RawLock for TicketLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = TicketLock::with_mode(false);
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT_RECURSIVE: Self = TicketLock::with_mode(true);

    fn lock(&self) -> SyncResult<()> {
        let me = runtime::current_task();
        if let Some(result) = self.reenter(me) {
            return result;
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        while self.now_serving.load(Ordering::Acquire) != ticket {
            runtime::yield_now();
        }
        self.take(me);
        Ok(())
    }

    fn try_lock(&self) -> SyncResult<TryLock> {
        let me = runtime::current_task();
        if let Some(result) = self.reenter(me) {
            return result.map(|_| TryLock::Acquired);
        }
        let serving = self.now_serving.load(Ordering::Relaxed);
        match self.next_ticket.compare_exchange(
            serving,
            serving.wrapping_add(1),
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                self.take(me);
                Ok(TryLock::Acquired)
            }
            Err(_) => Ok(TryLock::Busy),
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
        self.now_serving.fetch_add(1, Ordering::Release);
        runtime::yield_now();
        Ok(())
    }

    fn is_recursive(&self) -> bool {
        self.recursive
    }

    fn is_locked(&self) -> bool {
        self.queued() != 0
    }

    fn is_owned_by_current(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == runtime::current_task()
    }

    fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}
