/*!
 * Lock Instrumentation
 *
 * Every `Mutex` operation passes its backend result through a `LockProbe`.
 * Two probes exist:
 *
 * - `Instrumented`: checks every backend result, reports failures through
 *   `tracing`, asserts on usage errors, and remembers where the lock was
 *   last taken. Active with `debug_assertions` or the `lock-debug` feature.
 * - `Bare`: zero-sized metadata and empty hooks; failures are ignored and
 *   execution carries on as if the call succeeded.
 *
 * Site metadata is only written while the lock is held, inside the same
 * critical section as the operation it describes.
 */

use super::traits::TryLock;
use crate::core::errors::SyncResult;
use serde::Serialize;
use std::panic::Location;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use tracing::{error, warn};

/// Where and how often a lock was acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockSite {
    pub file: &'static str,
    pub line: u32,
    /// Successful acquisitions so far
    pub count: u64,
}

/// Hooks wrapped around every mutex operation
pub trait LockProbe: Send + Sync + 'static {
    /// Per-lock debug metadata
    type Meta: Send + Sync;

    #[allow(clippy::declare_interior_mutable_const)]
    const META_INIT: Self::Meta;

    fn locked(
        meta: &Self::Meta,
        op: &'static str,
        result: SyncResult<()>,
        at: &'static Location<'static>,
    );

    fn try_locked(
        meta: &Self::Meta,
        result: SyncResult<TryLock>,
        at: &'static Location<'static>,
    ) -> TryLock;

    fn unlocked(
        meta: &Self::Meta,
        op: &'static str,
        result: SyncResult<()>,
        at: &'static Location<'static>,
    );

    /// Called when a mutex is destroyed
    fn destroyed(meta: &Self::Meta, still_locked: bool);

    fn site(meta: &Self::Meta) -> Option<LockSite>;
}

/// Debug metadata kept by `Instrumented`
pub struct SiteCell {
    location: AtomicPtr<Location<'static>>,
    count: AtomicU64,
}

impl SiteCell {
    const fn new() -> Self {
        Self {
            location: AtomicPtr::new(ptr::null_mut()),
            count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record(&self, at: &'static Location<'static>) {
        self.location
            .store(at as *const Location<'static> as *mut _, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Option<LockSite> {
        let location = self.location.load(Ordering::Relaxed);
        // SAFETY: only ever set from a `&'static Location`
        let location = unsafe { location.as_ref() }?;
        Some(LockSite {
            file: location.file(),
            line: location.line(),
            count: self.count.load(Ordering::Relaxed),
        })
    }
}

/// Checked probe for debug builds
pub struct Instrumented;

impl LockProbe for Instrumented {
    type Meta = SiteCell;

    #[allow(clippy::declare_interior_mutable_const)]
    const META_INIT: SiteCell = SiteCell::new();

    fn locked(
        meta: &SiteCell,
        op: &'static str,
        result: SyncResult<()>,
        at: &'static Location<'static>,
    ) {
        match result {
            Ok(()) => meta.record(at),
            Err(err) => {
                error!(
                    op,
                    error = %err,
                    file = at.file(),
                    line = at.line(),
                    last_site = ?meta.snapshot(),
                    "lock operation failed"
                );
                if err.is_usage_error() {
                    panic!("{op}() failed at {at}: {err}");
                }
            }
        }
    }

    fn try_locked(
        meta: &SiteCell,
        result: SyncResult<TryLock>,
        at: &'static Location<'static>,
    ) -> TryLock {
        match result {
            Ok(TryLock::Acquired) => {
                meta.record(at);
                TryLock::Acquired
            }
            Ok(TryLock::Busy) => TryLock::Busy,
            Err(err) => {
                error!(
                    op = "try_lock",
                    error = %err,
                    file = at.file(),
                    line = at.line(),
                    "try_lock failed, reporting busy"
                );
                TryLock::Busy
            }
        }
    }

    fn unlocked(
        _meta: &SiteCell,
        op: &'static str,
        result: SyncResult<()>,
        at: &'static Location<'static>,
    ) {
        if let Err(err) = result {
            error!(
                op,
                error = %err,
                file = at.file(),
                line = at.line(),
                "unlock operation failed"
            );
            if err.is_usage_error() {
                panic!("{op}() failed at {at}: {err}");
            }
        }
    }

    fn destroyed(meta: &SiteCell, still_locked: bool) {
        if still_locked {
            warn!(last_site = ?meta.snapshot(), "mutex destroyed while locked");
        }
    }

    fn site(meta: &SiteCell) -> Option<LockSite> {
        meta.snapshot()
    }
}

/// Unchecked probe for release builds
pub struct Bare;

impl LockProbe for Bare {
    type Meta = ();

    const META_INIT: () = ();

    #[inline(always)]
    fn locked(_: &(), _: &'static str, _: SyncResult<()>, _: &'static Location<'static>) {}

    #[inline(always)]
    fn try_locked(_: &(), result: SyncResult<TryLock>, _: &'static Location<'static>) -> TryLock {
        result.unwrap_or(TryLock::Busy)
    }

    #[inline(always)]
    fn unlocked(_: &(), _: &'static str, _: SyncResult<()>, _: &'static Location<'static>) {}

    #[inline(always)]
    fn destroyed(_: &(), _: bool) {}

    #[inline(always)]
    fn site(_: &()) -> Option<LockSite> {
        None
    }
}

/// Probe selected by the build
#[cfg(any(debug_assertions, feature = "lock-debug"))]
pub type ActiveProbe = Instrumented;

/// Probe selected by the build
#[cfg(not(any(debug_assertions, feature = "lock-debug")))]
pub type ActiveProbe = Bare;
