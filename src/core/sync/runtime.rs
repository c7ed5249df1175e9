/*!
 * Cooperative Runtime Hooks
 *
 * The cooperative backends never block: they yield the current user-level
 * task and poll again. The runtime that owns those tasks lives outside this
 * crate, so it plugs in through three hooks installed once at startup.
 *
 * Without an installed runtime the hooks map onto OS threads, which keeps
 * the cooperative algorithms correct (just less efficient) under true
 * parallelism.
 */

use crate::core::errors::{SyncError, SyncResult};
use parking_lot::lock_api::GetThreadId;
use parking_lot::{Once, RawThreadId};
use std::num::NonZeroUsize;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Entry points into the user-level threading runtime
#[derive(Debug, Clone, Copy)]
pub struct RuntimeHooks {
    /// Bring the runtime up; called exactly once, lazily
    pub init: fn(),
    /// Give other runnable tasks a chance to run
    pub yield_now: fn(),
    /// Identity of the running task; never zero, unique among live tasks
    pub current_task: fn() -> NonZeroUsize,
}

impl RuntimeHooks {
    /// Hooks backed by OS threads
    pub const fn os_threads() -> Self {
        Self {
            init: noop_init,
            yield_now: std::thread::yield_now,
            current_task: os_thread_id,
        }
    }
}

impl Default for RuntimeHooks {
    fn default() -> Self {
        Self::os_threads()
    }
}

fn noop_init() {}

/// Per-thread identity, same scheme parking_lot uses for reentrant locks
#[inline]
pub(crate) fn os_thread_id() -> NonZeroUsize {
    RawThreadId::INIT.nonzero_thread_id()
}

static HOOKS: OnceLock<RuntimeHooks> = OnceLock::new();
static INIT: Once = Once::new();

#[inline]
fn hooks() -> &'static RuntimeHooks {
    HOOKS.get_or_init(RuntimeHooks::os_threads)
}

/// Install the runtime hooks.
///
/// Must happen before the first cooperative lock or wait; afterwards the
/// default OS-thread hooks are locked in and this returns
/// `SyncError::RuntimeAlreadyInstalled`.
pub fn install(runtime: RuntimeHooks) -> SyncResult<()> {
    HOOKS
        .set(runtime)
        .map_err(|_| SyncError::RuntimeAlreadyInstalled)?;
    info!("Cooperative runtime hooks installed");
    Ok(())
}

/// Whether custom hooks were installed (or defaults were locked in)
pub fn is_installed() -> bool {
    HOOKS.get().is_some()
}

/// Run the runtime's init hook once; later calls return immediately
#[inline]
pub fn ensure_init() {
    if INIT.state().done() {
        return;
    }
    INIT.call_once(|| {
        (hooks().init)();
        debug!("Cooperative runtime initialized");
    });
}

/// Yield the calling task
#[inline]
pub fn yield_now() {
    (hooks().yield_now)()
}

/// Identity of the calling task
#[inline]
pub fn current_task() -> usize {
    (hooks().current_task)().get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_task_ids_differ_across_threads() {
        let here = current_task();
        let there = thread::spawn(current_task).join().unwrap();
        assert_ne!(here, 0);
        assert_ne!(here, there);
        assert_eq!(here, current_task());
    }

    #[test]
    fn test_ensure_init_is_idempotent() {
        ensure_init();
        ensure_init();
        assert!(INIT.state().done());
    }

    #[test]
    fn test_install_after_use_is_rejected() {
        yield_now();
        assert!(is_installed());
        assert_eq!(
            install(RuntimeHooks::os_threads()),
            Err(SyncError::RuntimeAlreadyInstalled)
        );
    }
}
