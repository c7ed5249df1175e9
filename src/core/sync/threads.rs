/*!
 * Threads-In-Use Flag
 *
 * Process-wide answer to "are multiple tasks of execution active?".
 * Startup code writes it once; everything else only reads it. The
 * primitives in this crate are correct whatever its value; upper layers use
 * it to skip locking in single-task programs.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static USES_THREADS: AtomicBool = AtomicBool::new(false);

/// Record whether the program runs multiple tasks.
///
/// Single writer, at startup, before worker tasks exist.
pub fn set_uses_threads(enabled: bool) {
    let previous = USES_THREADS.swap(enabled, Ordering::Release);
    if previous != enabled {
        debug!(enabled, "threads-in-use flag changed");
    }
}

/// Whether the program declared that multiple tasks are active
#[inline(always)]
pub fn uses_threads() -> bool {
    USES_THREADS.load(Ordering::Acquire)
}
