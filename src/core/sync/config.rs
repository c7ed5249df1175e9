/*!
 * Synchronization Configuration
 *
 * Startup settings for the sync layer. The backend itself is fixed at build
 * time; the rest is read from the environment:
 *
 * - `SYNC_USES_THREADS`: `1|true|yes|on` or `0|false|no|off` (default false)
 * - `SYNC_STRESS_WORKERS`: worker tasks for `sync-stress` (default 4)
 * - `SYNC_STRESS_ITERATIONS`: iterations per worker (default 10000)
 */

use super::backends::ActiveBackend;
use super::threads;
use super::traits::Backend;
use crate::core::errors::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use tracing::info;

pub const USES_THREADS_VAR: &str = "SYNC_USES_THREADS";
pub const STRESS_WORKERS_VAR: &str = "SYNC_STRESS_WORKERS";
pub const STRESS_ITERATIONS_VAR: &str = "SYNC_STRESS_ITERATIONS";

/// Backend type selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OS threads
    Native,
    /// Cooperative tasks, spinlock-only
    Spin,
    /// Cooperative tasks, runtime ticket lock
    Tasklet,
}

impl BackendKind {
    /// Backend compiled in as `ActiveBackend`
    pub fn active() -> Self {
        match <ActiveBackend as Backend>::NAME {
            "spin" => BackendKind::Spin,
            "tasklet" => BackendKind::Tasklet,
            _ => BackendKind::Native,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Spin => "spin",
            BackendKind::Tasklet => "tasklet",
        }
    }

    /// Whether waits yield a user-level task instead of parking a thread
    pub const fn is_cooperative(self) -> bool {
        !matches!(self, BackendKind::Native)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Compiled-in backend; informational
    pub backend: BackendKind,
    /// Value for the threads-in-use flag
    pub uses_threads: bool,
    /// Worker tasks for the stress binary
    pub stress_workers: usize,
    /// Iterations per stress worker
    pub stress_iterations: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::active(),
            uses_threads: false,
            stress_workers: 4,
            stress_iterations: 10_000,
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by the `SYNC_*` environment variables
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(USES_THREADS_VAR) {
            config.uses_threads = parse_flag(USES_THREADS_VAR, &raw)?;
        }
        if let Some(raw) = lookup(STRESS_WORKERS_VAR) {
            config.stress_workers = parse_count(STRESS_WORKERS_VAR, &raw)?;
        }
        if let Some(raw) = lookup(STRESS_ITERATIONS_VAR) {
            config.stress_iterations = parse_count(STRESS_ITERATIONS_VAR, &raw)?;
        }

        Ok(config)
    }

    /// Publish the threads flag and log the effective configuration
    pub fn apply(&self) {
        threads::set_uses_threads(self.uses_threads);
        info!(
            backend = %self.backend,
            uses_threads = self.uses_threads,
            stress_workers = self.stress_workers,
            stress_iterations = self.stress_iterations,
            "Sync configuration applied"
        );
    }
}

fn parse_flag(key: &str, raw: &str) -> SyncResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(SyncError::InvalidConfig(format!(
            "{key}={other} is not a boolean"
        ))),
    }
}

fn parse_count(key: &str, raw: &str) -> SyncResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(SyncError::InvalidConfig(format!("{key} must be at least 1"))),
        Ok(n) => Ok(n),
        Err(e) => Err(SyncError::InvalidConfig(format!("{key}={raw}: {e}"))),
    }
}
