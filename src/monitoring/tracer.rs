/*!
 * Structured Tracing
 * Subscriber setup and timed spans using the tracing crate
 *
 * Features:
 * - Env-filtered, human-readable logs for development
 * - JSON-formatted logs for structured parsing
 * - Timed phase spans with slow-phase warnings
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable that switches log output to JSON
pub const TRACE_JSON_VAR: &str = "SYNC_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SYNC_TRACE_JSON: Enable JSON output (default: false)
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_VAR)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        let installed = registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok();
        if installed {
            info!("Structured tracing initialized with JSON output");
        }
    } else {
        let installed = registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok();
        if installed {
            info!("Structured tracing initialized");
        }
    }
}

/// Timed span around one phase of work (a stress run, a benchmark pass)
pub struct PhaseSpan {
    span: tracing::Span,
    start: Instant,
    phase: &'static str,
    slow_after: Duration,
}

impl PhaseSpan {
    pub fn new(phase: &'static str, backend: &'static str) -> Self {
        let span = span!(
            Level::DEBUG,
            "phase",
            phase = phase,
            backend = backend,
            duration_ms = tracing::field::Empty,
            operations = tracing::field::Empty,
            result = tracing::field::Empty,
        );

        span.in_scope(|| debug!(phase, backend, "phase started"));

        Self {
            span,
            start: Instant::now(),
            phase,
            slow_after: Duration::from_secs(5),
        }
    }

    /// Warn on drop if the phase runs longer than `limit`
    pub fn slow_after(mut self, limit: Duration) -> Self {
        self.slow_after = limit;
        self
    }

    pub fn record_operations(&self, count: usize) {
        self.span.record("operations", count);
    }

    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "failure" });
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for PhaseSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_ms", duration.as_millis() as u64);

        if duration > self.slow_after {
            warn!(
                phase = self.phase,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow phase detected"
            );
        } else {
            debug!(
                phase = self.phase,
                duration_us = duration.as_micros() as u64,
                "phase completed"
            );
        }
    }
}

/// Helper to create a phase span
#[inline]
pub fn span_phase(phase: &'static str, backend: &'static str) -> PhaseSpan {
    PhaseSpan::new(phase, backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn test_phase_span_records() {
        let phase = span_phase("unit", "native").slow_after(Duration::from_secs(60));
        phase.record_operations(3);
        phase.record_result(true);
        assert!(phase.elapsed() < Duration::from_secs(60));
    }
}
