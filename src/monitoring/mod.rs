/*!
 * Monitoring
 * Structured logging setup and timed spans
 */

mod tracer;

pub use tracer::{init_tracing, span_phase, PhaseSpan, TRACE_JSON_VAR};
