//! Best-effort guard absorbing instrumentation failures.
//!
//! This is the single place the no-throw contract is defined: every public observer
//! entry point and the heartbeat tick route their fallible body through
//! [`best_effort()`], so the host pipeline observes no behavioral difference whether
//! instrumentation succeeds or fails.

use crate::tracer::TraceError;

/// Absorbs a failed instrumentation operation, emitting at most a debug-level
/// [`tracing`] event. Returns the operation's output on success.
pub fn best_effort<T>(operation: &str, result: Result<T, TraceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(%err, operation, "instrumentation failure absorbed");
            None
        }
    }
}
