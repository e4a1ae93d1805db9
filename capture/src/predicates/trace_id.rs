//! `trace_id()` predicate factory.

use predicates::{reflection::PredicateReflection, Predicate};

use std::fmt;

use bus_telemetry::{Span, TraceId};

/// Creates a predicate checking that a [`Span`] belongs to the specified trace.
/// Useful for asserting that spans from different pipeline runs (or different
/// processes) were linked into one trace.
///
/// # Examples
///
/// ```
/// # use bus_telemetry::{SpanBuilder, Tracer};
/// # use bus_telemetry_capture::{predicates::{trace_id, ScannerExt}, CaptureTracer, SharedStorage};
/// let storage = SharedStorage::default();
/// let tracer = CaptureTracer::new(&storage);
/// let root = tracer.start_span(SpanBuilder::new("DispatchPipeline")).unwrap();
/// let id = root.trace_id();
/// tracer.finish_span(root).unwrap();
///
/// let storage = storage.lock();
/// let _ = storage.spans().scanner().single(&trace_id(id));
/// ```
pub fn trace_id(expected: TraceId) -> TraceIdPredicate {
    TraceIdPredicate { expected }
}

/// Predicate for the trace of a [`Span`] returned by the [`trace_id()`] function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceIdPredicate {
    expected: TraceId,
}

impl_bool_ops!(TraceIdPredicate);

impl fmt::Display for TraceIdPredicate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "trace_id({})", self.expected)
    }
}

impl PredicateReflection for TraceIdPredicate {}

impl Predicate<Span> for TraceIdPredicate {
    fn eval(&self, variable: &Span) -> bool {
        variable.trace_id() == self.expected
    }
}
