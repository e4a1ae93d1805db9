//! `kind()` predicate factory.

use predicates::reflection::PredicateReflection;
use predicates::Predicate;

use std::fmt;

use bus_telemetry::{Span, SpanKind};

/// Creates a predicate checking the kind of a [`Span`].
///
/// # Examples
///
/// ```
/// # use bus_telemetry::{SpanBuilder, SpanKind, Tracer};
/// # use bus_telemetry_capture::{predicates::{kind, ScannerExt}, CaptureTracer, SharedStorage};
/// let storage = SharedStorage::default();
/// let tracer = CaptureTracer::new(&storage);
/// let builder = SpanBuilder::new("Handle").kind(SpanKind::Consumer);
/// let span = tracer.start_span(builder).unwrap();
/// tracer.finish_span(span).unwrap();
///
/// let storage = storage.lock();
/// let _ = storage.spans().scanner().single(&kind(SpanKind::Consumer));
/// ```
pub fn kind(expected: SpanKind) -> KindPredicate {
    KindPredicate { expected }
}

/// Predicate for the kind of a [`Span`] returned by the [`kind()`] function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPredicate {
    expected: SpanKind,
}

impl_bool_ops!(KindPredicate);

impl fmt::Display for KindPredicate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "kind({:?})", self.expected)
    }
}

impl PredicateReflection for KindPredicate {}

impl Predicate<Span> for KindPredicate {
    fn eval(&self, variable: &Span) -> bool {
        variable.kind() == self.expected
    }
}
