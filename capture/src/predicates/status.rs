//! `status()` predicate factory.

use predicates::{reflection::PredicateReflection, Predicate};

use std::fmt;

use bus_telemetry::{Span, SpanStatus};

/// Conversion into a predicate for [`SpanStatus`]es used in the [`status()`] function.
pub trait IntoStatusPredicate {
    /// Predicate output of the conversion. The exact type should be considered
    /// an implementation detail and should not be relied upon.
    type Predicate: Predicate<SpanStatus>;
    /// Performs the conversion.
    fn into_predicate(self) -> Self::Predicate;
}

impl<P: Predicate<SpanStatus>> IntoStatusPredicate for [P; 1] {
    type Predicate = P;

    fn into_predicate(self) -> Self::Predicate {
        self.into_iter().next().unwrap()
    }
}

impl IntoStatusPredicate for SpanStatus {
    type Predicate = predicates::ord::EqPredicate<SpanStatus>;

    fn into_predicate(self) -> Self::Predicate {
        predicates::ord::eq(self)
    }
}

/// Creates a predicate for the recorded status of a [`Span`].
///
/// # Arguments
///
/// The argument of this function may be:
///
/// - [`SpanStatus`]: will be compared exactly
/// - Any `Predicate` for [`SpanStatus`]. To bypass Rust orphaning rules, the predicate
///   must be enclosed in square brackets (i.e., a one-value array).
///
/// # Examples
///
/// ```
/// # use predicates::function::function;
/// # use bus_telemetry::{SpanBuilder, SpanStatus, Tracer};
/// # use bus_telemetry_capture::{predicates::{status, ScannerExt}, CaptureTracer, SharedStorage};
/// let storage = SharedStorage::default();
/// let tracer = CaptureTracer::new(&storage);
/// let mut span = tracer.start_span(SpanBuilder::new("Handle")).unwrap();
/// span.set_status(SpanStatus::Error {
///     message: "handler failure".to_owned(),
/// });
/// tracer.finish_span(span).unwrap();
///
/// let storage = storage.lock();
/// let spans = storage.spans().scanner();
/// let _ = spans.single(&status([function(|status: &SpanStatus| {
///     matches!(status, SpanStatus::Error { .. })
/// })]));
/// ```
pub fn status<P: IntoStatusPredicate>(matches: P) -> StatusPredicate<P::Predicate> {
    StatusPredicate {
        matches: matches.into_predicate(),
    }
}

/// Predicate for the status of a [`Span`] returned by the [`status()`] function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPredicate<P> {
    matches: P,
}

impl_bool_ops!(StatusPredicate<P>);

impl<P: Predicate<SpanStatus>> fmt::Display for StatusPredicate<P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "status({})", self.matches)
    }
}

impl<P: Predicate<SpanStatus>> PredicateReflection for StatusPredicate<P> {}

impl<P: Predicate<SpanStatus>> Predicate<Span> for StatusPredicate<P> {
    fn eval(&self, variable: &Span) -> bool {
        self.matches.eval(variable.status())
    }
}
