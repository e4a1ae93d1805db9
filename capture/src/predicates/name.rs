//! `name()` predicate factory.

use predicates::{reflection::PredicateReflection, Predicate};

use std::fmt;

use bus_telemetry::Span;

/// Creates a predicate for the name of a [`Span`].
///
/// # Arguments
///
/// The argument of this function can be any `str`ing predicate, e.g. `eq("Handle")` for
/// exact comparison.
///
/// # Examples
///
/// ```
/// # use predicates::{ord::eq, str::ends_with};
/// # use bus_telemetry::{SpanBuilder, Tracer};
/// # use bus_telemetry_capture::{predicates::{name, ScannerExt}, CaptureTracer, SharedStorage};
/// let storage = SharedStorage::default();
/// let tracer = CaptureTracer::new(&storage);
/// let span = tracer.start_span(SpanBuilder::new("DispatchPipeline")).unwrap();
/// tracer.finish_span(span).unwrap();
///
/// let storage = storage.lock();
/// // Both of these access the single captured span.
/// let spans = storage.spans().scanner();
/// let _ = spans.single(&name(eq("DispatchPipeline")));
/// let _ = spans.single(&name(ends_with("Pipeline")));
/// ```
pub fn name<P: Predicate<str>>(matches: P) -> NamePredicate<P> {
    NamePredicate { matches }
}

/// Predicate for the name of a [`Span`] returned by the [`name()`] function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamePredicate<P> {
    matches: P,
}

impl_bool_ops!(NamePredicate<P>);

impl<P: Predicate<str>> fmt::Display for NamePredicate<P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "name({})", self.matches)
    }
}

impl<P: Predicate<str>> PredicateReflection for NamePredicate<P> {}

impl<P: Predicate<str>> Predicate<Span> for NamePredicate<P> {
    fn eval(&self, variable: &Span) -> bool {
        self.matches.eval(variable.name())
    }
}
