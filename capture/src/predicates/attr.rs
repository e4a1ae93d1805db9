//! `attr()` predicate factory.

use predicates::{reflection::PredicateReflection, Predicate};

use std::fmt;

use bus_telemetry::{AttributeValue, Span};

/// Conversion into a predicate for an [`AttributeValue`] used in the [`attr()`] function.
pub trait IntoAttrPredicate {
    /// Predicate output of the conversion. The exact type should be considered
    /// an implementation detail and should not be relied upon.
    type Predicate: Predicate<AttributeValue>;
    /// Performs the conversion.
    fn into_predicate(self) -> Self::Predicate;
}

impl<P: Predicate<AttributeValue>> IntoAttrPredicate for [P; 1] {
    type Predicate = P;

    fn into_predicate(self) -> Self::Predicate {
        self.into_iter().next().unwrap()
    }
}

macro_rules! impl_into_attr_predicate {
    ($($ty:ty),+) => {
        $(
        impl IntoAttrPredicate for $ty {
            type Predicate = EquivPredicate;

            fn into_predicate(self) -> Self::Predicate {
                EquivPredicate { value: self.into() }
            }
        }
        )+
    };
}

impl_into_attr_predicate!(bool, i64, &str, String);

/// Creates a predicate for a particular attribute of a [`Span`].
///
/// # Arguments
///
/// The second argument of this function is essentially a predicate for the
/// [`AttributeValue`] of the attribute. It may be:
///
/// - `bool`, `i64`, `&str`, `String`: will be compared to the attribute value using
///   the corresponding [`PartialEq`] implementation.
/// - Any `Predicate` for [`AttributeValue`]. To bypass Rust orphaning rules,
///   the predicate must be enclosed in square brackets (i.e., a one-value array).
///
/// The predicate is false if the span has no attribute with the specified name.
///
/// # Examples
///
/// ```
/// # use bus_telemetry::{SpanBuilder, Tracer};
/// # use bus_telemetry_capture::{predicates::{attr, ScannerExt}, CaptureTracer, SharedStorage};
/// let storage = SharedStorage::default();
/// let tracer = CaptureTracer::new(&storage);
/// let mut span = tracer.start_span(SpanBuilder::new("Assemble")).unwrap();
/// span.set_attribute("MessageType", "Orders.PlaceOrder");
/// tracer.finish_span(span).unwrap();
///
/// let storage = storage.lock();
/// let spans = storage.spans().scanner();
/// let _ = spans.single(&attr("MessageType", "Orders.PlaceOrder"));
/// ```
pub fn attr<P: IntoAttrPredicate>(name: &'static str, matches: P) -> AttrPredicate<P::Predicate> {
    AttrPredicate {
        name,
        matches: matches.into_predicate(),
    }
}

/// Predicate for a particular attribute of a [`Span`] returned by the [`attr()`]
/// function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrPredicate<P> {
    name: &'static str,
    matches: P,
}

impl_bool_ops!(AttrPredicate<P>);

impl<P: Predicate<AttributeValue>> fmt::Display for AttrPredicate<P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "attributes.{}({})", self.name, self.matches)
    }
}

impl<P: Predicate<AttributeValue>> PredicateReflection for AttrPredicate<P> {}

impl<P: Predicate<AttributeValue>> Predicate<Span> for AttrPredicate<P> {
    fn eval(&self, variable: &Span) -> bool {
        variable
            .attributes()
            .get(self.name)
            .map_or(false, |value| self.matches.eval(value))
    }
}

#[doc(hidden)] // implementation detail
#[derive(Debug, Clone, PartialEq)]
pub struct EquivPredicate {
    value: AttributeValue,
}

impl fmt::Display for EquivPredicate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "var == {:?}", self.value)
    }
}

impl PredicateReflection for EquivPredicate {}

impl Predicate<AttributeValue> for EquivPredicate {
    fn eval(&self, variable: &AttributeValue) -> bool {
        self.value == *variable
    }
}
