//! Predicates for captured [`Span`]s.
//!
//! # Overview
//!
//! A predicate can be created with the functions from this module:
//!
//! - [`name()`] checks the span name
//! - [`kind()`] checks the span kind
//! - [`status()`] checks the recorded span status
//! - [`attr()`] checks a specific span attribute
//! - [`trace_id()`] checks the trace the span belongs to
//!
//! These predicates can be combined with bitwise operators, `&` and `|`. The
//! [`ScannerExt`] trait may be used to simplify assertions with predicates over the
//! spans in a [`Storage`](crate::Storage).
//!
//! [`Span`]: bus_telemetry::Span
//!
//! # Examples
//!
//! ```
//! # use predicates::str::starts_with;
//! # use bus_telemetry::{SpanKind, SpanStatus};
//! # use bus_telemetry_capture::{predicates::*, Storage};
//! # fn test_wrapper(storage: &Storage) {
//! // Predicates can be combined using bitwise operators:
//! let predicate = name(starts_with("Dispatch"))
//!     & kind(SpanKind::Producer)
//!     & status(SpanStatus::Unset)
//!     & attr("MessageType", "Orders.PlaceOrder");
//! // The resulting predicate can be used with the `ScannerExt` trait.
//! let storage: &Storage = // ...
//! #   storage;
//! let _ = storage.spans().scanner().first(&predicate);
//! # }
//! ```

use predicates::Predicate;

use bus_telemetry::Span;

#[macro_use]
mod combinators;
mod attr;
mod ext;
mod kind;
mod name;
mod status;
mod trace_id;


pub use self::{
    attr::{attr, AttrPredicate, IntoAttrPredicate},
    combinators::{And, Or},
    ext::{Scanner, ScannerExt},
    kind::{kind, KindPredicate},
    name::{name, NamePredicate},
    status::{status, IntoStatusPredicate, StatusPredicate},
    trace_id::{trace_id, TraceIdPredicate},
};

/// Converts a predicate into an `Fn(_) -> bool` closure, usable in APIs (e.g.,
/// [`Iterator`] combinators) that expect a closure as an argument.
pub fn into_fn(predicate: impl Predicate<Span>) -> impl Fn(&Span) -> bool {
    move |span| predicate.eval(span)
}
