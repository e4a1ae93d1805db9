//! Capturing [`Tracer`] backend for testing `bus-telemetry` instrumentation.
//!
//! [`CaptureTracer`] assigns real trace / span identifiers and collects every finished
//! [`Span`] into a [`SharedStorage`], so tests can assert on the spans a pipeline run
//! produced. The [`predicates`] module provides composable span predicates for those
//! assertions. [`FailingTracer`] errors on every call, which is handy for checking that
//! instrumentation failures never escape into the host pipeline.
//!
//! # Examples
//!
//! ```
//! use bus_telemetry::{
//!     DispatchObserver, EndpointIdentity, ExecutionContext, SpanKind, TransportMessage,
//! };
//! use bus_telemetry_capture::{predicates::*, CaptureTracer, SharedStorage};
//! use predicates::ord::eq;
//! use std::sync::Arc;
//!
//! let storage = SharedStorage::default();
//! let tracer = Arc::new(CaptureTracer::new(&storage));
//! let observer = DispatchObserver::new(tracer, Arc::new(EndpointIdentity::default()));
//!
//! let mut cx = ExecutionContext::new();
//! let mut message = TransportMessage::new("message-1", "Orders.PlaceOrder");
//! observer.on_pipeline_starting(&mut cx, &mut message);
//! observer.on_route_found(&mut cx, &message);
//! observer.on_message_serialized(&mut cx);
//! observer.on_message_dispatched(&mut cx);
//!
//! // Inspect the captured spans.
//! let storage = storage.lock();
//! assert_eq!(storage.spans().len(), 4);
//! let predicate = name(eq("DispatchPipeline")) & kind(SpanKind::Producer);
//! let root = storage.spans().scanner().single(&predicate);
//! assert!(root.is_closed());
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::{
    ops,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use bus_telemetry::{Span, SpanBuilder, SpanId, SpanParent, TraceError, TraceId, Tracer};

pub mod predicates;

/// Storage of spans finished by a [`CaptureTracer`], in the order they were finished.
#[derive(Debug, Default)]
pub struct Storage {
    spans: Vec<Span>,
}

impl Storage {
    /// Returns the finished spans in the order the tracer received them. Since a span
    /// is finished when it closes, child spans precede their parent.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }
}

/// Shared handle to a [`Storage`]; cheaply cloneable.
#[derive(Debug, Clone, Default)]
pub struct SharedStorage {
    inner: Arc<Mutex<Storage>>,
}

impl SharedStorage {
    /// Locks the underlying [`Storage`] for exclusive access. While the lock is held,
    /// capturing cannot progress; beware of deadlocks!
    pub fn lock(&self) -> impl ops::Deref<Target = Storage> + '_ {
        self.inner.lock().unwrap()
    }
}

/// [`Tracer`] that assigns sequential identifiers and collects finished spans into a
/// [`SharedStorage`].
#[derive(Debug)]
pub struct CaptureTracer {
    storage: Arc<Mutex<Storage>>,
    next_trace_id: AtomicU64,
    next_span_id: AtomicU64,
}

impl CaptureTracer {
    /// Creates a tracer writing finished spans into the provided storage.
    pub fn new(storage: &SharedStorage) -> Self {
        Self {
            storage: Arc::clone(&storage.inner),
            next_trace_id: AtomicU64::new(0),
            next_span_id: AtomicU64::new(0),
        }
    }

    /// Returns the number of spans started by this tracer so far, finished or not.
    pub fn started_span_count(&self) -> u64 {
        self.next_span_id.load(Ordering::SeqCst)
    }
}

impl Tracer for CaptureTracer {
    fn start_span(&self, builder: SpanBuilder) -> Result<Span, TraceError> {
        let span_id = self.next_span_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (trace_id, parent_span_id) = match builder.parent {
            SpanParent::None => {
                let fresh = self.next_trace_id.fetch_add(1, Ordering::SeqCst) + 1;
                (TraceId::from_u128(u128::from(fresh)), None)
            }
            SpanParent::Local { trace_id, span_id } => (trace_id, Some(span_id)),
            SpanParent::Remote { trace_id } => (trace_id, None),
        };
        Ok(Span::new(
            trace_id,
            SpanId::from_u64(span_id),
            parent_span_id,
            builder.name,
            builder.kind,
        ))
    }

    fn finish_span(&self, span: Span) -> Result<(), TraceError> {
        self.storage.lock().unwrap().spans.push(span);
        Ok(())
    }
}

/// [`Tracer`] that fails on every call. Exercises the best-effort contract of the
/// instrumentation: observers driven with this tracer must behave as if tracing
/// succeeded silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingTracer;

impl Tracer for FailingTracer {
    fn start_span(&self, _builder: SpanBuilder) -> Result<Span, TraceError> {
        Err(TraceError::SpanCreation {
            reason: "failing tracer".to_owned(),
        })
    }

    fn finish_span(&self, _span: Span) -> Result<(), TraceError> {
        Err(TraceError::SpanExport {
            reason: "failing tracer".to_owned(),
        })
    }
}

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

#[cfg(test)]
mod tests {
    use bus_telemetry::SpanKind;

    use super::*;

    #[test]
    fn fresh_trace_per_parentless_span() {
        let storage = SharedStorage::default();
        let tracer = CaptureTracer::new(&storage);

        let first = tracer.start_span(SpanBuilder::new("first")).unwrap();
        let second = tracer.start_span(SpanBuilder::new("second")).unwrap();
        assert_ne!(first.trace_id(), second.trace_id());
        assert_ne!(first.span_id(), second.span_id());
    }

    #[test]
    fn local_parent_is_recorded() {
        let storage = SharedStorage::default();
        let tracer = CaptureTracer::new(&storage);

        let parent = tracer.start_span(SpanBuilder::new("root")).unwrap();
        let child = tracer
            .start_span(SpanBuilder::new("stage").child_of(&parent))
            .unwrap();
        assert_eq!(child.trace_id(), parent.trace_id());
        assert_eq!(child.parent_span_id(), Some(parent.span_id()));
    }

    #[test]
    fn remote_parent_only_shares_the_trace() {
        let storage = SharedStorage::default();
        let tracer = CaptureTracer::new(&storage);

        let trace_id = TraceId::from_u128(0xdead_beef);
        let span = tracer
            .start_span(
                SpanBuilder::new("Handle")
                    .kind(SpanKind::Consumer)
                    .parent(SpanParent::Remote { trace_id }),
            )
            .unwrap();
        assert_eq!(span.trace_id(), trace_id);
        assert_eq!(span.parent_span_id(), None);
    }

    #[test]
    fn finished_spans_land_in_storage() {
        let storage = SharedStorage::default();
        let tracer = CaptureTracer::new(&storage);

        let span = tracer.start_span(SpanBuilder::new("root")).unwrap();
        tracer.finish_span(span).unwrap();

        let storage = storage.lock();
        assert_eq!(storage.spans().len(), 1);
        assert_eq!(storage.spans()[0].name(), "root");
    }
}
