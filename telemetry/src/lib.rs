//! Distributed tracing instrumentation for multi-hop message pipelines.
//!
//! A message travels through three pipelines: one assembles the outgoing message, one
//! dispatches it to a destination queue, and one consumes it on the receiving endpoint.
//! This crate observes the stage transitions of those pipelines and turns each run into
//! a root [`Span`] with one stage span per pipeline stage, all produced through a
//! pluggable [`Tracer`] backend. At the process boundary, the trace ID and correlation
//! [`Baggage`] are carried in message headers, so the consumer's `Handle` span joins the
//! trace the dispatching endpoint started.
//!
//! Instrumentation is strictly best-effort: a tracer failure is logged and absorbed,
//! never surfaced to the message pipeline.
//!
//! # Examples
//!
//! ```
//! use bus_telemetry::{
//!     DispatchObserver, EndpointIdentity, ExecutionContext, NoopTracer, TransportMessage,
//!     PARENT_TRACE_ID_KEY,
//! };
//! use std::sync::Arc;
//!
//! let observer = DispatchObserver::new(
//!     Arc::new(NoopTracer),
//!     Arc::new(EndpointIdentity::default()),
//! );
//! let mut cx = ExecutionContext::new();
//! let mut message = TransportMessage::new("message-1", "Orders.PlaceOrder");
//!
//! observer.on_pipeline_starting(&mut cx, &mut message);
//! // The outgoing message now carries the trace context for the consuming endpoint.
//! assert!(message.headers.contains_key(PARENT_TRACE_ID_KEY));
//!
//! observer.on_route_found(&mut cx, &message);
//! observer.on_message_serialized(&mut cx);
//! observer.on_message_dispatched(&mut cx);
//! assert!(cx.spans.root().is_none());
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod baggage;
mod config;
mod context;
pub mod guard;
mod heartbeat;
mod identity;
pub mod message;
mod module;
pub mod observer;
pub mod propagation;
mod tracer;
pub mod types;

pub use crate::{
    baggage::Baggage,
    config::TelemetryOptions,
    context::{ExecutionContext, SpanStack},
    heartbeat::Heartbeat,
    identity::EndpointIdentity,
    message::{MessageHeaders, ProcessingStatus, TransportMessage},
    module::TelemetryModule,
    observer::{
        DispatchObserver, InboundObserver, ObserverRegistry, OutboundAssemblyObserver,
        PipelineKind, PipelineObserver,
    },
    propagation::{PropagatedContext, BAGGAGE_KEY, PARENT_TRACE_ID_KEY},
    tracer::{NoopTracer, SpanBuilder, SpanParent, TraceError, Tracer},
    types::{AttributeMap, AttributeValue, Span, SpanId, SpanKind, SpanStatus, TraceId},
};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
