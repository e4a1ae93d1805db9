//! Tracer seam between the pipeline observers and a tracing backend.

use std::{error, fmt};

use crate::types::{Span, SpanId, SpanKind, TraceId};

/// Error raised by a [`Tracer`] or other instrumentation plumbing.
///
/// These errors never reach the host pipeline: every observer entry point routes through
/// the [best-effort guard](crate::guard), which absorbs them.
#[derive(Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// The backend refused to create a span.
    SpanCreation {
        /// Backend-provided reason.
        reason: String,
    },
    /// The backend failed to accept a finished span.
    SpanExport {
        /// Backend-provided reason.
        reason: String,
    },
}

impl fmt::Display for TraceError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpanCreation { reason } => write!(formatter, "cannot create span: {reason}"),
            Self::SpanExport { reason } => {
                write!(formatter, "cannot export finished span: {reason}")
            }
        }
    }
}

impl error::Error for TraceError {}

/// Parent linkage requested for a new span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanParent {
    /// The span starts a new trace.
    None,
    /// The span is a child of another span in the same process; it joins that span's trace.
    Local {
        /// Trace the parent belongs to.
        trace_id: TraceId,
        /// ID of the parent span.
        span_id: SpanId,
    },
    /// The span is linked to an upstream process that only propagated its trace ID.
    /// The span joins that trace without a recorded parent span ID.
    Remote {
        /// Propagated trace ID.
        trace_id: TraceId,
    },
}

/// Everything needed to start a [`Span`]; passed to [`Tracer::start_span()`].
#[derive(Debug, Clone)]
pub struct SpanBuilder {
    /// Span name.
    pub name: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Requested parent linkage.
    pub parent: SpanParent,
}

impl SpanBuilder {
    /// Creates a builder for an internal span without a parent.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SpanKind::Internal,
            parent: SpanParent::None,
        }
    }

    /// Sets the span kind.
    #[must_use]
    pub fn kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the parent linkage.
    #[must_use]
    pub fn parent(mut self, parent: SpanParent) -> Self {
        self.parent = parent;
        self
    }

    /// Links the span as a child of the provided local span.
    #[must_use]
    pub fn child_of(self, parent: &Span) -> Self {
        self.parent(SpanParent::Local {
            trace_id: parent.trace_id(),
            span_id: parent.span_id(),
        })
    }
}

/// Backend producing and collecting [`Span`]s.
///
/// The backend owns identifier assignment: a fresh trace ID for [`SpanParent::None`], the
/// inherited trace ID for local and remote parents. What happens to finished spans
/// (batching, export, sampling) is entirely up to the implementation; the instrumentation
/// core only hands spans over.
pub trait Tracer: Send + Sync {
    /// Starts a new span.
    ///
    /// # Errors
    ///
    /// May fail if the backend cannot create a span; the failure is absorbed by the
    /// calling observer and never surfaces to the host pipeline.
    fn start_span(&self, builder: SpanBuilder) -> Result<Span, TraceError>;

    /// Accepts a span that has been closed. The span is final: its end timestamp is set
    /// and no further mutation has happened since.
    ///
    /// # Errors
    ///
    /// May fail if the backend cannot accept the span; the failure is absorbed by the
    /// calling observer and never surfaces to the host pipeline.
    fn finish_span(&self, span: Span) -> Result<(), TraceError>;
}

/// [`Tracer`] that creates zero-ID spans and discards them on finish.
///
/// Useful as a stand-in when instrumentation is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, builder: SpanBuilder) -> Result<Span, TraceError> {
        let trace_id = match builder.parent {
            SpanParent::None => TraceId::ZERO,
            SpanParent::Local { trace_id, .. } | SpanParent::Remote { trace_id } => trace_id,
        };
        Ok(Span::new(
            trace_id,
            SpanId::ZERO,
            None,
            builder.name,
            builder.kind,
        ))
    }

    fn finish_span(&self, _span: Span) -> Result<(), TraceError> {
        Ok(())
    }
}
