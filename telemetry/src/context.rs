//! Per-message execution context and its span stack.

use crate::{
    baggage::Baggage,
    tracer::{SpanBuilder, TraceError, Tracer},
    types::Span,
};

/// Holder of the root span and the current stage span for one pipeline run.
///
/// The stack enforces the zero-leak invariant: at most one open span per slot, and a span
/// is never abandoned — assigning a new span to an occupied slot finishes the old one
/// first, and closing the root drains the stage slot so that children always end before
/// their parent.
#[derive(Debug, Default)]
pub struct SpanStack {
    root: Option<Span>,
    stage: Option<Span>,
}

impl SpanStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the root span for the pipeline run. If a root is already open, it is
    /// finished first (replacement semantics); typically called once per context.
    ///
    /// # Errors
    ///
    /// Propagates tracer failures; the stack is left without an open root span in
    /// that case.
    pub fn open_root(
        &mut self,
        tracer: &dyn Tracer,
        builder: SpanBuilder,
    ) -> Result<&mut Span, TraceError> {
        if let Some(mut old) = self.root.take() {
            old.end();
            tracer.finish_span(old)?;
        }
        let span = tracer.start_span(builder)?;
        Ok(self.root.insert(span))
    }

    /// Opens a new stage span, finishing the previous stage span if one is still open.
    ///
    /// # Errors
    ///
    /// Propagates tracer failures; the stack is left without an open stage span in
    /// that case.
    pub fn open_stage(
        &mut self,
        tracer: &dyn Tracer,
        builder: SpanBuilder,
    ) -> Result<&mut Span, TraceError> {
        self.close_stage(tracer)?;
        let span = tracer.start_span(builder)?;
        Ok(self.stage.insert(span))
    }

    /// Finishes and clears the current stage span; a no-op if the slot is empty.
    ///
    /// # Errors
    ///
    /// Propagates tracer failures. The slot is cleared regardless, so the span is not
    /// closed twice.
    pub fn close_stage(&mut self, tracer: &dyn Tracer) -> Result<(), TraceError> {
        if let Some(mut span) = self.stage.take() {
            span.end();
            tracer.finish_span(span)?;
        }
        Ok(())
    }

    /// Finishes and clears the root span, draining the stage slot first so that the
    /// nesting order in the exported trace is preserved.
    ///
    /// # Errors
    ///
    /// Propagates tracer failures. Both slots are cleared regardless.
    pub fn close_root(&mut self, tracer: &dyn Tracer) -> Result<(), TraceError> {
        let stage_result = self.close_stage(tracer);
        if let Some(mut span) = self.root.take() {
            span.end();
            tracer.finish_span(span)?;
        }
        stage_result
    }

    /// Returns the open root span, if any.
    pub fn root(&self) -> Option<&Span> {
        self.root.as_ref()
    }

    /// Returns the open root span for mutation, if any.
    pub fn root_mut(&mut self) -> Option<&mut Span> {
        self.root.as_mut()
    }

    /// Returns the open stage span, if any.
    pub fn stage(&self) -> Option<&Span> {
        self.stage.as_ref()
    }

    /// Returns the open stage span for mutation, if any.
    pub fn stage_mut(&mut self) -> Option<&mut Span> {
        self.stage.as_mut()
    }
}

/// State container for one in-flight message: a [`SpanStack`] plus the baggage snapshot.
///
/// A context is created when a pipeline run starts and destroyed when the run ends (root
/// span closed). It is never shared between concurrently processed messages, which is why
/// the instrumentation core needs no locking.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    /// Span stack of this run.
    pub spans: SpanStack,
    /// Correlation baggage established during this run.
    pub baggage: Baggage,
}

impl ExecutionContext {
    /// Creates a fresh context with no open spans and empty baggage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    };

    use crate::{
        tracer::SpanParent,
        types::{SpanId, SpanKind, TraceId},
    };

    #[derive(Default)]
    struct RecordingTracer {
        next_id: AtomicU64,
        finished: Mutex<Vec<Span>>,
    }

    impl RecordingTracer {
        fn finished(&self) -> Vec<Span> {
            self.finished.lock().unwrap().clone()
        }
    }

    impl Tracer for RecordingTracer {
        fn start_span(&self, builder: SpanBuilder) -> Result<Span, TraceError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let (trace_id, parent_span_id) = match builder.parent {
                SpanParent::None => (TraceId::from_u128(u128::from(id)), None),
                SpanParent::Local { trace_id, span_id } => (trace_id, Some(span_id)),
                SpanParent::Remote { trace_id } => (trace_id, None),
            };
            Ok(Span::new(
                trace_id,
                SpanId::from_u64(id),
                parent_span_id,
                builder.name,
                builder.kind,
            ))
        }

        fn finish_span(&self, span: Span) -> Result<(), TraceError> {
            self.finished.lock().unwrap().push(span);
            Ok(())
        }
    }

    #[test]
    fn opening_a_stage_closes_the_previous_one() {
        let tracer = RecordingTracer::default();
        let mut stack = SpanStack::new();

        stack
            .open_stage(&tracer, SpanBuilder::new("Assemble"))
            .unwrap();
        stack
            .open_stage(&tracer, SpanBuilder::new("Serialize"))
            .unwrap();

        let finished = tracer.finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].name(), "Assemble");
        assert!(finished[0].is_closed());
        assert_eq!(stack.stage().unwrap().name(), "Serialize");
    }

    #[test]
    fn stage_spans_nest_under_the_root() {
        let tracer = RecordingTracer::default();
        let mut stack = SpanStack::new();

        let root_builder = SpanBuilder::new("DispatchPipeline");
        let (trace_id, span_id) = {
            let root = stack.open_root(&tracer, root_builder).unwrap();
            (root.trace_id(), root.span_id())
        };
        let stage_builder = SpanBuilder::new("FindRoute").parent(SpanParent::Local {
            trace_id,
            span_id,
        });
        let stage = stack.open_stage(&tracer, stage_builder).unwrap();

        assert_eq!(stage.trace_id(), trace_id);
        assert_eq!(stage.parent_span_id(), Some(span_id));
    }

    #[test]
    fn closing_root_drains_the_stage_slot_first() {
        let tracer = RecordingTracer::default();
        let mut stack = SpanStack::new();

        stack
            .open_root(&tracer, SpanBuilder::new("DispatchPipeline"))
            .unwrap();
        stack
            .open_stage(&tracer, SpanBuilder::new("Dispatch"))
            .unwrap();
        stack.close_root(&tracer).unwrap();

        let finished = tracer.finished();
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].name(), "Dispatch");
        assert_eq!(finished[1].name(), "DispatchPipeline");
        assert!(stack.root().is_none());
        assert!(stack.stage().is_none());
    }

    #[test]
    fn close_stage_is_a_noop_on_an_empty_slot() {
        let tracer = RecordingTracer::default();
        let mut stack = SpanStack::new();

        stack.close_stage(&tracer).unwrap();
        assert!(tracer.finished().is_empty());
    }

    #[test]
    fn consumer_kind_is_preserved() {
        let tracer = RecordingTracer::default();
        let mut stack = SpanStack::new();

        let builder = SpanBuilder::new("Handle").kind(SpanKind::Consumer);
        let span = stack.open_stage(&tracer, builder).unwrap();
        assert_eq!(span.kind(), SpanKind::Consumer);
    }
}
