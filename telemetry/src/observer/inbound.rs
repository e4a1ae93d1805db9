//! Observer for the inbound processing pipeline.

use std::{error, fmt, sync::Arc};

use super::{set_machine_attributes, PipelineKind};
use crate::{
    context::ExecutionContext,
    guard::best_effort,
    identity::EndpointIdentity,
    message::{ProcessingStatus, TransportMessage},
    propagation,
    tracer::{SpanBuilder, SpanParent, TraceError, Tracer},
    types::SpanKind,
};

/// Observer for the pipeline that consumes an inbound message.
///
/// This pipeline is the inbound process boundary: before a message is handled, the
/// propagation headers are [extracted](propagation::extract()) and, when an upstream
/// trace ID is present, the `Handle` span is opened as a consumer span linked to that
/// trace — re-establishing the cross-process parent/child relationship.
pub struct InboundObserver {
    tracer: Arc<dyn Tracer>,
    identity: Arc<EndpointIdentity>,
}

impl fmt::Debug for InboundObserver {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InboundObserver")
            .finish_non_exhaustive()
    }
}

impl InboundObserver {
    /// Creates an observer using the provided tracer and endpoint identity.
    pub fn new(tracer: Arc<dyn Tracer>, identity: Arc<EndpointIdentity>) -> Self {
        Self { tracer, identity }
    }

    /// Reacts to the pipeline run starting: opens this endpoint's own processing root
    /// span, independent of any propagated context.
    pub fn on_pipeline_starting(&self, cx: &mut ExecutionContext) {
        best_effort("inbound.pipeline_starting", self.pipeline_starting(cx));
    }

    /// Reacts to the message being about to be handled.
    ///
    /// Skips instrumentation entirely (no span opened) when the message is marked to be
    /// ignored, was already handled, or has expired — a deliberate short-circuit, not
    /// a failure. Otherwise opens the `Handle` stage span (linked to the upstream trace
    /// when one was propagated) and merges the propagated baggage into the context.
    pub fn on_before_handle_message(
        &self,
        cx: &mut ExecutionContext,
        status: ProcessingStatus,
        message: &TransportMessage,
    ) {
        best_effort(
            "inbound.before_handle_message",
            self.before_handle_message(cx, status, message),
        );
    }

    /// Reacts to the message having been handled: closes the `Handle` stage span.
    pub fn on_after_handle_message(&self, cx: &mut ExecutionContext) {
        best_effort(
            "inbound.after_handle_message",
            cx.spans.close_stage(self.tracer.as_ref()),
        );
    }

    /// Reacts to an exception raised while processing: records the exception on the
    /// active stage span, marks it failed and closes it. The exception itself is
    /// re-thrown by the host pipeline unchanged; this observer never intercepts it.
    pub fn on_pipeline_exception(
        &self,
        cx: &mut ExecutionContext,
        error: &(dyn error::Error + 'static),
    ) {
        if let Some(stage) = cx.spans.stage_mut() {
            stage.record_exception(error);
        }
        best_effort(
            "inbound.pipeline_exception",
            cx.spans.close_stage(self.tracer.as_ref()),
        );
    }

    /// Reacts to the pipeline run completing, after any forwarding dispatch of the
    /// processed message: closes the root span.
    pub fn on_pipeline_completed(&self, cx: &mut ExecutionContext) {
        best_effort(
            "inbound.pipeline_completed",
            cx.spans.close_root(self.tracer.as_ref()),
        );
    }

    fn pipeline_starting(&self, cx: &mut ExecutionContext) -> Result<(), TraceError> {
        let builder = SpanBuilder::new(PipelineKind::InboundProcessing.root_span_name());
        let root = cx.spans.open_root(self.tracer.as_ref(), builder)?;
        set_machine_attributes(root, &self.identity);
        Ok(())
    }

    fn before_handle_message(
        &self,
        cx: &mut ExecutionContext,
        status: ProcessingStatus,
        message: &TransportMessage,
    ) -> Result<(), TraceError> {
        if matches!(status, ProcessingStatus::Ignore | ProcessingStatus::Handled)
            || message.has_expired()
        {
            return Ok(());
        }

        let propagated = propagation::extract(&message.headers);
        let parent = match propagated.parent_trace_id {
            Some(trace_id) => SpanParent::Remote { trace_id },
            None => SpanParent::None,
        };
        let builder = SpanBuilder::new("Handle")
            .kind(SpanKind::Consumer)
            .parent(parent);

        if propagated.baggage.is_empty() {
            // Nothing was propagated; seed correlation context from the message itself.
            if let Some(correlation_id) = &message.correlation_id {
                if !correlation_id.is_empty() {
                    cx.baggage.set("CorrelationId", correlation_id.as_str());
                }
            }
            cx.baggage.set("MessageId", message.message_id.as_str());
        } else {
            cx.baggage.merge_propagated(propagated.baggage);
        }

        let stage = cx.spans.open_stage(self.tracer.as_ref(), builder)?;
        if let Some(correlation_id) = &message.correlation_id {
            if !correlation_id.is_empty() {
                stage.set_attribute("CorrelationId", correlation_id.as_str());
            }
        }
        stage.set_attribute("MessageId", message.message_id.as_str());
        stage.set_attribute("MessageType", message.message_type.as_str());
        Ok(())
    }
}
