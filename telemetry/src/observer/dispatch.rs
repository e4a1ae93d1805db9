//! Observer for the dispatch pipeline.

use std::{fmt, sync::Arc};

use super::{set_machine_attributes, PipelineKind};
use crate::{
    context::ExecutionContext,
    guard::best_effort,
    identity::EndpointIdentity,
    message::TransportMessage,
    propagation,
    tracer::{SpanBuilder, TraceError, Tracer},
    types::SpanKind,
};

/// Observer for the pipeline that routes and dispatches an assembled message:
/// `FindRoute` → `Serialize` → `Dispatch` stage spans under a producer root span.
///
/// This pipeline is the outbound process boundary: on start, the current trace ID and
/// baggage are [injected](propagation::inject()) into the outgoing message headers.
pub struct DispatchObserver {
    tracer: Arc<dyn Tracer>,
    identity: Arc<EndpointIdentity>,
}

impl fmt::Debug for DispatchObserver {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DispatchObserver")
            .finish_non_exhaustive()
    }
}

impl DispatchObserver {
    /// Creates an observer using the provided tracer and endpoint identity.
    pub fn new(tracer: Arc<dyn Tracer>, identity: Arc<EndpointIdentity>) -> Self {
        Self { tracer, identity }
    }

    /// Reacts to the pipeline run starting: opens the root span, seeds baggage from the
    /// outbound message, writes the propagation headers, and opens the `FindRoute`
    /// stage span.
    pub fn on_pipeline_starting(&self, cx: &mut ExecutionContext, message: &mut TransportMessage) {
        best_effort(
            "dispatch.pipeline_starting",
            self.pipeline_starting(cx, message),
        );
    }

    /// Reacts to a route being resolved: `FindRoute` closes carrying the destination
    /// queue, `Serialize` opens.
    pub fn on_route_found(&self, cx: &mut ExecutionContext, message: &TransportMessage) {
        best_effort("dispatch.route_found", self.route_found(cx, message));
    }

    /// Reacts to the transport message being serialized: `Serialize` closes,
    /// `Dispatch` opens.
    pub fn on_message_serialized(&self, cx: &mut ExecutionContext) {
        best_effort("dispatch.message_serialized", self.message_serialized(cx));
    }

    /// Reacts to the message leaving the endpoint. Terminal: the `Dispatch` stage span
    /// closes, then the root span.
    pub fn on_message_dispatched(&self, cx: &mut ExecutionContext) {
        best_effort("dispatch.message_dispatched", self.message_dispatched(cx));
    }

    fn pipeline_starting(
        &self,
        cx: &mut ExecutionContext,
        message: &mut TransportMessage,
    ) -> Result<(), TraceError> {
        let root_builder = SpanBuilder::new(PipelineKind::Dispatch.root_span_name())
            .kind(SpanKind::Producer);
        let root = cx.spans.open_root(self.tracer.as_ref(), root_builder)?;
        set_machine_attributes(root, &self.identity);
        let trace_id = root.trace_id();

        if let Some(correlation_id) = &message.correlation_id {
            if !correlation_id.is_empty() {
                cx.baggage.set("CorrelationId", correlation_id.as_str());
            }
        }
        cx.baggage.set("MessageId", message.message_id.as_str());
        propagation::inject(&mut message.headers, trace_id, &cx.baggage);

        let stage_builder = match cx.spans.root() {
            Some(root) => SpanBuilder::new("FindRoute").child_of(root),
            None => SpanBuilder::new("FindRoute"),
        };
        let stage = cx.spans.open_stage(self.tracer.as_ref(), stage_builder)?;
        stage.set_attribute("MessageType", message.message_type.as_str());
        Ok(())
    }

    fn route_found(
        &self,
        cx: &mut ExecutionContext,
        message: &TransportMessage,
    ) -> Result<(), TraceError> {
        if let Some(stage) = cx.spans.stage_mut() {
            stage.set_attribute("RecipientUri", message.recipient_uri.as_str());
        }
        self.next_stage(cx, "Serialize")
    }

    fn message_serialized(&self, cx: &mut ExecutionContext) -> Result<(), TraceError> {
        self.next_stage(cx, "Dispatch")
    }

    fn message_dispatched(&self, cx: &mut ExecutionContext) -> Result<(), TraceError> {
        cx.spans.close_root(self.tracer.as_ref())
    }

    fn next_stage(&self, cx: &mut ExecutionContext, name: &str) -> Result<(), TraceError> {
        let builder = match cx.spans.root() {
            Some(root) => SpanBuilder::new(name).child_of(root),
            None => SpanBuilder::new(name),
        };
        cx.spans.open_stage(self.tracer.as_ref(), builder)?;
        Ok(())
    }
}
