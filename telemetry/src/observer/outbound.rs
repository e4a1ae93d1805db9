//! Observer for the outbound assembly pipeline.

use std::{fmt, sync::Arc};

use super::{set_machine_attributes, PipelineKind};
use crate::{
    config::TelemetryOptions,
    context::ExecutionContext,
    guard::best_effort,
    identity::EndpointIdentity,
    message::TransportMessage,
    tracer::{SpanBuilder, TraceError, Tracer},
};

/// Observer for the pipeline that assembles an outgoing message:
/// `Assemble` → `Serialize` → `Encrypt` → `Compress` stage spans under one root span.
pub struct OutboundAssemblyObserver {
    tracer: Arc<dyn Tracer>,
    options: TelemetryOptions,
    identity: Arc<EndpointIdentity>,
}

impl fmt::Debug for OutboundAssemblyObserver {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OutboundAssemblyObserver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl OutboundAssemblyObserver {
    /// Creates an observer using the provided tracer, options and endpoint identity.
    pub fn new(
        tracer: Arc<dyn Tracer>,
        options: TelemetryOptions,
        identity: Arc<EndpointIdentity>,
    ) -> Self {
        Self {
            tracer,
            options,
            identity,
        }
    }

    /// Reacts to the pipeline run starting: opens the root span and the `Assemble`
    /// stage span.
    pub fn on_pipeline_starting(&self, cx: &mut ExecutionContext, message: &TransportMessage) {
        best_effort(
            "outbound_assembly.pipeline_starting",
            self.pipeline_starting(cx, message),
        );
    }

    /// Reacts to the message object being assembled: `Assemble` closes, `Serialize` opens.
    pub fn on_message_assembled(&self, cx: &mut ExecutionContext) {
        best_effort(
            "outbound_assembly.message_assembled",
            self.message_assembled(cx),
        );
    }

    /// Reacts to the payload being serialized: `Serialize` closes (optionally carrying
    /// the payload), `Encrypt` opens.
    pub fn on_message_serialized(&self, cx: &mut ExecutionContext, message: &TransportMessage) {
        best_effort(
            "outbound_assembly.message_serialized",
            self.message_serialized(cx, message),
        );
    }

    /// Reacts to the payload being encrypted: `Encrypt` closes, `Compress` opens.
    pub fn on_message_encrypted(&self, cx: &mut ExecutionContext, message: &TransportMessage) {
        best_effort(
            "outbound_assembly.message_encrypted",
            self.message_encrypted(cx, message),
        );
    }

    /// Reacts to the payload being compressed. This is the terminal transition: both the
    /// `Compress` stage span and the root span close here.
    pub fn on_message_compressed(&self, cx: &mut ExecutionContext, message: &TransportMessage) {
        best_effort(
            "outbound_assembly.message_compressed",
            self.message_compressed(cx, message),
        );
    }

    fn pipeline_starting(
        &self,
        cx: &mut ExecutionContext,
        message: &TransportMessage,
    ) -> Result<(), TraceError> {
        let root_builder = SpanBuilder::new(PipelineKind::OutboundAssembly.root_span_name());
        let root = cx.spans.open_root(self.tracer.as_ref(), root_builder)?;
        set_machine_attributes(root, &self.identity);

        let stage_builder = SpanBuilder::new("Assemble").child_of(root);
        let stage = cx.spans.open_stage(self.tracer.as_ref(), stage_builder)?;
        stage.set_attribute("MessageType", message.message_type.as_str());
        Ok(())
    }

    fn message_assembled(&self, cx: &mut ExecutionContext) -> Result<(), TraceError> {
        self.next_stage(cx, "Serialize")
    }

    fn message_serialized(
        &self,
        cx: &mut ExecutionContext,
        message: &TransportMessage,
    ) -> Result<(), TraceError> {
        if self.options.include_serialized_message {
            if let Some(stage) = cx.spans.stage_mut() {
                let payload = String::from_utf8_lossy(&message.body).into_owned();
                stage.set_attribute("SerializedMessage", payload);
            }
        }
        self.next_stage(cx, "Encrypt")
    }

    fn message_encrypted(
        &self,
        cx: &mut ExecutionContext,
        message: &TransportMessage,
    ) -> Result<(), TraceError> {
        if let Some(stage) = cx.spans.stage_mut() {
            stage.set_attribute("EncryptionAlgorithm", message.encryption_algorithm.as_str());
        }
        self.next_stage(cx, "Compress")
    }

    fn message_compressed(
        &self,
        cx: &mut ExecutionContext,
        message: &TransportMessage,
    ) -> Result<(), TraceError> {
        if let Some(stage) = cx.spans.stage_mut() {
            stage.set_attribute(
                "CompressionAlgorithm",
                message.compression_algorithm.as_str(),
            );
        }
        cx.spans.close_root(self.tracer.as_ref())
    }

    /// Closes the current stage span and opens the next one under the same root.
    fn next_stage(&self, cx: &mut ExecutionContext, name: &str) -> Result<(), TraceError> {
        let builder = match cx.spans.root() {
            Some(root) => SpanBuilder::new(name).child_of(root),
            None => SpanBuilder::new(name),
        };
        cx.spans.open_stage(self.tracer.as_ref(), builder)?;
        Ok(())
    }
}
