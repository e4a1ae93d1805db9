//! Observers reacting to pipeline stage-transition signals.
//!
//! One observer exists per pipeline kind. The host pipeline engine drives them with
//! stage-transition calls; each observer instructs the [`SpanStack`] of the run's
//! [`ExecutionContext`] to close the prior stage span and open the next one, recording
//! stage-specific attributes along the way. All entry points are wrapped by the
//! [best-effort guard](crate::guard), so instrumentation failures never surface to the
//! host pipeline.
//!
//! [`SpanStack`]: crate::SpanStack
//! [`ExecutionContext`]: crate::ExecutionContext

use serde::{Deserialize, Serialize};

use std::sync::Arc;

use crate::{identity::EndpointIdentity, types::Span};

mod dispatch;
mod inbound;
mod outbound;

pub use self::{
    dispatch::DispatchObserver, inbound::InboundObserver, outbound::OutboundAssemblyObserver,
};

/// Kind tag attached to a pipeline at construction, replacing any runtime-type dispatch:
/// the composing application matches on this closed set to pick the observer for a
/// newly created pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Pipeline assembling an outgoing message (assemble, serialize, encrypt, compress).
    OutboundAssembly,
    /// Pipeline routing and dispatching an assembled message to its destination queue.
    Dispatch,
    /// Pipeline consuming and handling an inbound message.
    InboundProcessing,
}

impl PipelineKind {
    /// Returns the name used for the pipeline's root span.
    pub fn root_span_name(self) -> &'static str {
        match self {
            Self::OutboundAssembly => "OutboundAssemblyPipeline",
            Self::Dispatch => "DispatchPipeline",
            Self::InboundProcessing => "InboundProcessingPipeline",
        }
    }
}

/// A registered observer, one variant per [`PipelineKind`].
#[derive(Debug, Clone)]
pub enum PipelineObserver {
    /// Observer for the outbound assembly pipeline.
    OutboundAssembly(Arc<OutboundAssemblyObserver>),
    /// Observer for the dispatch pipeline.
    Dispatch(Arc<DispatchObserver>),
    /// Observer for the inbound processing pipeline.
    InboundProcessing(Arc<InboundObserver>),
}

impl PipelineObserver {
    /// Returns the pipeline kind this observer reacts to.
    pub fn kind(&self) -> PipelineKind {
        match self {
            Self::OutboundAssembly(_) => PipelineKind::OutboundAssembly,
            Self::Dispatch(_) => PipelineKind::Dispatch,
            Self::InboundProcessing(_) => PipelineKind::InboundProcessing,
        }
    }
}

/// Registry the composing application exposes so that observers can be attached to and
/// detached from pipelines. Injected into [`TelemetryModule`](crate::TelemetryModule)
/// at construction; the registry owner controls observer lifecycle.
pub trait ObserverRegistry {
    /// Registers an observer for its pipeline kind.
    fn add(&self, observer: PipelineObserver);
    /// Removes the observer registered for the specified pipeline kind, if any.
    fn remove(&self, kind: PipelineKind);
}

pub(crate) fn set_machine_attributes(span: &mut Span, identity: &EndpointIdentity) {
    span.set_attribute("MachineName", identity.machine_name.as_str());
    span.set_attribute("BaseDirectory", identity.base_directory.as_str());
}
