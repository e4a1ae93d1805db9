//! Wiring of the instrumentation into a host endpoint.

use std::{fmt, sync::Arc};

use crate::{
    config::TelemetryOptions,
    guard::best_effort,
    heartbeat::Heartbeat,
    identity::EndpointIdentity,
    observer::{
        set_machine_attributes, DispatchObserver, InboundObserver, ObserverRegistry,
        OutboundAssemblyObserver, PipelineKind, PipelineObserver,
    },
    tracer::{SpanBuilder, TraceError, Tracer},
};

/// Entry point tying the instrumentation together: owns the three pipeline observers
/// and the heartbeat, and drives their lifecycle against an [`ObserverRegistry`]
/// provided by the composing application.
///
/// When [options](TelemetryOptions) have `enabled` unset, [`Self::start()`] and
/// [`Self::shutdown()`] are no-ops: no observers are registered, no heartbeat runs and
/// no lifecycle spans are emitted.
pub struct TelemetryModule {
    tracer: Arc<dyn Tracer>,
    options: TelemetryOptions,
    identity: Arc<EndpointIdentity>,
    heartbeat: Option<Heartbeat>,
    started: bool,
}

impl fmt::Debug for TelemetryModule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TelemetryModule")
            .field("options", &self.options)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl TelemetryModule {
    /// Creates a module emitting spans through the provided tracer.
    pub fn new(
        tracer: Arc<dyn Tracer>,
        options: TelemetryOptions,
        identity: EndpointIdentity,
    ) -> Self {
        Self {
            tracer,
            options,
            identity: Arc::new(identity),
            heartbeat: None,
            started: false,
        }
    }

    /// Registers an observer for each pipeline kind and launches the heartbeat.
    /// Does nothing when instrumentation is disabled or the module is already started.
    pub fn start(&mut self, registry: &dyn ObserverRegistry) {
        if !self.options.enabled || self.started {
            return;
        }
        registry.add(PipelineObserver::OutboundAssembly(Arc::new(
            OutboundAssemblyObserver::new(
                self.tracer.clone(),
                self.options.clone(),
                self.identity.clone(),
            ),
        )));
        registry.add(PipelineObserver::Dispatch(Arc::new(DispatchObserver::new(
            self.tracer.clone(),
            self.identity.clone(),
        ))));
        registry.add(PipelineObserver::InboundProcessing(Arc::new(
            InboundObserver::new(self.tracer.clone(), self.identity.clone()),
        )));
        self.heartbeat = Some(Heartbeat::start(
            self.tracer.clone(),
            &self.options,
            self.identity.clone(),
        ));
        self.started = true;
    }

    /// Deregisters the observers, stops the heartbeat and emits a final
    /// `EndpointStopped` span. Does nothing when the module was never started.
    pub fn shutdown(mut self, registry: &dyn ObserverRegistry) {
        if !self.started {
            return;
        }
        registry.remove(PipelineKind::OutboundAssembly);
        registry.remove(PipelineKind::Dispatch);
        registry.remove(PipelineKind::InboundProcessing);
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        best_effort("module.endpoint_stopped", self.emit_stopped());
    }

    fn emit_stopped(&self) -> Result<(), TraceError> {
        let mut span = self.tracer.start_span(SpanBuilder::new("EndpointStopped"))?;
        set_machine_attributes(&mut span, &self.identity);
        span.end();
        self.tracer.finish_span(span)
    }
}
