//! Integration tests driving the pipeline instrumentation end to end against
//! a capturing tracer.

use assert_matches::assert_matches;
use predicates::{ord::eq, str::starts_with};

use std::{sync::Arc, thread, time::Duration};

use bus_telemetry::{
    Baggage, DispatchObserver, EndpointIdentity, ExecutionContext, Heartbeat, InboundObserver,
    ObserverRegistry, OutboundAssemblyObserver, PipelineKind, PipelineObserver, ProcessingStatus,
    Span, SpanKind, SpanStatus, TelemetryModule, TelemetryOptions, TransportMessage, BAGGAGE_KEY,
    PARENT_TRACE_ID_KEY,
};
use bus_telemetry_capture::{
    predicates::{attr, kind, name, status, trace_id, ScannerExt},
    CaptureTracer, FailingTracer, SharedStorage,
};

fn test_identity() -> Arc<EndpointIdentity> {
    Arc::new(EndpointIdentity {
        machine_name: "test-host".to_owned(),
        base_directory: "/srv/endpoint".to_owned(),
        ..EndpointIdentity::default()
    })
}

fn test_message() -> TransportMessage {
    let mut message = TransportMessage::new("M1", "Orders.PlaceOrder");
    message.correlation_id = Some("C1".to_owned());
    message.recipient_uri = "queue://orders-inbox".to_owned();
    message.body = br#"{"order":1}"#.to_vec();
    message
}

fn dispatch_message(tracer: &Arc<CaptureTracer>) -> TransportMessage {
    let observer = DispatchObserver::new(tracer.clone(), test_identity());
    let mut cx = ExecutionContext::new();
    let mut message = test_message();
    observer.on_pipeline_starting(&mut cx, &mut message);
    observer.on_route_found(&mut cx, &message);
    observer.on_message_serialized(&mut cx);
    observer.on_message_dispatched(&mut cx);
    message
}

#[test]
fn every_opened_span_is_closed_exactly_once() {
    let storage = SharedStorage::default();
    let tracer = Arc::new(CaptureTracer::new(&storage));
    let observer = OutboundAssemblyObserver::new(
        tracer.clone(),
        TelemetryOptions::default(),
        test_identity(),
    );

    let mut cx = ExecutionContext::new();
    let message = test_message();
    observer.on_pipeline_starting(&mut cx, &message);
    observer.on_message_assembled(&mut cx);
    observer.on_message_serialized(&mut cx, &message);
    observer.on_message_encrypted(&mut cx, &message);
    observer.on_message_compressed(&mut cx, &message);

    let storage = storage.lock();
    assert_eq!(u64::try_from(storage.spans().len()).unwrap(), tracer.started_span_count());
    assert!(storage.spans().iter().all(Span::is_closed));
    assert!(cx.spans.root().is_none());
    assert!(cx.spans.stage().is_none());
}

#[test]
fn root_span_finishes_after_all_stage_spans() {
    let storage = SharedStorage::default();
    let tracer = Arc::new(CaptureTracer::new(&storage));
    dispatch_message(&tracer);

    let storage = storage.lock();
    let spans = storage.spans();
    let root = spans.scanner().single(&name(eq("DispatchPipeline")));
    // Spans are stored in finish order, so every stage precedes the root.
    assert_eq!(spans.last().unwrap().span_id(), root.span_id());
    assert!(spans.scanner().all(&trace_id(root.trace_id())));
    for stage in &spans[..spans.len() - 1] {
        assert_eq!(stage.parent_span_id(), Some(root.span_id()));
    }
}

#[test]
fn baggage_survives_an_encode_decode_round_trip() {
    let mut baggage = Baggage::new();
    baggage.set("CorrelationId", "ACME & sons = 100%");
    baggage.set("MessageId", "M1");

    let decoded = Baggage::decode(&baggage.encode());
    assert_eq!(decoded.get("CorrelationId"), Some("ACME & sons = 100%"));
    assert_eq!(decoded.get("MessageId"), Some("M1"));
    assert_eq!(decoded.len(), 2);
}

#[test]
fn dispatched_message_carries_trace_context_to_the_consumer() {
    let dispatch_storage = SharedStorage::default();
    let dispatch_tracer = Arc::new(CaptureTracer::new(&dispatch_storage));
    let message = dispatch_message(&dispatch_tracer);

    let dispatch_trace_id = {
        let storage = dispatch_storage.lock();
        let root = storage.spans().scanner().single(&kind(SpanKind::Producer));
        root.trace_id()
    };
    assert_eq!(
        message.headers.get(PARENT_TRACE_ID_KEY),
        Some(dispatch_trace_id.to_string().as_str())
    );
    assert_eq!(
        message.headers.get(BAGGAGE_KEY),
        Some("CorrelationId=C1,MessageId=M1")
    );

    // The consuming endpoint runs in another process with its own tracer.
    let inbound_storage = SharedStorage::default();
    let inbound_tracer = Arc::new(CaptureTracer::new(&inbound_storage));
    let observer = InboundObserver::new(inbound_tracer, test_identity());
    let mut cx = ExecutionContext::new();
    observer.on_pipeline_starting(&mut cx);
    observer.on_before_handle_message(&mut cx, ProcessingStatus::Active, &message);
    observer.on_after_handle_message(&mut cx);
    observer.on_pipeline_completed(&mut cx);

    assert_eq!(cx.baggage.get("CorrelationId"), Some("C1"));
    assert_eq!(cx.baggage.get("MessageId"), Some("M1"));

    let storage = inbound_storage.lock();
    let predicate = name(eq("Handle")) & kind(SpanKind::Consumer);
    let handle = storage.spans().scanner().single(&predicate);
    assert_eq!(handle.trace_id(), dispatch_trace_id);
    assert_eq!(handle.parent_span_id(), None);
    assert_matches!(handle.attributes().get("CorrelationId"), Some(value) if *value == *"C1");

    let root = storage
        .spans()
        .scanner()
        .single(&name(eq("InboundProcessingPipeline")));
    assert_ne!(root.trace_id(), dispatch_trace_id);
}

#[test]
fn baggage_header_is_not_overwritten_downstream() {
    let tracer = Arc::new(CaptureTracer::new(&SharedStorage::default()));
    let message = dispatch_message(&tracer);

    // The message is dispatched again on an intermediate hop; the trace id header is
    // replaced, the baggage header stays as written by the first hop.
    let observer = DispatchObserver::new(tracer, test_identity());
    let mut cx = ExecutionContext::new();
    let mut forwarded = test_message();
    forwarded.headers = message.headers.clone();
    cx.baggage.set("CorrelationId", "other");
    observer.on_pipeline_starting(&mut cx, &mut forwarded);

    assert_eq!(
        forwarded.headers.get(BAGGAGE_KEY),
        Some("CorrelationId=C1,MessageId=M1")
    );
    assert_ne!(
        forwarded.headers.get(PARENT_TRACE_ID_KEY),
        message.headers.get(PARENT_TRACE_ID_KEY)
    );
}

#[test]
fn handle_span_is_unlinked_without_propagated_context() {
    let storage = SharedStorage::default();
    let tracer = Arc::new(CaptureTracer::new(&storage));
    let observer = InboundObserver::new(tracer, test_identity());

    let mut cx = ExecutionContext::new();
    let message = test_message(); // no propagation headers
    observer.on_pipeline_starting(&mut cx);
    observer.on_before_handle_message(&mut cx, ProcessingStatus::Active, &message);
    observer.on_after_handle_message(&mut cx);
    observer.on_pipeline_completed(&mut cx);

    let storage = storage.lock();
    let handle = storage.spans().scanner().single(&name(eq("Handle")));
    let root = storage
        .spans()
        .scanner()
        .single(&name(starts_with("Inbound")));
    assert_ne!(handle.trace_id(), root.trace_id());
    assert_eq!(handle.parent_span_id(), None);
}

#[test]
fn ignored_message_produces_no_handle_span() {
    let storage = SharedStorage::default();
    let tracer = Arc::new(CaptureTracer::new(&storage));
    let observer = InboundObserver::new(tracer, test_identity());

    let mut cx = ExecutionContext::new();
    observer.on_before_handle_message(&mut cx, ProcessingStatus::Ignore, &test_message());
    observer.on_before_handle_message(&mut cx, ProcessingStatus::Handled, &test_message());
    observer.on_after_handle_message(&mut cx);

    assert!(storage.lock().spans().is_empty());
    assert!(cx.spans.stage().is_none());
}

#[test]
fn handler_failure_is_recorded_on_the_handle_span() {
    let storage = SharedStorage::default();
    let tracer = Arc::new(CaptureTracer::new(&storage));
    let observer = InboundObserver::new(tracer, test_identity());

    let mut cx = ExecutionContext::new();
    observer.on_pipeline_starting(&mut cx);
    observer.on_before_handle_message(&mut cx, ProcessingStatus::Active, &test_message());
    let error = std::io::Error::new(std::io::ErrorKind::Other, "handler blew up");
    observer.on_pipeline_exception(&mut cx, &error);
    observer.on_pipeline_completed(&mut cx);

    let storage = storage.lock();
    let failed = status([predicates::function::function(|status: &SpanStatus| {
        matches!(status, SpanStatus::Error { .. })
    })]);
    let handle = storage.spans().scanner().single(&failed);
    assert_eq!(handle.name(), "Handle");
    assert!(handle.attributes().get("ExceptionMessage").is_some());
    assert!(storage.spans().iter().all(Span::is_closed));
}

#[test]
fn failing_tracer_never_disturbs_the_pipelines() {
    let tracer = Arc::new(FailingTracer);
    let identity = test_identity();
    let mut message = test_message();

    let outbound = OutboundAssemblyObserver::new(
        tracer.clone(),
        TelemetryOptions::default(),
        identity.clone(),
    );
    let mut cx = ExecutionContext::new();
    outbound.on_pipeline_starting(&mut cx, &message);
    outbound.on_message_assembled(&mut cx);
    outbound.on_message_serialized(&mut cx, &message);
    outbound.on_message_encrypted(&mut cx, &message);
    outbound.on_message_compressed(&mut cx, &message);

    let dispatch = DispatchObserver::new(tracer.clone(), identity.clone());
    let mut cx = ExecutionContext::new();
    dispatch.on_pipeline_starting(&mut cx, &mut message);
    dispatch.on_route_found(&mut cx, &message);
    dispatch.on_message_serialized(&mut cx);
    dispatch.on_message_dispatched(&mut cx);
    // Without a root span no trace header is written, and the message is untouched
    // otherwise.
    assert!(!message.headers.contains_key(PARENT_TRACE_ID_KEY));

    let inbound = InboundObserver::new(tracer, identity);
    let mut cx = ExecutionContext::new();
    inbound.on_pipeline_starting(&mut cx);
    inbound.on_before_handle_message(&mut cx, ProcessingStatus::Active, &message);
    inbound.on_after_handle_message(&mut cx);
    inbound.on_pipeline_completed(&mut cx);
}

#[test]
fn heartbeat_emits_identity_beat_then_plain_beats() {
    let storage = SharedStorage::default();
    let tracer = Arc::new(CaptureTracer::new(&storage));
    let options = TelemetryOptions {
        transient_instance: true,
        heartbeat_interval: Duration::from_millis(50),
        ..TelemetryOptions::default()
    };
    let identity = EndpointIdentity {
        machine_name: "test-host".to_owned(),
        environment_name: "Staging".to_owned(),
        ..EndpointIdentity::default()
    }
    .with_queue_uri("InboxWorkQueueUri", "queue://orders-inbox");

    let heartbeat = Heartbeat::start(tracer, &options, Arc::new(identity));
    thread::sleep(Duration::from_millis(1300));
    heartbeat.stop();

    let storage = storage.lock();
    let spans = storage.spans();
    assert_eq!(spans[0].name(), "EndpointStarted");
    let predicate = name(eq("EndpointStarted"))
        & attr("EnvironmentName", "Staging")
        & attr("TransientInstance", true)
        & attr("InboxWorkQueueUri", "queue://orders-inbox");
    spans.scanner().single(&predicate);
    assert!(spans[1..].iter().all(|span| span.name() == "Heartbeat"));
    assert!(spans.len() >= 2);
}

#[test]
fn stopping_the_heartbeat_before_warmup_emits_nothing() {
    let storage = SharedStorage::default();
    let tracer = Arc::new(CaptureTracer::new(&storage));
    let heartbeat = Heartbeat::start(
        tracer,
        &TelemetryOptions::default(),
        Arc::new(EndpointIdentity::default()),
    );
    heartbeat.stop();
    assert!(storage.lock().spans().is_empty());
}

#[derive(Default)]
struct TestRegistry {
    added: std::sync::Mutex<Vec<PipelineKind>>,
    removed: std::sync::Mutex<Vec<PipelineKind>>,
}

impl ObserverRegistry for TestRegistry {
    fn add(&self, observer: PipelineObserver) {
        self.added.lock().unwrap().push(observer.kind());
    }

    fn remove(&self, kind: PipelineKind) {
        self.removed.lock().unwrap().push(kind);
    }
}

#[test]
fn module_lifecycle_registers_observers_and_emits_stop_span() {
    let storage = SharedStorage::default();
    let tracer = Arc::new(CaptureTracer::new(&storage));
    let registry = TestRegistry::default();
    let mut module = TelemetryModule::new(
        tracer,
        TelemetryOptions::default(),
        EndpointIdentity {
            machine_name: "test-host".to_owned(),
            ..EndpointIdentity::default()
        },
    );

    module.start(&registry);
    assert_eq!(registry.added.lock().unwrap().len(), 3);
    module.shutdown(&registry);
    assert_eq!(registry.removed.lock().unwrap().len(), 3);

    let storage = storage.lock();
    let predicate = name(eq("EndpointStopped")) & attr("MachineName", "test-host");
    storage.spans().scanner().single(&predicate);
}
