//! Periodic liveness beats emitted as root spans.
//!
//! The heartbeat is the only background task of the instrumentation. It runs on a single
//! dedicated thread: after a short warmup, the first beat is an `EndpointStarted` span
//! carrying the full endpoint identity; every beat after that is a plain `Heartbeat`
//! span with machine attributes only.

use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    config::TelemetryOptions,
    guard::best_effort,
    identity::EndpointIdentity,
    observer::set_machine_attributes,
    tracer::{SpanBuilder, TraceError, Tracer},
};

const WARMUP: Duration = Duration::from_secs(1);
const POLL_SLICE: Duration = Duration::from_secs(1);
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the running heartbeat thread.
///
/// Dropping the handle signals the thread to stop without waiting for it; use
/// [`Self::stop()`] for an orderly, bounded shutdown.
#[derive(Debug)]
pub struct Heartbeat {
    stop: mpsc::Sender<()>,
    done: mpsc::Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Heartbeat {
    /// Spawns the heartbeat thread. Beats are emitted through the provided tracer at the
    /// cadence configured in `options`; failures to emit are absorbed like any other
    /// instrumentation failure.
    pub fn start(
        tracer: Arc<dyn Tracer>,
        options: &TelemetryOptions,
        identity: Arc<EndpointIdentity>,
    ) -> Self {
        let (stop_sender, stop_receiver) = mpsc::channel();
        let (done_sender, done_receiver) = mpsc::channel();
        let worker = HeartbeatWorker {
            tracer,
            identity,
            transient_instance: options.transient_instance,
            interval: options.heartbeat_interval,
            stop: stop_receiver,
            _done: done_sender,
        };
        let handle = thread::Builder::new()
            .name("telemetry-heartbeat".to_owned())
            .spawn(move || worker.run());
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::debug!(%err, "cannot spawn heartbeat thread");
                None
            }
        };

        Self {
            stop: stop_sender,
            done: done_receiver,
            handle,
        }
    }

    /// Signals the heartbeat thread to stop and waits for it to finish, but no longer
    /// than a bounded timeout; a thread stuck in a beat is detached instead.
    pub fn stop(mut self) {
        let _ = self.stop.send(());
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.done.recv_timeout(JOIN_TIMEOUT) {
            // Either an explicit ack or the worker dropping its end of the channel
            // means the thread is past its last beat.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("heartbeat thread did not stop in time; detaching");
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}

struct HeartbeatWorker {
    tracer: Arc<dyn Tracer>,
    identity: Arc<EndpointIdentity>,
    transient_instance: bool,
    interval: Duration,
    stop: mpsc::Receiver<()>,
    _done: mpsc::Sender<()>,
}

impl HeartbeatWorker {
    fn run(self) {
        if self.wait(WARMUP) {
            return;
        }
        best_effort("heartbeat.endpoint_started", self.emit_started());
        loop {
            if self.wait(self.interval) {
                return;
            }
            best_effort("heartbeat.beat", self.emit_beat());
        }
    }

    /// Sleeps for `duration` in slices so that a stop signal is observed within one
    /// slice. Returns `true` if the worker should terminate.
    fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.stop.recv_timeout(remaining.min(POLL_SLICE)) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => { /* keep sleeping */ }
            }
        }
    }

    fn emit_started(&self) -> Result<(), TraceError> {
        let mut span = self.tracer.start_span(SpanBuilder::new("EndpointStarted"))?;
        set_machine_attributes(&mut span, &self.identity);
        span.set_attribute("EnvironmentName", self.identity.environment_name.as_str());
        span.set_attribute("IPv4Address", self.identity.ipv4_address.as_str());
        span.set_attribute("EntryName", self.identity.entry_name.as_str());
        span.set_attribute("TransientInstance", self.transient_instance);
        for (name, uri) in &self.identity.queue_uris {
            span.set_attribute(name.as_str(), uri.as_str());
        }
        span.end();
        self.tracer.finish_span(span)
    }

    fn emit_beat(&self) -> Result<(), TraceError> {
        let mut span = self.tracer.start_span(SpanBuilder::new("Heartbeat"))?;
        set_machine_attributes(&mut span, &self.identity);
        span.end();
        self.tracer.finish_span(span)
    }
}
