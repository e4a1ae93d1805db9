//! Reading and writing the trace-context propagation headers.
//!
//! Two reserved header keys carry trace context across the process boundary:
//! [`PARENT_TRACE_ID_KEY`] holds the dispatching root span's trace ID, and
//! [`BAGGAGE_KEY`] holds the [encoded](crate::Baggage::encode()) correlation baggage.
//! Injection happens just before dispatch; extraction at the start of inbound handling.

use crate::{baggage::Baggage, message::MessageHeaders, types::TraceId};

/// Header key carrying the upstream trace ID.
pub const PARENT_TRACE_ID_KEY: &str = "ParentTraceId";
/// Header key carrying the encoded correlation baggage.
pub const BAGGAGE_KEY: &str = "Baggage";

/// Trace context extracted from inbound message headers.
#[derive(Debug, Clone, Default)]
pub struct PropagatedContext {
    /// Trace ID established by the upstream process, if the header was present
    /// and parsable.
    pub parent_trace_id: Option<TraceId>,
    /// Decoded baggage; empty if the header was absent or empty.
    pub baggage: Baggage,
}

/// Writes the propagation headers onto an outbound message.
///
/// The trace ID header is set for every hop, replacing a value written by a previous
/// process. The baggage header is written only once per message path: if it is already
/// present, the first writer wins, so a forwarded message keeps its original baggage.
/// Empty baggage is not written at all.
pub fn inject(headers: &mut MessageHeaders, trace_id: TraceId, baggage: &Baggage) {
    headers.set(PARENT_TRACE_ID_KEY, trace_id.to_string());

    let encoded = baggage.encode();
    if !encoded.is_empty() {
        headers.append(BAGGAGE_KEY, encoded);
    }
}

/// Reads the propagation headers from an inbound message. Never mutates the headers;
/// an unparsable trace ID is treated the same as an absent one.
pub fn extract(headers: &MessageHeaders) -> PropagatedContext {
    let parent_trace_id = headers
        .get(PARENT_TRACE_ID_KEY)
        .and_then(|value| value.parse().ok());
    let baggage = headers
        .get(BAGGAGE_KEY)
        .map_or_else(Baggage::new, Baggage::decode);

    PropagatedContext {
        parent_trace_id,
        baggage,
    }
}
