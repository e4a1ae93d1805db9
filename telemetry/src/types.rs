//! Span data model shared by the pipeline observers and tracer backends.

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use std::{error, fmt, mem, ops, str::FromStr, time::SystemTime, vec};

/// Identifier of a trace: the causal chain of spans for one message, potentially crossing
/// process boundaries. Rendered as a 32-char lowercase hex string in headers and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Invalid (all-zero) trace ID used by no-op tracers.
    pub const ZERO: Self = Self(0);

    /// Creates a trace ID from the underlying integer.
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:032x}", self.0)
    }
}

impl FromStr for TraceId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(ParseIdError { expected_len: 32 });
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseIdError { expected_len: 32 })
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TraceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of a single span within a trace. Rendered as a 16-char lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Invalid (all-zero) span ID used by no-op tracers.
    pub const ZERO: Self = Self(0);

    /// Creates a span ID from the underlying integer.
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(ParseIdError { expected_len: 16 });
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseIdError { expected_len: 16 })
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpanId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error parsing a [`TraceId`] or [`SpanId`] from its hex presentation.
#[derive(Debug, Clone, Copy)]
pub struct ParseIdError {
    expected_len: usize,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "expected {} lowercase hex chars",
            self.expected_len
        )
    }
}

impl error::Error for ParseIdError {}

/// Kind of a [`Span`], mirroring the messaging roles of the instrumented pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Span covers in-process work.
    Internal,
    /// Span covers producing an outbound message.
    Producer,
    /// Span covers consuming an inbound message.
    Consumer,
}

/// Outcome recorded on a [`Span`] when it is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    /// No outcome was recorded (the default).
    Unset,
    /// The spanned operation succeeded.
    Ok,
    /// The spanned operation failed.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

/// Value of a span attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// String value.
    String(String),
}

impl AttributeValue {
    /// Returns the string value, or `None` if this is not a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl PartialEq<str> for AttributeValue {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

/// Collection of named span attributes.
///
/// Functionally similar to a `HashMap<String, AttributeValue>`, with the key difference
/// that the order of [iteration](Self::iter()) is the insertion order. If a value is
/// updated, it preserves its old placement.
#[derive(Clone, Default, PartialEq)]
pub struct AttributeMap {
    inner: Vec<(String, AttributeValue)>,
}

impl fmt::Debug for AttributeMap {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = formatter.debug_map();
        for (key, value) in &self.inner {
            map.entry(key, value);
        }
        map.finish()
    }
}

impl AttributeMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored attributes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Checks whether this map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the value with the specified key, or `None` if it is not set.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.inner
            .iter()
            .find_map(|(existing, value)| (existing == key).then_some(value))
    }

    /// Iterates over the contained key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> + '_ {
        self.inner.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Inserts a value with the specified key. If a value with the same key was present
    /// previously, it is overwritten in place.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        let key = key.into();
        let value = value.into();
        let position = self.inner.iter().position(|(existing, _)| *existing == key);
        if let Some(position) = position {
            let place = &mut self.inner[position].1;
            Some(mem::replace(place, value))
        } else {
            self.inner.push((key, value));
            None
        }
    }
}

impl ops::Index<&str> for AttributeMap {
    type Output = AttributeValue;

    fn index(&self, index: &str) -> &Self::Output {
        self.get(index)
            .unwrap_or_else(|| panic!("attribute `{index}` is not defined"))
    }
}

impl FromIterator<(String, AttributeValue)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        let mut this = Self::new();
        this.extend(iter);
        this
    }
}

impl Extend<(String, AttributeValue)> for AttributeMap {
    fn extend<I: IntoIterator<Item = (String, AttributeValue)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for AttributeMap {
    type Item = (String, AttributeValue);
    type IntoIter = vec::IntoIter<(String, AttributeValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl Serialize for AttributeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'v> Visitor<'v> for MapVisitor {
            type Value = AttributeMap;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("map of attribute key-value entries")
            }

            fn visit_map<A: MapAccess<'v>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut values = AttributeMap {
                    inner: Vec::with_capacity(map.size_hint().unwrap_or(0)),
                };
                while let Some((key, value)) = map.next_entry::<String, AttributeValue>()? {
                    values.insert(key, value);
                }
                Ok(values)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// A single traced operation: one pipeline run (root span) or one named stage within it.
///
/// Spans are created by a [`Tracer`](crate::Tracer) when a stage begins and may be mutated
/// (attributes, status) while open. Closing a span consumes it, so no mutation is possible
/// afterwards; until then it is exclusively owned by the [`SpanStack`](crate::SpanStack)
/// slot that created it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    trace_id: TraceId,
    span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_span_id: Option<SpanId>,
    name: String,
    kind: SpanKind,
    attributes: AttributeMap,
    status: SpanStatus,
    started_at: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ended_at: Option<SystemTime>,
}

impl Span {
    /// Creates an open span with the provided identifiers. Intended for [`Tracer`]
    /// implementations; pipeline code receives spans from the tracer instead.
    ///
    /// [`Tracer`]: crate::Tracer
    pub fn new(
        trace_id: TraceId,
        span_id: SpanId,
        parent_span_id: Option<SpanId>,
        name: impl Into<String>,
        kind: SpanKind,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id,
            name: name.into(),
            kind,
            attributes: AttributeMap::new(),
            status: SpanStatus::Unset,
            started_at: SystemTime::now(),
            ended_at: None,
        }
    }

    /// Returns the ID of the trace this span belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Returns the ID of this span.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Returns the ID of the parent span within the same process, if any. Spans linked
    /// to an upstream process carry the propagated [`TraceId`] but no parent span ID.
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    /// Returns the span name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the span kind.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns the attributes recorded on this span so far.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Returns the recorded status.
    pub fn status(&self) -> &SpanStatus {
        &self.status
    }

    /// Returns the instant the span was opened.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Returns the instant the span was closed, or `None` if it is still open.
    pub fn ended_at(&self) -> Option<SystemTime> {
        self.ended_at
    }

    /// Checks whether the span has been closed.
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Records an attribute on this span, overwriting a previous value for the same key.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key, value);
    }

    /// Sets the span status.
    pub fn set_status(&mut self, status: SpanStatus) {
        self.status = status;
    }

    /// Attaches exception detail to this span and marks it as failed. Does not close
    /// the span and never alters the control flow of the caller.
    pub fn record_exception(&mut self, error: &(dyn error::Error + 'static)) {
        let message = error.to_string();
        self.attributes
            .insert("ExceptionMessage", message.clone());
        self.status = SpanStatus::Error { message };
    }

    pub(crate) fn end(&mut self) {
        self.ended_at = Some(SystemTime::now());
    }
}
