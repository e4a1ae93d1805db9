//! Transport message surface consumed by the pipeline observers.

use serde::{Deserialize, Serialize};

use std::{fmt, time::SystemTime};

/// Ordered key-value string pairs attached to a transport message.
///
/// Keys are compared case-sensitively. Duplicate keys for the propagation protocol are
/// disallowed; [`Self::append()`] is presence-checked accordingly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHeaders {
    inner: Vec<(String, String)>,
}

impl MessageHeaders {
    /// Creates an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of headers.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Checks whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the value of the first header with the specified key, or `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find_map(|(existing, value)| (existing == key).then_some(value.as_str()))
    }

    /// Checks whether a header with the specified key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.iter().any(|(existing, _)| existing == key)
    }

    /// Appends a header if no header with the same key exists yet. Returns whether
    /// the header was added.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.inner.push((key, value.into()));
        true
    }

    /// Sets a header value, replacing the value of an existing header with the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(position) = self.inner.iter().position(|(existing, _)| *existing == key) {
            self.inner[position].1 = value;
        } else {
            self.inner.push((key, value));
        }
    }

    /// Iterates over headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.inner
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Processing status the host pipeline has assigned to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// The message is due for handling.
    Active,
    /// The message should be ignored; instrumentation is skipped entirely.
    Ignore,
    /// The message was already handled; instrumentation is skipped entirely.
    Handled,
}

/// Metadata of a message traveling through the bus, as visible to the instrumentation.
///
/// Payload serialization, encryption and compression happen elsewhere in the host
/// pipeline; the observers only read the resulting algorithm names and bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Unique ID of this message.
    pub message_id: String,
    /// Business correlation ID, if one was assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Fully qualified name of the enclosed message type.
    pub message_type: String,
    /// URI of the queue the message is routed to.
    #[serde(default)]
    pub recipient_uri: String,
    /// Name of the encryption algorithm applied to the payload, if any.
    #[serde(default)]
    pub encryption_algorithm: String,
    /// Name of the compression algorithm applied to the payload, if any.
    #[serde(default)]
    pub compression_algorithm: String,
    /// Instant after which the message is considered expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<SystemTime>,
    /// Serialized payload bytes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
    /// Transport headers, including the propagation headers managed by this crate.
    #[serde(default)]
    pub headers: MessageHeaders,
}

impl TransportMessage {
    /// Creates a message with the specified ID and type name; remaining fields start empty.
    pub fn new(message_id: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            correlation_id: None,
            message_type: message_type.into(),
            recipient_uri: String::new(),
            encryption_algorithm: String::new(),
            compression_algorithm: String::new(),
            expires_at: None,
            body: Vec::new(),
            headers: MessageHeaders::new(),
        }
    }

    /// Checks whether the message has expired.
    pub fn has_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= SystemTime::now())
    }
}

impl fmt::Display for TransportMessage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} [{}]",
            self.message_type, self.message_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn append_is_presence_checked() {
        let mut headers = MessageHeaders::new();
        assert!(headers.append("Baggage", "a=1"));
        assert!(!headers.append("Baggage", "b=2"));
        assert_eq!(headers.get("Baggage"), Some("a=1"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn header_keys_are_case_sensitive() {
        let mut headers = MessageHeaders::new();
        headers.append("Baggage", "a=1");
        assert!(!headers.contains_key("baggage"));
    }

    #[test]
    fn expiry_is_checked_against_the_clock() {
        let mut message = TransportMessage::new("M1", "Orders.PlaceOrder");
        assert!(!message.has_expired());

        message.expires_at = Some(SystemTime::now() - Duration::from_secs(60));
        assert!(message.has_expired());
    }
}
