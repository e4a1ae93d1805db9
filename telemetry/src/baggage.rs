//! Correlation baggage and its wire codec.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use std::fmt;

/// Chars escaped in baggage keys and values so that the `k=v,k=v` framing survives
/// arbitrary input.
const COMPONENT_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b',')
    .add(b'=')
    .add(b'&')
    .add(b'"');

/// Correlation key-value context scoped to one execution context and propagated to the
/// next process alongside the trace ID.
///
/// Entries iterate in insertion order, which is also the encoding order. An updated entry
/// preserves its old placement.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Baggage {
    inner: Vec<(String, String)>,
}

impl fmt::Debug for Baggage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = formatter.debug_map();
        for (key, value) in &self.inner {
            map.entry(key, value);
        }
        map.finish()
    }
}

impl Baggage {
    /// Creates empty baggage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Checks whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the value for the specified key, or `None` if it is not set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find_map(|(existing, value)| (existing == key).then_some(value.as_str()))
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.inner
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Sets an entry, overwriting a previous value for the same key in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(position) = self.inner.iter().position(|(existing, _)| *existing == key) {
            self.inner[position].1 = value;
        } else {
            self.inner.push((key, value));
        }
    }

    /// Merges baggage received from an upstream process into this (locally established)
    /// baggage. Propagated entries win for overlapping keys.
    pub fn merge_propagated(&mut self, propagated: Baggage) {
        for (key, value) in propagated.inner {
            self.set(key, value);
        }
    }

    /// Encodes this baggage as a single `key1=value1,key2=value2` string with URL-encoded
    /// keys and values. Empty baggage encodes to an empty string, which must not be
    /// written as a header.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.inner {
            if !out.is_empty() {
                out.push(',');
            }
            out.push_str(&utf8_percent_encode(key, COMPONENT_ESCAPES).to_string());
            out.push('=');
            out.push_str(&utf8_percent_encode(value, COMPONENT_ESCAPES).to_string());
        }
        out
    }

    /// Decodes baggage from its wire presentation. Malformed items (no `=` separator, or
    /// a key or value that does not survive URL-decoding) are skipped individually;
    /// decoding never fails as a whole.
    ///
    /// Round-trip contract: `Baggage::decode(&b.encode()) == b` for any baggage.
    pub fn decode(encoded: &str) -> Self {
        let mut baggage = Self::new();
        for item in encoded.split(',') {
            let Some((raw_key, raw_value)) = item.split_once('=') else {
                continue;
            };
            if raw_key.is_empty() {
                continue;
            }
            let Ok(key) = percent_decode_str(raw_key).decode_utf8() else {
                continue;
            };
            let Ok(value) = percent_decode_str(raw_value).decode_utf8() else {
                continue;
            };
            baggage.set(key.into_owned(), value.into_owned());
        }
        baggage
    }
}

impl FromIterator<(String, String)> for Baggage {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut this = Self::new();
        for (key, value) in iter {
            this.set(key, value);
        }
        this
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_preserves_insertion_order() {
        let mut baggage = Baggage::new();
        baggage.set("CorrelationId", "abc-1");
        baggage.set("MessageId", "77");

        assert_eq!(baggage.encode(), "CorrelationId=abc-1,MessageId=77");
    }

    #[test]
    fn empty_baggage_encodes_to_empty_string() {
        assert_eq!(Baggage::new().encode(), "");
        assert!(Baggage::decode("").is_empty());
    }

    #[test]
    fn round_trip_for_arbitrary_values() {
        let mut baggage = Baggage::new();
        baggage.set("CorrelationId", "abc-1");
        baggage.set("MessageId", "77");
        baggage.set("Tenant", "ACME & sons = 100%");

        let decoded = Baggage::decode(&baggage.encode());
        assert_eq!(decoded, baggage);
    }

    #[test]
    fn keys_with_separator_chars_survive_a_round_trip() {
        let mut baggage = Baggage::new();
        baggage.set("a=b", "v");
        baggage.set("x,y", "w");
        baggage.set("100%", "z");

        let encoded = baggage.encode();
        assert_eq!(encoded, "a%3Db=v,x%2Cy=w,100%25=z");

        let decoded = Baggage::decode(&encoded);
        assert_eq!(decoded, baggage);
        assert_eq!(decoded.get("a=b"), Some("v"));
    }

    #[test]
    fn malformed_items_are_skipped_individually() {
        let baggage = Baggage::decode("CorrelationId=abc-1,garbage,MessageId=77,=nokey");
        assert_eq!(baggage.len(), 2);
        assert_eq!(baggage.get("CorrelationId"), Some("abc-1"));
        assert_eq!(baggage.get("MessageId"), Some("77"));
    }

    #[test]
    fn invalid_percent_sequences_skip_only_their_item() {
        let baggage = Baggage::decode("Bad=%ff%fe,Good=ok");
        assert_eq!(baggage.get("Bad"), None);
        assert_eq!(baggage.get("Good"), Some("ok"));
    }

    #[test]
    fn updating_an_entry_preserves_placement() {
        let mut baggage = Baggage::new();
        baggage.set("a", "1");
        baggage.set("b", "2");
        baggage.set("a", "3");

        let entries: Vec<_> = baggage.iter().collect();
        assert_eq!(entries, [("a", "3"), ("b", "2")]);
    }

    #[test]
    fn propagated_entries_win_on_merge() {
        let mut local = Baggage::new();
        local.set("CorrelationId", "local");
        local.set("Origin", "here");

        let mut propagated = Baggage::new();
        propagated.set("CorrelationId", "upstream");

        local.merge_propagated(propagated);
        assert_eq!(local.get("CorrelationId"), Some("upstream"));
        assert_eq!(local.get("Origin"), Some("here"));
    }
}
