//! Log records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One durable log record: a flat string-attribute mapping.
///
/// Backed by a `BTreeMap` so field order is deterministic wherever the
/// record is serialized (file lines and queue payloads encode identically).
/// Records are immutable once handed to the log.
///
/// Typical fields: `Timestamp` (base-36 epoch milliseconds, see
/// [`LogEntry::encode_timestamp`]), `Type`, `ChannelID`, `AuthorID`,
/// `Content`, optionally `GuildID` and `AuthorUsername`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry(BTreeMap<String, String>);

impl LogEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder pattern).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode a timestamp the way records expect it: epoch milliseconds in
    /// base 36.
    pub fn encode_timestamp(timestamp: DateTime<Utc>) -> String {
        to_base36(timestamp.timestamp_millis())
    }
}

impl FromIterator<(String, String)> for LogEntry {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn to_base36(value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let negative = value < 0;
    let mut remainder = value.unsigned_abs();
    let mut digits = Vec::new();
    while remainder > 0 {
        digits.push(DIGITS[(remainder % 36) as usize] as char);
        remainder /= 36;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn base36_digits() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1295), "zz");
        assert_eq!(to_base36(-36), "-10");
    }

    #[test]
    fn timestamp_encodes_epoch_millis() {
        let ts = Utc.timestamp_millis_opt(1_000).unwrap();
        // 1000 ms = 27*36 + 28 -> "rs"
        assert_eq!(LogEntry::encode_timestamp(ts), "rs");
    }

    #[test]
    fn tracks_fields_in_sorted_order() {
        let mut entry = LogEntry::new();
        assert!(entry.is_empty());

        entry.insert("Type", "MESSAGE");
        entry.insert("AuthorID", "7");
        assert_eq!(entry.len(), 2);
        assert!(!entry.is_empty());

        let fields: Vec<_> = entry.fields().collect();
        assert_eq!(fields, vec![("AuthorID", "7"), ("Type", "MESSAGE")]);
    }

    #[test]
    fn serializes_with_sorted_field_order() {
        let entry = LogEntry::new()
            .with("Type", "MESSAGE")
            .with("AuthorID", "7")
            .with("Content", "hi");
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"AuthorID":"7","Content":"hi","Type":"MESSAGE"}"#);
    }

    #[test]
    fn round_trips_through_json() {
        let entry = LogEntry::new().with("ChannelID", "123").with("Content", "hello");
        let json = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
