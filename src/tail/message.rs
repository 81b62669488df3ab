use crate::sink::{Fields, LogSink, Severity, SinkRecord};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Key/value mapping identifying the origin of a stream.
pub type LabelSet = BTreeMap<String, String>;

#[derive(Debug, Error)]
#[error("invalid log message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// One decoded push from the logs service.
///
/// ```json
/// {"streams":[{"stream":{"job":"x"},"values":[["200","hello"]]}],
///  "dropped_entries":[{"labels":{"job":"x"},"timestamp":"100"}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogMessage {
    #[serde(default)]
    pub streams: Vec<StreamEntry>,
    #[serde(default)]
    pub dropped_entries: Vec<DroppedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamEntry {
    #[serde(rename = "stream", default)]
    pub labels: LabelSet,
    /// Newest first, as sent by the origin
    #[serde(default)]
    pub values: Vec<StreamValue>,
}

/// A `[timestamp, line]` pair; the timestamp is unix nanos as a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamValue {
    pub timestamp: String,
    pub line: String,
}

/// A line the origin could not deliver, e.g. because of rate limiting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DroppedEntry {
    #[serde(default)]
    pub labels: LabelSet,
    pub timestamp: String,
}

/// Unix nanos from the wire representation; malformed values map to the epoch.
fn parse_nanos(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

fn nanos_to_time(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

impl StreamValue {
    pub fn new(timestamp: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            line: line.into(),
        }
    }

    pub fn timestamp_nanos(&self) -> i64 {
        parse_nanos(&self.timestamp)
    }
}

impl StreamEntry {
    /// Timestamp of the newest value, or 0 when empty or unparsable.
    pub fn latest_timestamp(&self) -> i64 {
        // values are sorted descending by the origin
        self.values
            .first()
            .map(StreamValue::timestamp_nanos)
            .unwrap_or(0)
    }
}

impl DroppedEntry {
    pub fn timestamp_nanos(&self) -> i64 {
        parse_nanos(&self.timestamp)
    }
}

impl LogMessage {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Newest timestamp across all streams. Dropped entries are not considered.
    pub fn latest_timestamp(&self) -> i64 {
        self.streams
            .iter()
            .map(StreamEntry::latest_timestamp)
            .max()
            .unwrap_or(0)
    }

    /// Total number of lines carried by the streams
    pub fn line_count(&self) -> usize {
        self.streams.iter().map(|s| s.values.len()).sum()
    }

    /// Write every line and dropped entry to `sink`.
    ///
    /// Lines are emitted in received order. A `level` label selects the
    /// severity and is removed from the fields; an unrecognized level is logged
    /// at info followed by a warning naming it.
    pub fn render(&self, sink: &dyn LogSink) {
        for stream in &self.streams {
            let mut fields: Fields = stream.labels.clone();
            let level = fields.remove("level");
            let severity = level.as_deref().map(str::parse::<Severity>);

            for value in &stream.values {
                let record = SinkRecord::new(Severity::Info, value.line.as_str())
                    .with_fields(fields.clone())
                    .with_time(nanos_to_time(value.timestamp_nanos()));

                match (&severity, &level) {
                    (Some(Ok(severity)), _) => sink.emit(SinkRecord {
                        severity: *severity,
                        ..record
                    }),
                    (Some(Err(_)), Some(level)) => {
                        let warning = SinkRecord {
                            severity: Severity::Warn,
                            message: format!("last message had unknown level {}", level),
                            ..record.clone()
                        };
                        sink.emit(record);
                        sink.emit(warning);
                    }
                    _ => sink.emit(record),
                }
            }
        }

        for dropped in &self.dropped_entries {
            sink.emit(
                SinkRecord::new(Severity::Warn, "dropped")
                    .with_fields(dropped.labels.clone())
                    .with_time(nanos_to_time(dropped.timestamp_nanos())),
            );
        }
    }
}
