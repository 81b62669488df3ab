use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Severity of a record written to a [`LogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a valid severity level: {0:?}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    /// Parses the level names used by the log origin, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "panic" => Ok(Severity::Panic),
            "fatal" => Ok(Severity::Fatal),
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Panic => "panic",
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warn => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Field mapping attached to a sink record.
pub type Fields = BTreeMap<String, String>;

/// One structured record handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub severity: Severity,
    pub fields: Fields,
    /// Origin time of the record; `None` for records produced locally
    pub time: Option<DateTime<Utc>>,
    pub message: String,
}

impl SinkRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            fields: Fields::new(),
            time: None,
            message: message.into(),
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
}

/// Structured logger receiving rendered remote log records.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: SinkRecord);
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn emit(&self, record: SinkRecord) {
        (**self).emit(record)
    }
}

/// Forwards records to `tracing` under the `logtail::remote` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

struct DisplayFields<'a>(&'a Fields);

impl fmt::Display for DisplayFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

macro_rules! remote_event {
    ($level:expr, $record:expr) => {{
        let record = $record;
        let time = record
            .time
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true))
            .unwrap_or_default();
        tracing::event!(
            target: "logtail::remote",
            $level,
            severity = %record.severity,
            labels = %DisplayFields(&record.fields),
            time = %time,
            "{}",
            record.message
        );
    }};
}

impl LogSink for TracingSink {
    fn emit(&self, record: SinkRecord) {
        // tracing has no panic/fatal levels; the `severity` field keeps them
        match record.severity {
            Severity::Panic | Severity::Fatal | Severity::Error => {
                remote_event!(tracing::Level::ERROR, record)
            }
            Severity::Warn => remote_event!(tracing::Level::WARN, record),
            Severity::Info => remote_event!(tracing::Level::INFO, record),
            Severity::Debug => remote_event!(tracing::Level::DEBUG, record),
            Severity::Trace => remote_event!(tracing::Level::TRACE, record),
        }
    }
}

/// Collects records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SinkRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records emitted so far, in emission order
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: SinkRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
