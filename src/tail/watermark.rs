use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Concurrency-safe holder of the latest observed event timestamp (unix nanos).
///
/// Writes are last-write-wins; zero means no watermark yet.
#[derive(Debug, Default)]
pub struct WatermarkTracker {
    ts: AtomicI64,
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `ts`. Values below 1 are ignored.
    pub fn set(&self, ts: i64) {
        if ts < 1 {
            return;
        }
        self.ts.store(ts, Ordering::SeqCst);
    }

    /// Raw watermark, `None` until the first valid `set`
    pub fn get(&self) -> Option<i64> {
        match self.ts.load(Ordering::SeqCst) {
            ts if ts > 0 => Some(ts),
            _ => None,
        }
    }

    /// Resume point for a new connection: the watermark plus 1ms so the last
    /// seen record is not fetched again, or now when nothing was seen yet.
    pub fn time_or_now(&self) -> DateTime<Utc> {
        match self.get() {
            Some(ts) => Utc.timestamp_nanos(ts) + ChronoDuration::milliseconds(1),
            None => Utc::now(),
        }
    }
}
