use crate::pipeline::Receiver;
use crate::sink::{LogSink, Severity, SinkRecord};
use crate::tail::message::LogMessage;
use crate::tail::watermark::WatermarkTracker;
use std::sync::Arc;
use tracing::{debug, trace};

/// Counters reported by the consumer when its channel closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub frames: u64,
    pub lines: u64,
    pub decode_failures: u64,
}

/// Run the decode/render task.
///
/// Drains frames until every sender is dropped. Each frame is decoded,
/// rendered into the sink, and the watermark is set to the newest stream
/// timestamp of the batch. Frames that fail to decode are reported to the sink
/// and skipped.
pub async fn run_consumer(
    mut input: Receiver,
    sink: Arc<dyn LogSink>,
    watermark: Arc<WatermarkTracker>,
) -> ConsumerStats {
    let mut stats = ConsumerStats::default();

    while let Some(frame) = input.recv().await {
        stats.frames += 1;

        let message = match LogMessage::decode(frame.as_bytes()) {
            Ok(message) => message,
            Err(e) => {
                stats.decode_failures += 1;
                sink.emit(
                    SinkRecord::new(
                        Severity::Error,
                        format!("couldn't unmarshal a message from the cloud: {}", frame),
                    )
                    .with_field("error", e.to_string()),
                );
                continue;
            }
        };

        message.render(sink.as_ref());
        stats.lines += message.line_count() as u64;

        let latest = message.latest_timestamp();
        watermark.set(latest);

        trace!(
            streams = message.streams.len(),
            dropped = message.dropped_entries.len(),
            latest = latest,
            "Rendered log message"
        );
    }

    debug!(
        frames = stats.frames,
        lines = stats.lines,
        decode_failures = stats.decode_failures,
        "Frame channel closed, consumer stopping"
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::create_channel;
    use crate::sink::MemorySink;
    use crate::transport::Frame;

    #[tokio::test]
    async fn test_consumer_renders_and_advances_watermark() {
        let (tx, rx) = create_channel(10);
        let sink = MemorySink::new();
        let watermark = Arc::new(WatermarkTracker::new());

        tx.send(Frame::from(
            r#"{"streams":[{"stream":{"level":"warn","job":"x"},"values":[["200","hello"]]}],"dropped_entries":[]}"#,
        ))
        .await
        .unwrap();
        drop(tx);

        let stats = run_consumer(rx, Arc::new(sink.clone()), Arc::clone(&watermark)).await;

        assert_eq!(stats, ConsumerStats { frames: 1, lines: 1, decode_failures: 0 });
        assert_eq!(watermark.get(), Some(200));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Warn);
        assert_eq!(records[0].message, "hello");
    }

    #[tokio::test]
    async fn test_decode_failure_is_not_fatal() {
        let (tx, rx) = create_channel(10);
        let sink = MemorySink::new();
        let watermark = Arc::new(WatermarkTracker::new());

        tx.send(Frame::from("{broken")).await.unwrap();
        tx.send(Frame::from(r#"{"streams":[{"stream":{},"values":[["300","after"]]}]}"#))
            .await
            .unwrap();
        drop(tx);

        let stats = run_consumer(rx, Arc::new(sink.clone()), Arc::clone(&watermark)).await;

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.decode_failures, 1);
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].severity, Severity::Error);
        assert!(records[0].message.contains("{broken"));
        assert!(records[0].fields.contains_key("error"));
        assert_eq!(records[1].message, "after");
        assert_eq!(watermark.get(), Some(300));
    }

    #[tokio::test]
    async fn test_dropped_only_batch_keeps_watermark() {
        let (tx, rx) = create_channel(10);
        let sink = MemorySink::new();
        let watermark = Arc::new(WatermarkTracker::new());
        watermark.set(100);

        tx.send(Frame::from(
            r#"{"streams":[],"dropped_entries":[{"labels":{"job":"x"},"timestamp":"900"}]}"#,
        ))
        .await
        .unwrap();
        drop(tx);

        run_consumer(rx, Arc::new(sink.clone()), Arc::clone(&watermark)).await;

        assert_eq!(watermark.get(), Some(100));
        assert_eq!(sink.records()[0].message, "dropped");
    }
}
