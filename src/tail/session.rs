use crate::pipeline::{create_channel, run_consumer, Sender, DEFAULT_BUFFER_LIMIT};
use crate::sink::{LogSink, Severity, SinkRecord};
use crate::tail::retry::{retry, RetryPolicy, Sleeper, TokioSleeper};
use crate::tail::watermark::WatermarkTracker;
use crate::transport::{
    CloseCode, Connection, ConnectionControl, DialRequest, FrameReader, Transport, TransportError,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Deadline applied to the close control message sent on cancellation
pub const DEFAULT_CLOSE_DEADLINE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TailError {
    #[error("couldn't parse cloud logs host: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to connect to the logs service: {0}")]
    Dial(#[source] TransportError),

    /// The stream broke and could not be re-established. `read` is the error
    /// that broke the stream; `dial` is the last reconnect failure.
    #[error("{read} (reconnect failed: {dial})")]
    Reconnect {
        #[source]
        read: TransportError,
        dial: TransportError,
    },

    #[error("log pipeline closed unexpectedly")]
    PipelineClosed,

    #[error("log consumer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Connection settings shared by every session of a [`LogTailer`].
#[derive(Debug, Clone)]
pub struct TailConfig {
    pub logs_tail_url: String,
    pub token: String,
    pub retry: RetryPolicy,
    pub buffer_limit: usize,
    pub close_deadline: Duration,
}

impl TailConfig {
    pub fn new(logs_tail_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            logs_tail_url: logs_tail_url.into(),
            token: token.into(),
            retry: RetryPolicy::default(),
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            close_deadline: DEFAULT_CLOSE_DEADLINE,
        }
    }
}

/// State of one tail invocation. The watermark is the only state carried
/// across reconnects.
#[derive(Debug)]
pub struct StreamSession {
    reference_id: String,
    tail_from: Duration,
    watermark: Arc<WatermarkTracker>,
}

impl StreamSession {
    pub fn new(reference_id: impl Into<String>, tail_from: Duration) -> Self {
        Self {
            reference_id: reference_id.into(),
            tail_from,
            watermark: Arc::new(WatermarkTracker::new()),
        }
    }

    pub fn watermark(&self) -> Arc<WatermarkTracker> {
        Arc::clone(&self.watermark)
    }

    /// Start of the first connection: now minus the look-back window
    fn initial_start(&self) -> DateTime<Utc> {
        let now = Utc::now();
        ChronoDuration::from_std(self.tail_from)
            .ok()
            .and_then(|look_back| now.checked_sub_signed(look_back))
            .unwrap_or(now)
    }
}

/// Build the dial request for `reference_id` starting at `since`.
pub fn build_dial_request(
    base: &Url,
    reference_id: &str,
    since: DateTime<Utc>,
    token: &str,
) -> DialRequest {
    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("query", &format!(r#"{{test_run_id="{}"}}"#, reference_id))
        .append_pair("start", &since.timestamp_nanos_opt().unwrap_or_default().to_string());

    DialRequest {
        url,
        auth_protocol: format!("token={}", token),
    }
}

/// Tails the remote log stream into a sink, reconnecting on read errors.
pub struct LogTailer {
    config: TailConfig,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl LogTailer {
    pub fn new(config: TailConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the clock used between dial attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Stream the logs of `reference_id`, starting `tail_from` in the past,
    /// into `sink` until `cancel` fires or the stream fails for good.
    pub async fn stream_logs(
        &self,
        cancel: CancellationToken,
        sink: Arc<dyn LogSink>,
        reference_id: &str,
        tail_from: Duration,
    ) -> Result<(), TailError> {
        let session = StreamSession::new(reference_id, tail_from);
        self.run(&session, cancel, sink).await
    }

    /// Drive one session to completion.
    ///
    /// Returns `Ok(())` once cancelled. Any error is terminal; starting a new
    /// session is up to the caller.
    pub async fn run(
        &self,
        session: &StreamSession,
        cancel: CancellationToken,
        sink: Arc<dyn LogSink>,
    ) -> Result<(), TailError> {
        let base = Url::parse(&self.config.logs_tail_url)?;

        let conn = match self
            .connect(&base, session, session.initial_start(), &cancel)
            .await
        {
            Ok(Some(conn)) => conn,
            Ok(None) => {
                debug!(reference_id = %session.reference_id, "Cancelled before connecting");
                return Ok(());
            }
            Err(e) => {
                error!(reference_id = %session.reference_id, error = %e, "Failed to connect to logs service");
                return Err(TailError::Dial(e));
            }
        };
        info!(reference_id = %session.reference_id, "Streaming logs");

        // The supervisor is the only writer of the active connection cell;
        // the watcher only reads it, so a swap and a close never interleave.
        let (control_tx, control_rx) = watch::channel(Arc::clone(&conn.control));
        let watcher = tokio::spawn(watch_cancellation(
            cancel.clone(),
            control_rx,
            self.config.close_deadline,
        ));

        let (frames_tx, frames_rx) = create_channel(self.config.buffer_limit);
        let consumer = tokio::spawn(run_consumer(frames_rx, Arc::clone(&sink), session.watermark()));

        let result = self
            .read_loop(&base, session, conn.reader, &control_tx, frames_tx, sink.as_ref(), &cancel)
            .await;

        if cancel.is_cancelled() {
            if let Err(e) = watcher.await {
                warn!(error = %e, "Cancellation watcher failed");
            }
        } else {
            watcher.abort();
        }

        // frames_tx was dropped with the read loop; wait for the backlog to render
        let stats = consumer.await?;
        info!(
            reference_id = %session.reference_id,
            frames = stats.frames,
            lines = stats.lines,
            decode_failures = stats.decode_failures,
            "Log stream stopped"
        );

        result
    }

    /// Dial with the retry policy. `Ok(None)` means cancellation won the race.
    async fn connect(
        &self,
        base: &Url,
        session: &StreamSession,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Option<Connection>, TransportError> {
        let request = build_dial_request(base, &session.reference_id, since, &self.config.token);
        debug!(
            reference_id = %session.reference_id,
            start = %since,
            "Dialing logs service"
        );

        let dial = retry(self.sleeper.as_ref(), &self.config.retry, || {
            self.transport.dial(&request)
        });

        tokio::select! {
            _ = cancel.cancelled() => Ok(None),
            result = dial => result.map(Some),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn read_loop(
        &self,
        base: &Url,
        session: &StreamSession,
        mut reader: Box<dyn FrameReader>,
        control_tx: &watch::Sender<Arc<dyn ConnectionControl>>,
        frames: Sender,
        sink: &dyn LogSink,
        cancel: &CancellationToken,
    ) -> Result<(), TailError> {
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                received = reader.receive() => received,
            };

            // check if we should stop before continuing
            if cancel.is_cancelled() {
                return Ok(());
            }

            let read_err = match received {
                Ok(frame) => {
                    trace!(bytes = frame.len(), "Received frame");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(()),
                        sent = frames.send(frame) => {
                            if sent.is_err() {
                                return Err(TailError::PipelineClosed);
                            }
                        }
                    }
                    continue;
                }
                Err(e) => e,
            };

            warn!(
                reference_id = %session.reference_id,
                error = %read_err,
                "Error reading from logs service, reconnecting"
            );
            sink.emit(
                SinkRecord::new(
                    Severity::Warn,
                    "error reading a log message from the cloud, trying to establish a fresh connection with the logs service...",
                )
                .with_field("error", read_err.to_string()),
            );

            // Frames still queued for rendering are not reflected in the
            // watermark yet, so the first frames after resuming may repeat.
            let resume = session.watermark.time_or_now();
            match self.connect(base, session, resume, cancel).await {
                Ok(Some(conn)) => {
                    info!(
                        reference_id = %session.reference_id,
                        resume = %resume,
                        "Reconnected to logs service"
                    );
                    control_tx.send_replace(conn.control);
                    reader = conn.reader;
                }
                Ok(None) => return Ok(()),
                Err(dial_err) => {
                    error!(
                        reference_id = %session.reference_id,
                        error = %dial_err,
                        "Reconnect failed, giving up"
                    );
                    return Err(TailError::Reconnect {
                        read: read_err,
                        dial: dial_err,
                    });
                }
            }
        }
    }
}

/// Wait for cancellation, then close whichever connection is active.
///
/// The close message and the close itself share one deadline.
async fn watch_cancellation(
    cancel: CancellationToken,
    active: watch::Receiver<Arc<dyn ConnectionControl>>,
    deadline: Duration,
) {
    cancel.cancelled().await;
    let until = Instant::now() + deadline;

    let control = Arc::clone(&*active.borrow());
    match timeout_at(until, control.send_close(CloseCode::GoingAway, "closing", deadline)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Failed to send close message"),
        Err(_) => debug!("Timed out sending close message"),
    }
    match timeout_at(until, control.close()).await {
        Ok(Ok(())) => debug!("Connection closed"),
        Ok(Err(e)) => debug!(error = %e, "Failed to close connection"),
        Err(_) => debug!("Timed out closing connection"),
    }
}
