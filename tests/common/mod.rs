#![allow(dead_code)]

use async_trait::async_trait;
use logtail::tail::Sleeper;
use logtail::transport::{
    CloseCode, Connection, ConnectionControl, DialRequest, Frame, FrameReader, Transport,
    TransportError,
};
use logtail::{MemorySink, TailConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const TAIL_URL: &str = "wss://logs.example.com/api/v1/tail";

pub fn test_config() -> TailConfig {
    TailConfig::new(TAIL_URL, "secret")
}

enum DialScript {
    Fail(String),
    Connect(Connection),
}

/// Transport whose dials follow a script.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<DialScript>>,
    requests: Mutex<Vec<DialRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next dial succeeds; the returned handle drives the connection.
    pub fn push_connection(&self) -> MockConnection {
        self.push(false)
    }

    /// Next dial succeeds with a peer that never acknowledges a close: sending
    /// the close message runs out its deadline and closing never completes.
    pub fn push_stalled_connection(&self) -> MockConnection {
        self.push(true)
    }

    fn push(&self, stalled: bool) -> MockConnection {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        let close_frames = Arc::new(AtomicUsize::new(0));

        let connection = Connection::new(
            Box::new(MockReader {
                rx,
                closed: closed.clone(),
            }),
            Arc::new(MockControl {
                closed: closed.clone(),
                close_frames: Arc::clone(&close_frames),
                stalled,
            }),
        );
        self.script
            .lock()
            .unwrap()
            .push_back(DialScript::Connect(connection));

        MockConnection {
            tx,
            closed,
            close_frames,
        }
    }

    /// Next dial fails with `reason`.
    pub fn push_failure(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(DialScript::Fail(reason.to_string()));
    }

    pub fn dial_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<DialRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn dial(&self, request: &DialRequest) -> Result<Connection, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(DialScript::Connect(connection)) => Ok(connection),
            Some(DialScript::Fail(reason)) => Err(TransportError::Connect(reason)),
            None => Err(TransportError::Connect("no scripted connection".to_string())),
        }
    }
}

/// Test side of a scripted connection.
pub struct MockConnection {
    tx: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    closed: CancellationToken,
    close_frames: Arc<AtomicUsize>,
}

impl MockConnection {
    pub fn send(&self, payload: &str) {
        let _ = self.tx.send(Ok(Frame::from(payload)));
    }

    pub fn fail(&self, error: TransportError) {
        let _ = self.tx.send(Err(error));
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of close control messages sent on this connection
    pub fn close_frames(&self) -> usize {
        self.close_frames.load(Ordering::SeqCst)
    }
}

struct MockReader {
    rx: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    closed: CancellationToken,
}

#[async_trait]
impl FrameReader for MockReader {
    async fn receive(&mut self) -> Result<Frame, TransportError> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            message = self.rx.recv() => message.unwrap_or(Err(TransportError::Closed)),
        }
    }
}

struct MockControl {
    closed: CancellationToken,
    close_frames: Arc<AtomicUsize>,
    stalled: bool,
}

#[async_trait]
impl ConnectionControl for MockControl {
    async fn send_close(
        &self,
        code: CloseCode,
        reason: &str,
        deadline: Duration,
    ) -> Result<(), TransportError> {
        assert_eq!(code, CloseCode::GoingAway);
        assert_eq!(reason, "closing");
        self.close_frames.fetch_add(1, Ordering::SeqCst);
        if self.stalled {
            tokio::time::sleep(deadline).await;
            return Err(TransportError::Timeout(deadline));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.closed.cancel();
        Ok(())
    }
}

/// Records requested waits instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Sleeper that never wakes, parking the retry loop between attempts.
pub struct PendingSleeper;

#[async_trait]
impl Sleeper for PendingSleeper {
    async fn sleep(&self, _duration: Duration) {
        std::future::pending::<()>().await;
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn messages(sink: &MemorySink) -> Vec<String> {
    sink.records().into_iter().map(|r| r.message).collect()
}
