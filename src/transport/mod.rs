pub mod websocket;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub use websocket::WebSocketTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid dial request: {0}")]
    InvalidRequest(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection closed")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// One discrete message received from the transport, prior to decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Vec<u8>,
}

impl Frame {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<&str> for Frame {
    fn from(payload: &str) -> Self {
        Self::new(payload.as_bytes())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.payload))
    }
}

/// Status code carried by a close control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    GoingAway,
}

impl CloseCode {
    pub fn as_u16(self) -> u16 {
        match self {
            CloseCode::GoingAway => 1001,
        }
    }
}

/// Everything needed to open one connection to the logs service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialRequest {
    pub url: Url,
    /// Sent as the subprotocol header, e.g. `token=abc`
    pub auth_protocol: String,
}

impl DialRequest {
    /// Value of a query parameter of the dial URL, if present
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Read half of a connection. Owned by exactly one reader at a time.
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next message. Control messages are handled internally;
    /// a closed or finished stream surfaces as [`TransportError::Closed`].
    async fn receive(&mut self) -> Result<Frame, TransportError>;
}

/// Write half of a connection, used only to shut it down.
#[async_trait]
pub trait ConnectionControl: Send + Sync {
    /// Send a close control message, giving up after `deadline`.
    async fn send_close(
        &self,
        code: CloseCode,
        reason: &str,
        deadline: Duration,
    ) -> Result<(), TransportError>;

    /// Close the underlying connection.
    async fn close(&self) -> Result<(), TransportError>;
}

/// An established duplex connection, split into its read and control halves.
pub struct Connection {
    pub reader: Box<dyn FrameReader>,
    pub control: Arc<dyn ConnectionControl>,
}

impl Connection {
    pub fn new(reader: Box<dyn FrameReader>, control: Arc<dyn ConnectionControl>) -> Self {
        Self { reader, control }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Dials message-oriented duplex connections.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(&self, request: &DialRequest) -> Result<Connection, TransportError>;
}
