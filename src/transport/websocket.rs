use super::{
    CloseCode, Connection, ConnectionControl, DialRequest, Frame, FrameReader, Transport,
    TransportError,
};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Websocket implementation of [`Transport`].
///
/// The auth token travels as the `Sec-WebSocket-Protocol` header, and the
/// handshake fails unless the server echoes that subprotocol back.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn dial(&self, request: &DialRequest) -> Result<Connection, TransportError> {
        let mut ws_request = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let protocol = HeaderValue::from_str(&request.auth_protocol)
            .map_err(|e| TransportError::InvalidRequest(format!("bad auth header: {}", e)))?;
        ws_request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);

        let (stream, response) = tokio::time::timeout(self.handshake_timeout, connect_async(ws_request))
            .await
            .map_err(|_| TransportError::Timeout(self.handshake_timeout))?
            .map_err(map_handshake_error)?;

        debug!(
            host = request.url.host_str().unwrap_or_default(),
            status = response.status().as_u16(),
            "Websocket handshake completed"
        );

        let (sink, stream) = stream.split();
        Ok(Connection::new(
            Box::new(WebSocketReader { stream }),
            Arc::new(WebSocketControl {
                sink: Mutex::new(sink),
            }),
        ))
    }
}

struct WebSocketReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WebSocketReader {
    async fn receive(&mut self) -> Result<Frame, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Frame::new(text.into_bytes())),
                Some(Ok(Message::Binary(data))) => return Ok(Frame::new(data)),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    trace!(
                        code = frame.as_ref().map(|f| u16::from(f.code)),
                        "Received close frame"
                    );
                    return Err(TransportError::Closed);
                }
                Some(Err(e)) => return Err(map_ws_error(e)),
                None => return Err(TransportError::Closed),
            }
        }
    }
}

struct WebSocketControl {
    sink: Mutex<SplitSink<WsStream, Message>>,
}

#[async_trait]
impl ConnectionControl for WebSocketControl {
    async fn send_close(
        &self,
        code: CloseCode,
        reason: &str,
        deadline: Duration,
    ) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code.as_u16()),
            reason: Cow::Owned(reason.to_string()),
        };

        let mut sink = self.sink.lock().await;
        tokio::time::timeout(deadline, sink.send(Message::Close(Some(frame))))
            .await
            .map_err(|_| TransportError::Timeout(deadline))?
            .map_err(map_ws_error)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(map_ws_error(e)),
        }
    }
}

fn map_handshake_error(error: WsError) -> TransportError {
    match error {
        WsError::Protocol(ProtocolError::SecWebSocketSubProtocolError(e)) => TransportError::Connect(
            format!("server did not accept the token subprotocol: {}", e),
        ),
        other => TransportError::Connect(other.to_string()),
    }
}

fn map_ws_error(error: WsError) -> TransportError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => TransportError::Protocol(other.to_string()),
    }
}
