use crate::{
    error::TransportError,
    streams::timeout::{DEFAULT_READ_TIMEOUT, TimeoutStream},
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::debug;
use url::Url;

/// Bidirectional text transport carrying the feed.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame, or `None` once the peer has ended the stream.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens a [`Transport`] to a feed url.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self, url: &Url) -> Result<Self::Transport, TransportError>;
}

/// [`Connector`] producing [`WsTransport`]s over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    read_timeout: Duration,
}

impl WsConnector {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TIMEOUT)
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &Url) -> Result<Self::Transport, TransportError> {
        let (websocket, response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        debug!(
            status = %response.status(),
            host = url.host_str(),
            "feed websocket handshake complete"
        );

        Ok(WsTransport {
            stream: TimeoutStream::new(websocket, self.read_timeout),
        })
    }
}

/// WebSocket [`Transport`] with a read-idle timeout.
pub struct WsTransport {
    stream: TimeoutStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .get_mut()
            .send(Message::text(text))
            .await
            .map_err(|error| TransportError::Send(error.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => {
                    return Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|error| TransportError::Receive(error.to_string())),
                    );
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|frame| format!("{} {}", frame.code, frame.reason.as_str()))
                        .unwrap_or_else(|| "close frame without reason".to_string());
                    return Some(Err(TransportError::ClosedByPeer(reason)));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(error)) => return Some(Err(receive_error(error))),
                None if self.stream.timed_out() => {
                    return Some(Err(TransportError::ReadTimeout(self.stream.timeout())));
                }
                None => return None,
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.get_mut().close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(error) => Err(TransportError::Send(error.to_string())),
        }
    }
}

fn receive_error(error: WsError) -> TransportError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            TransportError::ClosedByPeer(error.to_string())
        }
        other => TransportError::Receive(other.to_string()),
    }
}
