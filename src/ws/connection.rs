//! Transport layer for the realtime channel.
//!
//! The connection manager talks to the wire through the [`Connector`] trait,
//! which hands back boxed sink/stream halves carrying text frames. The
//! production implementation is tokio-tungstenite; tests substitute a
//! scripted in-memory connector.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsFrame};
use url::Url;

/// Connection state for the realtime channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior.
///
/// Backoff is linear: the delay before attempt *n* is `n * base_delay`.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts before giving up
    pub max_attempts: u32,
    /// Base delay, multiplied by the attempt number
    pub base_delay: std::time::Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: std::time::Duration::from_millis(1000),
        }
    }
}

impl ReconnectConfig {
    /// Delay before a given attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        self.base_delay * attempt
    }
}

/// Transport-level failure. Never surfaces to callers of the manager; it
/// only drives the reconnect state machine and the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// Outbound half of an established transport (text frames)
pub type TransportSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of an established transport. `None` means the peer closed
/// the connection; an `Err` item is a mid-stream transport error.
pub type TransportStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Seam between the connection manager and the wire.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str)
        -> Result<(TransportSink, TransportStream), TransportError>;
}

/// Production connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(TransportSink, TransportStream), TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        let (write, read) = ws_stream.split();

        let sink: TransportSink = Box::pin(
            write
                .sink_map_err(|e| TransportError::new(e.to_string()))
                .with(|text: String| async move { Ok::<_, TransportError>(WsFrame::text(text)) }),
        );

        // Ping/pong is handled by tungstenite; binary frames are not part of
        // the backend contract and are ignored.
        let stream: TransportStream = Box::pin(read.filter_map(|item| async move {
            match item {
                Ok(WsFrame::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(WsFrame::Close(_)) => None,
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::new(e.to_string()))),
            }
        }));

        Ok((sink, stream))
    }
}

/// Derive the realtime endpoint from the backend base URL by swapping the
/// scheme to its WebSocket equivalent.
pub fn realtime_url(base_url: &str) -> Result<String, TransportError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| TransportError::new(format!("invalid base URL {base_url:?}: {e}")))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(url.into()),
        other => {
            return Err(TransportError::new(format!(
                "unsupported scheme {other:?} in base URL {base_url:?}"
            )))
        }
    };

    url.set_scheme(scheme)
        .map_err(|_| TransportError::new(format!("cannot derive ws URL from {base_url:?}")))?;
    Ok(url.into())
}
