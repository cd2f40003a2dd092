//! Authenticated WebSocket session handling
//!
//! One session per [`crate::RestClient`]-equipped application. All writes
//! go through [`WsConnection::send`], which holds a mutex across exactly
//! one JSON-encode-and-send; reads are owned by a single [`WsReader`] and
//! need no locking.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use homeward_core::next_message_id;

use crate::error::ApiError;
use crate::wire::{
    AuthFrame, CallServiceFrame, FireEventFrame, HandshakeFrame, ServerMessage,
    SubscribeEventsFrame, Target,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The write half of the session
///
/// Cheap to share behind an `Arc`; every service wrapper and subscription
/// path funnels through [`WsConnection::send`].
pub struct WsConnection {
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection").finish()
    }
}

/// The read half of the session, owned by exactly one reader task
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl std::fmt::Debug for WsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsReader").finish()
    }
}

/// Map an HTTP(S) base URL to the WebSocket endpoint
fn websocket_url(base_url: &str) -> Result<Url, ApiError> {
    let mut url = Url::parse(base_url)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        s @ ("ws" | "wss") => s,
        other => return Err(ApiError::UnsupportedScheme(other.to_string())),
    }
    .to_string();
    url.set_scheme(&scheme)
        .map_err(|_| ApiError::UnsupportedScheme(scheme))?;
    url.set_path("/api/websocket");
    Ok(url)
}

async fn read_handshake(stream: &mut WsStream) -> Result<HandshakeFrame, ApiError> {
    loop {
        let msg = stream
            .next()
            .await
            .ok_or(ApiError::Closed)?
            .map_err(ApiError::Websocket)?;
        match msg {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => {
                return Err(ApiError::Handshake(format!(
                    "unexpected frame during handshake: {other:?}"
                )))
            }
        }
    }
}

impl WsConnection {
    /// Dial the WebSocket endpoint and run the authentication handshake
    ///
    /// The sequence is: connect (3 s timeout), expect `auth_required`,
    /// send the token, expect `auth_ok`. Anything else fails the
    /// connection; a rejected token surfaces as [`ApiError::InvalidToken`].
    pub async fn connect(base_url: &str, token: &str) -> Result<(Self, WsReader), ApiError> {
        let url = websocket_url(base_url)?;
        debug!(url = %url, "Connecting to WebSocket endpoint");

        let (mut stream, _response) = timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| ApiError::ConnectFailed("connect timed out".to_string()))?
            .map_err(|e| ApiError::ConnectFailed(e.to_string()))?;

        let first = read_handshake(&mut stream).await?;
        if first.msg_type != "auth_required" {
            return Err(ApiError::Handshake(format!(
                "expected auth_required, got {:?}",
                first.msg_type
            )));
        }

        let auth = AuthFrame {
            msg_type: "auth",
            access_token: token,
        };
        let text = serde_json::to_string(&auth)?;
        stream.send(Message::Text(text)).await?;

        let response = read_handshake(&mut stream).await?;
        if response.msg_type != "auth_ok" {
            debug!(
                msg_type = %response.msg_type,
                message = ?response.message,
                "Authentication rejected"
            );
            return Err(ApiError::InvalidToken);
        }

        let (writer, reader) = stream.split();
        Ok((
            Self {
                writer: Mutex::new(Some(writer)),
            },
            WsReader { stream: reader },
        ))
    }

    /// Serialize and send one frame
    ///
    /// The mutex is held for the encode-and-send only, so concurrent
    /// writers cannot interleave frames.
    pub async fn send<T: Serialize>(&self, frame: &T) -> Result<(), ApiError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ApiError::Closed)?;
        let text = serde_json::to_string(frame)?;
        writer.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Send a `subscribe_events` frame, returning the message id used
    ///
    /// An id is allocated from the process-wide counter unless the caller
    /// supplies one.
    pub async fn subscribe_events(
        &self,
        event_type: &str,
        id: Option<u64>,
    ) -> Result<u64, ApiError> {
        let id = id.unwrap_or_else(next_message_id);
        let frame = SubscribeEventsFrame {
            id,
            msg_type: "subscribe_events",
            event_type,
        };
        self.send(&frame).await?;
        Ok(id)
    }

    /// Send a `call_service` frame
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: Option<serde_json::Value>,
        entity_id: Option<&str>,
    ) -> Result<u64, ApiError> {
        let id = next_message_id();
        let frame = CallServiceFrame {
            id,
            msg_type: "call_service",
            domain,
            service,
            service_data,
            target: entity_id.map(|entity_id| Target { entity_id }),
        };
        self.send(&frame).await?;
        Ok(id)
    }

    /// Send a `fire_event` frame
    pub async fn fire_event(
        &self,
        event_type: &str,
        event_data: Option<serde_json::Value>,
    ) -> Result<u64, ApiError> {
        let id = next_message_id();
        let frame = FireEventFrame {
            id,
            msg_type: "fire_event",
            event_type,
            event_data,
        };
        self.send(&frame).await?;
        Ok(id)
    }

    /// Write a close frame and drop the write half
    ///
    /// Safe to call more than once; later calls are no-ops. The close
    /// write is bounded by a 10 second deadline.
    pub async fn close(&self) {
        let mut guard = self.writer.lock().await;
        let Some(mut writer) = guard.take() else {
            return;
        };
        match timeout(CLOSE_TIMEOUT, writer.send(Message::Close(None))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Error writing close frame"),
            Err(_) => warn!("Timed out writing close frame"),
        }
        if let Err(e) = writer.close().await {
            debug!(error = %e, "Error closing WebSocket writer");
        }
    }
}

impl WsReader {
    /// Read the next routable frame
    ///
    /// Malformed frames are logged and skipped; unsuccessful results are
    /// logged but still delivered so callers observe them in order.
    /// Returns [`ApiError::Closed`] when the server ends the stream.
    pub async fn read_frame(&mut self) -> Result<ServerMessage, ApiError> {
        loop {
            let msg = self
                .stream
                .next()
                .await
                .ok_or(ApiError::Closed)?
                .map_err(ApiError::Websocket)?;

            match msg {
                Message::Text(text) => match ServerMessage::decode(&text) {
                    Ok(message) => {
                        if !message.success {
                            warn!(id = message.id, frame = %text, "Server reported failure");
                        }
                        return Ok(message);
                    }
                    Err(e) => {
                        warn!(error = %e, frame = %text, "Skipping malformed frame");
                        continue;
                    }
                },
                Message::Close(_) => return Err(ApiError::Closed),
                // Pings are answered by the protocol layer on flush.
                Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
                Message::Frame(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_rewrites_scheme() {
        assert_eq!(
            websocket_url("http://ha.local:8123").unwrap().as_str(),
            "ws://ha.local:8123/api/websocket"
        );
        assert_eq!(
            websocket_url("https://ha.example.org").unwrap().as_str(),
            "wss://ha.example.org/api/websocket"
        );
        assert_eq!(
            websocket_url("ws://ha.local:8123").unwrap().as_str(),
            "ws://ha.local:8123/api/websocket"
        );
    }

    #[test]
    fn test_websocket_url_rejects_other_schemes() {
        assert!(matches!(
            websocket_url("ftp://ha.local"),
            Err(ApiError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            websocket_url("not a url"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_websocket_url_replaces_existing_path() {
        assert_eq!(
            websocket_url("http://ha.local:8123/lovelace").unwrap().as_str(),
            "ws://ha.local:8123/api/websocket"
        );
    }
}
