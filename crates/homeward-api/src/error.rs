//! Transport error types

use thiserror::Error;

/// Errors from the WebSocket session or the REST client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unsupported URL scheme {0:?} (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("authentication rejected: check the access token")]
    InvalidToken,

    #[error("unexpected handshake frame: {0}")]
    Handshake(String),

    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection already closed")]
    Closed,

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}
