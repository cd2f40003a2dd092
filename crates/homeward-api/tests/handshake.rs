//! Integration tests for the WebSocket handshake against a local server

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use homeward_api::{ApiError, WsConnection};

/// Spawn a one-connection Home Assistant lookalike
///
/// Performs the auth dance against `expected_token`, then forwards every
/// frame the client sends into the returned channel.
async fn spawn_server(expected_token: &str) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = expected_token.to_string();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text(
            json!({"type": "auth_required", "ha_version": "2025.8.0"}).to_string(),
        ))
        .await
        .unwrap();

        let auth: Value = match ws.next().await {
            Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected auth frame, got {other:?}"),
        };
        assert_eq!(auth["type"], "auth");

        if auth["access_token"] == token.as_str() {
            ws.send(Message::Text(
                json!({"type": "auth_ok", "ha_version": "2025.8.0"}).to_string(),
            ))
            .await
            .unwrap();
        } else {
            ws.send(Message::Text(
                json!({"type": "auth_invalid", "message": "Invalid access token"}).to_string(),
            ))
            .await
            .unwrap();
            return;
        }

        // Acknowledge subscriptions and forward everything for inspection.
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["type"] == "subscribe_events" {
                    let ack = json!({
                        "id": value["id"],
                        "type": "result",
                        "success": true,
                        "result": null
                    });
                    ws.send(Message::Text(ack.to_string())).await.unwrap();
                }
                if tx.send(value).is_err() {
                    break;
                }
            }
        }
    });

    (format!("http://{addr}"), rx)
}

#[tokio::test]
async fn test_handshake_succeeds_with_valid_token() {
    let (url, _frames) = spawn_server("valid-token").await;
    let result = WsConnection::connect(&url, "valid-token").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_handshake_rejects_invalid_token() {
    let (url, _frames) = spawn_server("valid-token").await;
    let err = WsConnection::connect(&url, "wrong-token").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidToken));
}

#[tokio::test]
async fn test_connect_fails_against_closed_port() {
    // Bind and immediately drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = WsConnection::connect(&format!("http://{addr}"), "token")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ConnectFailed(_)));
}

#[tokio::test]
async fn test_subscribe_and_read_round_trip() {
    let (url, mut frames) = spawn_server("token").await;
    let (conn, mut reader) = WsConnection::connect(&url, "token").await.unwrap();

    let id = conn.subscribe_events("state_changed", None).await.unwrap();
    assert!(id >= 1);

    // The server saw exactly the frame the spec describes.
    let frame = frames.recv().await.unwrap();
    assert_eq!(frame["type"], "subscribe_events");
    assert_eq!(frame["event_type"], "state_changed");
    assert_eq!(frame["id"].as_u64(), Some(id));

    // And acked it; the ack is readable and routed by id.
    let ack = reader.read_frame().await.unwrap();
    assert_eq!(ack.id, id);
    assert_eq!(ack.msg_type, "result");
    assert!(ack.success);
}

#[tokio::test]
async fn test_service_call_envelope_round_trip() {
    let (url, mut frames) = spawn_server("token").await;
    let (conn, _reader) = WsConnection::connect(&url, "token").await.unwrap();

    conn.call_service(
        "light",
        "turn_on",
        Some(json!({"brightness": 128})),
        Some("light.kitchen"),
    )
    .await
    .unwrap();

    let frame = frames.recv().await.unwrap();
    assert_eq!(frame["type"], "call_service");
    assert_eq!(frame["domain"], "light");
    assert_eq!(frame["service"], "turn_on");
    assert_eq!(frame["service_data"]["brightness"], 128);
    assert_eq!(frame["target"]["entity_id"], "light.kitchen");
}

#[tokio::test]
async fn test_ids_increase_across_frames() {
    let (url, mut frames) = spawn_server("token").await;
    let (conn, _reader) = WsConnection::connect(&url, "token").await.unwrap();

    conn.fire_event("custom_event", Some(json!({"answer": 42})))
        .await
        .unwrap();
    conn.fire_event("custom_event", None).await.unwrap();

    let first = frames.recv().await.unwrap();
    let second = frames.recv().await.unwrap();
    assert_eq!(first["type"], "fire_event");
    assert_eq!(first["event_type"], "custom_event");
    assert!(second["id"].as_u64() > first["id"].as_u64());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (url, _frames) = spawn_server("token").await;
    let (conn, _reader) = WsConnection::connect(&url, "token").await.unwrap();

    conn.close().await;
    conn.close().await;

    // Writes after close surface as Closed, not a panic.
    let err = conn.subscribe_events("state_changed", None).await.unwrap_err();
    assert!(matches!(err, ApiError::Closed));
}
