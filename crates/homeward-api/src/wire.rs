//! WebSocket frame types for the Home Assistant API

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound authentication frame
#[derive(Debug, Serialize)]
pub struct AuthFrame<'a> {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub access_token: &'a str,
}

/// Minimal view of a handshake frame, enough to read its `type`
#[derive(Debug, Deserialize)]
pub struct HandshakeFrame {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outbound `subscribe_events` frame
#[derive(Debug, Serialize)]
pub struct SubscribeEventsFrame<'a> {
    pub id: u64,
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub event_type: &'a str,
}

/// Target of a service call
#[derive(Debug, Serialize)]
pub struct Target<'a> {
    pub entity_id: &'a str,
}

/// Outbound `call_service` frame
#[derive(Debug, Serialize)]
pub struct CallServiceFrame<'a> {
    pub id: u64,
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub domain: &'a str,
    pub service: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target<'a>>,
}

/// Outbound `fire_event` frame
#[derive(Debug, Serialize)]
pub struct FireEventFrame<'a> {
    pub id: u64,
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub event_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Value>,
}

/// An inbound frame, decoded just far enough to route it
///
/// The full payload is retained in `raw` for the dispatch layer to decode
/// into event-specific shapes.
#[derive(Debug, Clone)]
pub struct ServerMessage {
    pub id: u64,
    pub msg_type: String,
    pub success: bool,
    pub raw: Value,
}

/// Envelope used to deserialize the routing fields of an inbound frame
#[derive(Debug, Deserialize)]
struct ServerMessageEnvelope {
    #[serde(default)]
    id: u64,
    #[serde(rename = "type", default)]
    msg_type: String,
    // Absent on event frames; those are always successful deliveries.
    #[serde(default = "default_true")]
    success: bool,
}

fn default_true() -> bool {
    true
}

impl ServerMessage {
    /// Decode the routing fields of a raw frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_str(text)?;
        let envelope: ServerMessageEnvelope = serde_json::from_value(raw.clone())?;
        Ok(Self {
            id: envelope.id,
            msg_type: envelope.msg_type,
            success: envelope.success,
            raw,
        })
    }
}

/// A state object as it appears inside a `state_changed` event
#[derive(Debug, Clone, Deserialize)]
pub struct WireState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    pub last_changed: DateTime<Utc>,
}

/// The `data` object of a `state_changed` event
///
/// Either side can be null: a freshly added entity has no `old_state`, a
/// removed one has no `new_state`.
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangedData {
    pub entity_id: String,
    #[serde(default)]
    pub old_state: Option<WireState>,
    #[serde(default)]
    pub new_state: Option<WireState>,
}

/// The `event` object of an inbound event frame
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_type: String,
    pub data: T,
}

/// A full `state_changed` frame
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangedFrame {
    pub event: EventEnvelope<StateChangedData>,
}

/// A frame carrying an arbitrary subscribed event
#[derive(Debug, Clone, Deserialize)]
pub struct EventFrame {
    pub event: EventEnvelope<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_frame_shape() {
        let frame = SubscribeEventsFrame {
            id: 7,
            msg_type: "subscribe_events",
            event_type: "state_changed",
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"id": 7, "type": "subscribe_events", "event_type": "state_changed"})
        );
    }

    #[test]
    fn test_call_service_frame_omits_empty_fields() {
        let frame = CallServiceFrame {
            id: 3,
            msg_type: "call_service",
            domain: "light",
            service: "turn_on",
            service_data: None,
            target: None,
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"id": 3, "type": "call_service", "domain": "light", "service": "turn_on"})
        );
    }

    #[test]
    fn test_call_service_frame_with_target_and_data() {
        let frame = CallServiceFrame {
            id: 4,
            msg_type: "call_service",
            domain: "climate",
            service: "set_temperature",
            service_data: Some(json!({"temperature": 21.5})),
            target: Some(Target {
                entity_id: "climate.living_room",
            }),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({
                "id": 4,
                "type": "call_service",
                "domain": "climate",
                "service": "set_temperature",
                "service_data": {"temperature": 21.5},
                "target": {"entity_id": "climate.living_room"}
            })
        );
    }

    #[test]
    fn test_server_message_success_defaults_true() {
        let msg = ServerMessage::decode(r#"{"id": 5, "type": "event"}"#).unwrap();
        assert_eq!(msg.id, 5);
        assert_eq!(msg.msg_type, "event");
        assert!(msg.success);
    }

    #[test]
    fn test_server_message_explicit_failure() {
        let msg =
            ServerMessage::decode(r#"{"id": 9, "type": "result", "success": false}"#).unwrap();
        assert!(!msg.success);
    }

    #[test]
    fn test_state_changed_frame_parses() {
        let text = json!({
            "id": 2,
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "origin": "LOCAL",
                "data": {
                    "entity_id": "binary_sensor.door",
                    "old_state": {
                        "entity_id": "binary_sensor.door",
                        "state": "off",
                        "attributes": {},
                        "last_changed": "2025-08-02T10:00:00Z"
                    },
                    "new_state": {
                        "entity_id": "binary_sensor.door",
                        "state": "on",
                        "attributes": {"device_class": "door"},
                        "last_changed": "2025-08-02T10:05:00Z"
                    }
                }
            }
        })
        .to_string();

        let frame: StateChangedFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(frame.event.event_type, "state_changed");
        let data = frame.event.data;
        assert_eq!(data.entity_id, "binary_sensor.door");
        assert_eq!(data.old_state.unwrap().state, "off");
        assert_eq!(data.new_state.unwrap().state, "on");
    }

    #[test]
    fn test_event_frame_parses_arbitrary_events() {
        let text = json!({
            "id": 7,
            "type": "event",
            "event": {
                "event_type": "zwave_js_value_notification",
                "data": {"value": 255, "property": "scene"}
            }
        })
        .to_string();

        let frame: EventFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(frame.event.event_type, "zwave_js_value_notification");
        assert_eq!(frame.event.data["value"], 255);
    }

    #[test]
    fn test_event_frame_rejects_result_acks() {
        let text = json!({"id": 9, "type": "result", "success": true}).to_string();
        assert!(serde_json::from_str::<EventFrame>(&text).is_err());
    }

    #[test]
    fn test_state_changed_frame_with_null_old_state() {
        let text = json!({
            "id": 2,
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "data": {
                    "entity_id": "sensor.fresh",
                    "old_state": null,
                    "new_state": {
                        "entity_id": "sensor.fresh",
                        "state": "1",
                        "attributes": {},
                        "last_changed": "2025-08-02T10:00:00Z"
                    }
                }
            }
        })
        .to_string();

        let frame: StateChangedFrame = serde_json::from_str(&text).unwrap();
        assert!(frame.event.data.old_state.is_none());
        assert!(frame.event.data.new_state.is_some());
    }
}
