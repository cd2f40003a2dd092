//! State snapshot as reported by the Home Assistant APIs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A point-in-time observation of an entity's state
///
/// Snapshots arrive from the REST `/api/states` endpoints and inside
/// `state_changed` WebSocket frames. They are read-only: the client never
/// mutates server state through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// The entity this state belongs to
    pub entity_id: EntityId,

    /// The state value (e.g. "on", "off", "23.5", "unavailable")
    pub state: String,

    /// Attributes attached to the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even if the value was unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StateSnapshot {
    /// Check if the entity is reported as unavailable
    pub fn is_unavailable(&self) -> bool {
        self.state == "unavailable"
    }

    /// Check if the entity's state is unknown
    pub fn is_unknown(&self) -> bool {
        self.state == "unknown"
    }

    /// Get an attribute value, deserialized to the requested type
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get an attribute as an `f64`, accepting both numbers and numeric strings
    ///
    /// Zone coordinates are numbers in practice, but some integrations
    /// report numeric attributes as strings.
    pub fn numeric_attribute(&self, key: &str) -> Option<f64> {
        match self.attributes.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> StateSnapshot {
        serde_json::from_value(json!({
            "entity_id": "light.kitchen",
            "state": "on",
            "attributes": {
                "brightness": 254,
                "friendly_name": "Kitchen"
            },
            "last_changed": "2025-08-02T10:00:00Z",
            "last_updated": "2025-08-02T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_deserialize_rest_payload() {
        let state = sample();
        assert_eq!(state.entity_id.domain(), "light");
        assert_eq!(state.state, "on");
        assert_eq!(state.attribute::<i64>("brightness"), Some(254));
        assert_eq!(
            state.attribute::<String>("friendly_name"),
            Some("Kitchen".to_string())
        );
        assert_eq!(state.attribute::<i64>("missing"), None);
    }

    #[test]
    fn test_missing_attributes_default_empty() {
        let state: StateSnapshot = serde_json::from_value(json!({
            "entity_id": "sensor.bare",
            "state": "unknown",
            "last_changed": "2025-08-02T10:00:00Z"
        }))
        .unwrap();
        assert!(state.attributes.is_empty());
        assert!(state.is_unknown());
        assert!(!state.is_unavailable());
    }

    #[test]
    fn test_numeric_attribute_accepts_strings() {
        let state: StateSnapshot = serde_json::from_value(json!({
            "entity_id": "zone.home",
            "state": "zoning",
            "attributes": {
                "latitude": 51.5074,
                "longitude": "-0.1278"
            },
            "last_changed": "2025-08-02T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(state.numeric_attribute("latitude"), Some(51.5074));
        assert_eq!(state.numeric_attribute("longitude"), Some(-0.1278));
        assert_eq!(state.numeric_attribute("altitude"), None);
    }
}
