//! Payload types handed to user callbacks

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Geographic coordinates of the home zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// The state transition that triggered an entity listener
///
/// For a `run_on_startup` invocation the from and to sides both carry the
/// entity's current state.
#[derive(Debug, Clone)]
pub struct EntityData {
    /// Which of the listener's entity ids fired
    pub trigger_entity_id: String,

    /// State value before the transition
    pub from_state: String,

    /// Attributes before the transition
    pub from_attributes: HashMap<String, serde_json::Value>,

    /// State value after the transition
    pub to_state: String,

    /// Attributes after the transition
    pub to_attributes: HashMap<String, serde_json::Value>,

    /// When the old state was last changed
    pub last_changed: DateTime<Utc>,
}

/// The raw event handed to an event listener
///
/// The payload shape varies per event type, so the event's `data` object
/// is passed through as JSON for user code to decode into its own types.
#[derive(Debug, Clone)]
pub struct EventData {
    /// The event type this frame matched
    pub event_type: String,

    /// The event's `data` payload from the server frame
    pub raw: serde_json::Value,
}
