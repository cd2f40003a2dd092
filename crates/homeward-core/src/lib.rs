//! Core types shared by the homeward client crates
//!
//! This crate carries the vocabulary the rest of the workspace speaks:
//! entity ids, wire state snapshots, callback payloads, the `HH:MM` and
//! duration string grammars, and the process-wide message-id counter.

pub mod data;
pub mod entity_id;
pub mod ids;
pub mod parse;
pub mod state;

pub use data::{Coordinates, EntityData, EventData};
pub use entity_id::{EntityId, EntityIdError};
pub use ids::next_message_id;
pub use parse::{parse_duration, parse_time, ParseError};
pub use state::StateSnapshot;
