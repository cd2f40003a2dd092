//! Transport layer for the homeward client
//!
//! Owns the two ways the client talks to Home Assistant:
//!
//! - [`WsConnection`] / [`WsReader`]: the persistent authenticated
//!   WebSocket session used for live events, subscriptions and service
//!   calls. Writes are serialized behind a mutex; reads belong to a single
//!   reader task.
//! - [`RestClient`]: on-demand state retrieval over the REST API with
//!   bearer auth, timeout and retry.

pub mod connection;
pub mod error;
pub mod rest;
pub mod wire;

pub use connection::{WsConnection, WsReader};
pub use error::ApiError;
pub use rest::RestClient;
pub use wire::{EventFrame, ServerMessage, StateChangedData, StateChangedFrame};
