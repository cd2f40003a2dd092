//! Home Assistant client automations
//!
//! Connect to a Home Assistant instance and register three kinds of
//! reactive automations, each guarded by a uniform set of runtime
//! conditions:
//!
//! - [`DailySchedule`] - runs once a day at a fixed time or relative to
//!   sunrise/sunset
//! - [`Interval`] - runs on a fixed frequency, optionally bounded to a
//!   daily window
//! - [`EntityListener`] / [`EventListener`] - run when entity state
//!   changes or subscribed events arrive over the WebSocket session
//!
//! # Architecture
//!
//! ```text
//! builders -> App::register_* -> priority queues / listener maps
//!
//! App::start() drives four loops concurrently:
//!   reader    - decodes WebSocket frames onto a bounded channel
//!   main      - routes frames to entity/event dispatch
//!   schedules - pops, sleeps, runs, requeues daily schedules
//!   intervals - same for intervals
//! ```
//!
//! User callbacks always run on freshly spawned tasks so a slow callback
//! cannot starve the loops.
//!
//! # Example
//!
//! ```no_run
//! use homeward::{App, Config, DailySchedule, EntityListener};
//!
//! # async fn example() -> Result<(), homeward::AppError> {
//! let app = App::new(Config {
//!     url: "http://192.168.1.10:8123".into(),
//!     auth_token: std::env::var("HA_AUTH_TOKEN").unwrap(),
//!     ..Config::default()
//! })
//! .await?;
//!
//! let lights_out = DailySchedule::builder()
//!     .call(|services, _state| async move {
//!         let _ = services.light().turn_off("light.porch").await;
//!     })
//!     .at("23:00")?
//!     .build();
//! app.register_schedules([lights_out])?;
//!
//! let pantry = EntityListener::builder()
//!     .entity_ids(["binary_sensor.pantry_door"])?
//!     .call(|services, _state, data| async move {
//!         if data.to_state == "on" {
//!             let _ = services.light().turn_on("light.pantry").await;
//!         } else {
//!             let _ = services.light().turn_off("light.pantry").await;
//!         }
//!     })
//!     .build();
//! app.register_entity_listeners([pantry])?;
//!
//! app.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod conditions;
pub mod config;
mod dispatch;
pub mod entity_listener;
pub mod error;
pub mod event_listener;
pub mod interval;
pub mod schedule;
pub mod service;
pub mod state;

use std::future::Future;
use std::pin::Pin;

/// Future type produced by user callbacks
pub type CallbackFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub use app::App;
pub use conditions::{StatePredicate, TimeRange};
pub use config::Config;
pub use entity_listener::EntityListener;
pub use error::AppError;
pub use event_listener::EventListener;
pub use homeward_core::{Coordinates, EntityData, EntityId, EventData, StateSnapshot};
pub use interval::Interval;
pub use schedule::DailySchedule;
pub use service::Services;
pub use state::StateRegistry;
