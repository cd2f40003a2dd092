//! The application: construction, registration, runtime and shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use dashmap::DashMap;
use homeward_api::{ApiError, RestClient, ServerMessage, WsConnection, WsReader};
use homeward_core::next_message_id;
use homeward_scheduling::ScheduleQueue;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dispatch;
use crate::entity_listener::EntityListener;
use crate::error::AppError;
use crate::event_listener::EventListener;
use crate::interval::{self, Interval};
use crate::schedule::{self, DailySchedule};
use crate::service::Services;
use crate::state::StateRegistry;

/// Capacity of the reader-to-dispatcher channel; a full channel ends the
/// session rather than buffering unboundedly
const READER_CHANNEL_CAPACITY: usize = 100;

/// Shared application internals
///
/// Owned by the [`App`] and every long-lived task it spawns. Exactly one
/// cancellation token governs all of them.
#[derive(Debug)]
pub(crate) struct AppInner {
    pub(crate) cancel: CancellationToken,
    pub(crate) conn: Arc<WsConnection>,
    pub(crate) services: Services,
    pub(crate) state: StateRegistry,
    pub(crate) schedules: ScheduleQueue<DailySchedule>,
    pub(crate) intervals: ScheduleQueue<Interval>,
    pub(crate) entity_listeners: DashMap<String, Vec<Arc<EntityListener>>>,
    pub(crate) event_listeners: DashMap<String, Vec<Arc<EventListener>>>,
    /// Message id of the `state_changed` subscription; distinguishes
    /// entity-listener traffic from event-listener traffic
    pub(crate) state_changed_id: AtomicU64,
}

/// A connected Home Assistant automation application
///
/// Create with [`App::new`], register automations, then call
/// [`App::start`] (which blocks until shutdown) and [`App::close`] from
/// another task to end the session.
#[derive(Debug)]
pub struct App {
    inner: Arc<AppInner>,
    reader: Mutex<Option<WsReader>>,
}

impl App {
    /// Validate the configuration, establish the WebSocket session and
    /// resolve the home zone
    pub async fn new(config: Config) -> Result<Self, AppError> {
        config.validate()?;
        let base_url = config.base_url();

        let (conn, reader) = WsConnection::connect(&base_url, &config.auth_token)
            .await
            .map_err(|e| match e {
                ApiError::InvalidToken => AppError::InvalidToken,
                other => AppError::ConnectFailed(other.to_string()),
            })?;
        let conn = Arc::new(conn);

        let rest = RestClient::new(&base_url, &config.auth_token)?;
        let state = StateRegistry::new(rest, config.home_zone()).await?;

        Ok(Self {
            inner: Arc::new(AppInner {
                cancel: CancellationToken::new(),
                conn: Arc::clone(&conn),
                services: Services::new(conn),
                state,
                schedules: ScheduleQueue::new(),
                intervals: ScheduleQueue::new(),
                entity_listeners: DashMap::new(),
                event_listeners: DashMap::new(),
                state_changed_id: AtomicU64::new(0),
            }),
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Queue daily schedules, computing each first run time
    pub fn register_schedules(
        &self,
        schedules: impl IntoIterator<Item = DailySchedule>,
    ) -> Result<(), AppError> {
        let coords = self.inner.state.coordinates();
        let now = Local::now();

        for mut schedule in schedules {
            let next_run = schedule.next_run_after(coords, now).ok_or_else(|| {
                AppError::InvalidArgs(
                    "schedule has no future run time at these coordinates".to_string(),
                )
            })?;
            schedule.next_run = next_run;
            let priority = next_run.timestamp();
            self.inner.schedules.push(schedule, priority);
        }
        Ok(())
    }

    /// Queue intervals, seeding each first tick from its start time
    pub fn register_intervals(
        &self,
        intervals: impl IntoIterator<Item = Interval>,
    ) -> Result<(), AppError> {
        let now = Local::now();

        for mut item in intervals {
            if item.frequency <= chrono::Duration::zero() {
                return Err(AppError::InvalidArgs(
                    "interval frequency must be set via every()".to_string(),
                ));
            }
            item.next_run = interval::initial_next_run(&item, now);
            let priority = item.next_run.timestamp();
            self.inner.intervals.push(item, priority);
        }
        Ok(())
    }

    /// Bind entity listeners to each entity id they watch
    pub fn register_entity_listeners(
        &self,
        listeners: impl IntoIterator<Item = EntityListener>,
    ) -> Result<(), AppError> {
        for listener in listeners {
            if listener.delay > chrono::Duration::zero() && listener.to_state.is_empty() {
                return Err(AppError::InvalidArgs(
                    "delay_for() requires to_state()".to_string(),
                ));
            }

            let listener = Arc::new(listener);
            for entity_id in &listener.entity_ids {
                self.inner
                    .entity_listeners
                    .entry(entity_id.clone())
                    .or_default()
                    .push(Arc::clone(&listener));
            }
        }
        Ok(())
    }

    /// Bind event listeners, subscribing once per distinct event type
    pub async fn register_event_listeners(
        &self,
        listeners: impl IntoIterator<Item = EventListener>,
    ) -> Result<(), AppError> {
        for listener in listeners {
            let listener = Arc::new(listener);
            for event_type in &listener.event_types {
                let first_for_type = !self.inner.event_listeners.contains_key(event_type);
                if first_for_type {
                    self.inner.conn.subscribe_events(event_type, None).await?;
                }
                self.inner
                    .event_listeners
                    .entry(event_type.clone())
                    .or_default()
                    .push(Arc::clone(&listener));
            }
        }
        Ok(())
    }

    /// Run the application until shutdown
    ///
    /// Spawns the schedule and interval loops, subscribes to
    /// `state_changed`, performs the startup pass, then drives the
    /// dispatcher until the context is cancelled or the reader ends the
    /// session.
    pub async fn start(&self) -> Result<(), AppError> {
        let app = Arc::clone(&self.inner);
        if app.cancel.is_cancelled() {
            return Err(AppError::Shutdown);
        }

        let mut reader = self
            .reader
            .lock()
            .expect("reader lock poisoned")
            .take()
            .ok_or_else(|| AppError::InvalidArgs("start() may only be called once".to_string()))?;

        info!(schedules = app.schedules.len(), "Starting");
        info!(intervals = app.intervals.len(), "Starting");
        info!(entity_listeners = app.entity_listeners.len(), "Starting");
        info!(event_listeners = app.event_listeners.len(), "Starting");

        tokio::spawn(schedule::run_schedules(Arc::clone(&app)));
        tokio::spawn(interval::run_intervals(Arc::clone(&app)));

        // Subscribe to state_changed and retain the id so inbound frames
        // can be told apart from event-listener traffic.
        let id = next_message_id();
        app.conn.subscribe_events("state_changed", Some(id)).await?;
        app.state_changed_id.store(id, Ordering::SeqCst);

        dispatch::run_startup_pass(&app).await;

        let (tx, mut rx) = mpsc::channel::<ServerMessage>(READER_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            loop {
                match reader.read_frame().await {
                    Ok(msg) => {
                        if tx.try_send(msg).is_err() {
                            warn!("Reader channel full or closed; ending session");
                            break;
                        }
                    }
                    Err(ApiError::Closed) => {
                        info!("WebSocket stream ended");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Error reading from WebSocket");
                        break;
                    }
                }
            }
            // Dropping the sender closes the channel and stops the main
            // loop below.
        });

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(msg) => {
                        let state_changed_id = app.state_changed_id.load(Ordering::SeqCst);
                        if msg.id == state_changed_id {
                            tokio::spawn(dispatch::call_entity_listeners(
                                Arc::clone(&app),
                                msg.raw,
                            ));
                        } else {
                            tokio::spawn(dispatch::call_event_listeners(Arc::clone(&app), msg));
                        }
                    }
                    None => {
                        info!("WebSocket channel closed, stopping main loop");
                        app.cancel.cancel();
                        return Ok(());
                    }
                },
                _ = app.cancel.cancelled() => {
                    info!("Context cancelled, stopping main loop");
                    return Ok(());
                }
            }
        }
    }

    /// Cleanly shut the application down
    ///
    /// Writes a close frame (10 s deadline), waits briefly for the server
    /// to drop the stream, cancels the context, then gives the loops a
    /// moment to exit. Safe to call more than once.
    pub async fn close(&self) {
        self.inner.conn.close().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.inner.cancel.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Per-domain service call handles
    pub fn services(&self) -> Services {
        self.inner.services.clone()
    }

    /// The state registry backing condition checks and callbacks
    pub fn state(&self) -> StateRegistry {
        self.inner.state.clone()
    }
}
