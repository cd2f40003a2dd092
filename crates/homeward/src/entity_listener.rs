//! Entity listeners: callbacks bound to `state_changed` transitions

use std::fmt;
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use homeward_core::{parse_duration, parse_time, EntityData};
use tokio::task::JoinHandle;

use crate::conditions::{StatePredicate, TimeRange};
use crate::error::AppError;
use crate::service::Services;
use crate::state::StateRegistry;
use crate::CallbackFuture;

/// Callback invoked when a watched entity changes state
pub type EntityListenerCallback =
    Arc<dyn Fn(Services, StateRegistry, EntityData) -> CallbackFuture + Send + Sync>;

/// Mutable per-listener state, touched only by the dispatcher and its
/// delay-timer tasks
///
/// A short `std::sync::Mutex` serializes the writers; no lock is held
/// across an await.
#[derive(Default)]
pub(crate) struct ListenerRuntime {
    /// When the callback last ran; `None` until the first run
    pub(crate) last_ran: Mutex<Option<DateTime<Utc>>>,
    /// Pending delay timer, if any; replaced or aborted by later events
    pub(crate) delay_timer: Mutex<Option<JoinHandle<()>>>,
    /// Set once the startup invocation has happened
    pub(crate) startup_done: AtomicBool,
}

/// A callback bound to one or more entity ids
///
/// Built with [`EntityListener::builder`], registered through
/// [`crate::App::register_entity_listeners`]. Every incoming transition
/// passes the full condition pipeline before the callback is spawned.
pub struct EntityListener {
    pub(crate) entity_ids: Vec<String>,
    pub(crate) callback: EntityListenerCallback,
    pub(crate) from_state: String,
    pub(crate) to_state: String,
    pub(crate) between_start: Option<NaiveTime>,
    pub(crate) between_end: Option<NaiveTime>,
    pub(crate) throttle: Duration,
    pub(crate) delay: Duration,
    pub(crate) exception_dates: Vec<NaiveDate>,
    pub(crate) exception_ranges: Vec<TimeRange>,
    pub(crate) run_on_startup: bool,
    pub(crate) enabled_entities: Vec<StatePredicate>,
    pub(crate) disabled_entities: Vec<StatePredicate>,
    pub(crate) runtime: ListenerRuntime,
}

impl fmt::Debug for EntityListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityListener")
            .field("entity_ids", &self.entity_ids)
            .field("from_state", &self.from_state)
            .field("to_state", &self.to_state)
            .field("throttle", &self.throttle)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl EntityListener {
    /// Start the fluent builder chain
    pub fn builder() -> EntityListenerBuilder {
        EntityListenerBuilder {}
    }
}

/// First builder stage: choose the entities to watch
pub struct EntityListenerBuilder {}

/// Second builder stage: set the callback
pub struct EntityListenerBuilderIds {
    entity_ids: Vec<String>,
}

/// Final builder stage: optional guards, then build
pub struct EntityListenerBuilderEnd {
    listener: EntityListener,
}

impl EntityListenerBuilder {
    /// Watch one or more entity ids
    pub fn entity_ids(
        self,
        entity_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<EntityListenerBuilderIds, AppError> {
        let entity_ids: Vec<String> = entity_ids.into_iter().map(Into::into).collect();
        if entity_ids.is_empty() || entity_ids.iter().any(String::is_empty) {
            return Err(AppError::InvalidArgs(
                "entity_ids requires at least one non-empty entity id".to_string(),
            ));
        }
        Ok(EntityListenerBuilderIds { entity_ids })
    }
}

impl EntityListenerBuilderIds {
    /// Set the callback to run on matching transitions
    pub fn call<F, Fut>(self, callback: F) -> EntityListenerBuilderEnd
    where
        F: Fn(Services, StateRegistry, EntityData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        EntityListenerBuilderEnd {
            listener: EntityListener {
                entity_ids: self.entity_ids,
                callback: Arc::new(move |services, state, data| {
                    Box::pin(callback(services, state, data)) as CallbackFuture
                }),
                from_state: String::new(),
                to_state: String::new(),
                between_start: None,
                between_end: None,
                throttle: Duration::zero(),
                delay: Duration::zero(),
                exception_dates: Vec::new(),
                exception_ranges: Vec::new(),
                run_on_startup: false,
                enabled_entities: Vec::new(),
                disabled_entities: Vec::new(),
                runtime: ListenerRuntime::default(),
            },
        }
    }
}

impl EntityListenerBuilderEnd {
    /// Only react between two times of day, both `"HH:MM"`
    pub fn only_between(mut self, start: &str, end: &str) -> Result<Self, AppError> {
        self.listener.between_start = Some(parse_time(start)?);
        self.listener.between_end = Some(parse_time(end)?);
        Ok(self)
    }

    /// Only react at or after a time of day
    pub fn only_after(mut self, start: &str) -> Result<Self, AppError> {
        self.listener.between_start = Some(parse_time(start)?);
        Ok(self)
    }

    /// Only react before a time of day
    pub fn only_before(mut self, end: &str) -> Result<Self, AppError> {
        self.listener.between_end = Some(parse_time(end)?);
        Ok(self)
    }

    /// Require the previous state to equal `state`
    pub fn from_state(mut self, state: &str) -> Self {
        self.listener.from_state = state.to_string();
        self
    }

    /// Require the new state to equal `state`
    pub fn to_state(mut self, state: &str) -> Self {
        self.listener.to_state = state.to_string();
        self
    }

    /// Wait this long after a matching transition before running; a
    /// `to_state` mismatch in the meantime cancels the pending run
    ///
    /// Requires [`EntityListenerBuilderEnd::to_state`]; enforced at
    /// registration.
    pub fn delay_for(mut self, duration: &str) -> Result<Self, AppError> {
        self.listener.delay = parse_duration(duration)?;
        Ok(self)
    }

    /// Run at most once per `duration`
    pub fn throttle(mut self, duration: &str) -> Result<Self, AppError> {
        self.listener.throttle = parse_duration(duration)?;
        Ok(self)
    }

    /// Dates on which the listener must not run
    pub fn exception_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.listener.exception_dates.extend(dates);
        self
    }

    /// A wall-clock range during which the listener must not run
    pub fn exception_range(mut self, start: DateTime<Local>, end: DateTime<Local>) -> Self {
        self.listener.exception_ranges.push(TimeRange { start, end });
        self
    }

    /// Invoke the callback once at startup with the entity's cached state
    pub fn run_on_startup(mut self) -> Self {
        self.listener.run_on_startup = true;
        self
    }

    /// Run only while `entity_id` is in `state`
    pub fn enabled_when(
        mut self,
        entity_id: &str,
        state: &str,
        run_on_error: bool,
    ) -> Result<Self, AppError> {
        if entity_id.is_empty() {
            return Err(AppError::InvalidArgs(
                "enabled_when requires a non-empty entity id".to_string(),
            ));
        }
        self.listener.enabled_entities.push(StatePredicate {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            run_on_error,
        });
        Ok(self)
    }

    /// Skip runs while `entity_id` is in `state`
    pub fn disabled_when(
        mut self,
        entity_id: &str,
        state: &str,
        run_on_error: bool,
    ) -> Result<Self, AppError> {
        if entity_id.is_empty() {
            return Err(AppError::InvalidArgs(
                "disabled_when requires a non-empty entity id".to_string(),
            ));
        }
        self.listener.disabled_entities.push(StatePredicate {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            run_on_error,
        });
        Ok(self)
    }

    pub fn build(self) -> EntityListener {
        self.listener
    }
}
