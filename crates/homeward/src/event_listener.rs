//! Event listeners: callbacks bound to subscribed event types

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use homeward_core::EventData;

use crate::error::AppError;
use crate::service::Services;
use crate::state::StateRegistry;
use crate::CallbackFuture;

/// Callback invoked with the raw JSON of a matching event
pub type EventListenerCallback =
    Arc<dyn Fn(Services, StateRegistry, EventData) -> CallbackFuture + Send + Sync>;

/// A callback bound to one or more event types
///
/// Registering a listener subscribes the session to each event type it
/// names; one `subscribe_events` frame is sent per distinct type.
pub struct EventListener {
    pub(crate) event_types: Vec<String>,
    pub(crate) callback: EventListenerCallback,
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("event_types", &self.event_types)
            .finish_non_exhaustive()
    }
}

impl EventListener {
    /// Start the fluent builder chain
    pub fn builder() -> EventListenerBuilder {
        EventListenerBuilder {}
    }
}

/// First builder stage: choose the event types
pub struct EventListenerBuilder {}

/// Second builder stage: set the callback and build
pub struct EventListenerBuilderTypes {
    event_types: Vec<String>,
}

pub struct EventListenerBuilderEnd {
    listener: EventListener,
}

impl EventListenerBuilder {
    /// Listen for one or more event types, e.g. `zwave_js_value_notification`
    pub fn event_types(
        self,
        event_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<EventListenerBuilderTypes, AppError> {
        let event_types: Vec<String> = event_types.into_iter().map(Into::into).collect();
        if event_types.is_empty() || event_types.iter().any(String::is_empty) {
            return Err(AppError::InvalidArgs(
                "event_types requires at least one non-empty event type".to_string(),
            ));
        }
        Ok(EventListenerBuilderTypes { event_types })
    }
}

impl EventListenerBuilderTypes {
    /// Set the callback to run on each matching event
    pub fn call<F, Fut>(self, callback: F) -> EventListenerBuilderEnd
    where
        F: Fn(Services, StateRegistry, EventData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        EventListenerBuilderEnd {
            listener: EventListener {
                event_types: self.event_types,
                callback: Arc::new(move |services, state, data| {
                    Box::pin(callback(services, state, data)) as CallbackFuture
                }),
            },
        }
    }
}

impl EventListenerBuilderEnd {
    pub fn build(self) -> EventListener {
        self.listener
    }
}
