//! Routing of inbound frames to entity and event listeners

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Local, Utc};
use homeward_api::{EventFrame, ServerMessage, StateChangedFrame};
use homeward_core::{EntityData, EventData};
use serde_json::Value;
use tracing::{debug, warn};

use crate::app::AppInner;
use crate::conditions::{
    disabled_entities_allow, enabled_entities_allow, outside_exception_dates,
    outside_exception_ranges, states_match, throttle_elapsed, within_time_range,
};
use crate::entity_listener::EntityListener;

/// Route a `state_changed` frame to the listeners bound to its entity
pub(crate) async fn call_entity_listeners(app: Arc<AppInner>, raw: Value) {
    let frame: StateChangedFrame = match serde_json::from_value(raw) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Ignoring frame that is not a state_changed event");
            return;
        }
    };

    let data = frame.event.data;
    let (Some(old), Some(new)) = (data.old_state, data.new_state) else {
        // Entity appeared or vanished; there is no transition to match.
        debug!(entity_id = %data.entity_id, "Skipping state_changed without both states");
        return;
    };

    // Suppress no-op refreshes: some integrations re-send an unchanged
    // state every time a client reconnects.
    if new.state == old.state {
        return;
    }

    let listeners: Vec<Arc<EntityListener>> = match app.entity_listeners.get(&data.entity_id) {
        Some(entry) => entry.value().clone(),
        None => return,
    };

    for listener in listeners {
        let now = Local::now();
        if !within_time_range(
            listener.between_start,
            listener.between_end,
            now.naive_local(),
        ) {
            continue;
        }
        if !states_match(&listener.from_state, &old.state) {
            continue;
        }
        if !states_match(&listener.to_state, &new.state) {
            // The awaited target state went away; a pending delayed run
            // must not fire.
            if let Some(timer) = listener
                .runtime
                .delay_timer
                .lock()
                .expect("delay timer lock poisoned")
                .take()
            {
                timer.abort();
            }
            continue;
        }
        let last_ran = *listener
            .runtime
            .last_ran
            .lock()
            .expect("last_ran lock poisoned");
        if !throttle_elapsed(listener.throttle, last_ran, Utc::now()) {
            continue;
        }
        if !outside_exception_dates(&listener.exception_dates, now.date_naive()) {
            continue;
        }
        if !outside_exception_ranges(&listener.exception_ranges, now) {
            continue;
        }
        if !enabled_entities_allow(&app.state, &listener.enabled_entities).await {
            continue;
        }
        if !disabled_entities_allow(&app.state, &listener.disabled_entities).await {
            continue;
        }

        let entity_data = EntityData {
            trigger_entity_id: data.entity_id.clone(),
            from_state: old.state.clone(),
            from_attributes: old.attributes.clone(),
            to_state: new.state.clone(),
            to_attributes: new.attributes.clone(),
            last_changed: old.last_changed,
        };

        if listener.delay > chrono::Duration::zero() {
            schedule_delayed_run(&app, &listener, entity_data);
            continue;
        }

        run_listener_callback(&app, &listener, entity_data);
    }
}

/// Start (or replace) the listener's delay timer
///
/// At most one delivery can be pending per listener; a newer matching
/// transition supersedes the previous timer.
fn schedule_delayed_run(
    app: &Arc<AppInner>,
    listener: &Arc<EntityListener>,
    entity_data: EntityData,
) {
    let delay = listener
        .delay
        .to_std()
        .unwrap_or(std::time::Duration::ZERO);
    let app = Arc::clone(app);
    let listener_for_task = Arc::clone(listener);

    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // Timers are not cancelled proactively at shutdown; they observe
        // cancellation here instead.
        if app.cancel.is_cancelled() {
            return;
        }
        run_listener_callback(&app, &listener_for_task, entity_data);
    });

    let mut guard = listener
        .runtime
        .delay_timer
        .lock()
        .expect("delay timer lock poisoned");
    if let Some(previous) = guard.replace(handle) {
        previous.abort();
    }
}

/// Record the run and spawn the user callback on its own task
fn run_listener_callback(app: &Arc<AppInner>, listener: &Arc<EntityListener>, data: EntityData) {
    *listener
        .runtime
        .last_ran
        .lock()
        .expect("last_ran lock poisoned") = Some(Utc::now());

    // A panicking callback is confined to its own task.
    tokio::spawn((listener.callback)(
        app.services.clone(),
        app.state.clone(),
        data,
    ));
}

/// Route a subscribed event frame to the listeners for its event type
pub(crate) async fn call_event_listeners(app: Arc<AppInner>, msg: ServerMessage) {
    let frame: EventFrame = match serde_json::from_value(msg.raw) {
        Ok(frame) => frame,
        Err(e) => {
            // Result acks and other non-event frames land here; nothing to do.
            debug!(id = msg.id, msg_type = %msg.msg_type, error = %e, "Frame carries no event");
            return;
        }
    };

    let event_type = frame.event.event_type;
    let listeners = match app.event_listeners.get(&event_type) {
        Some(entry) => entry.value().clone(),
        None => return,
    };

    for listener in listeners {
        let data = EventData {
            event_type: event_type.clone(),
            raw: frame.event.data.clone(),
        };
        tokio::spawn((listener.callback)(
            app.services.clone(),
            app.state.clone(),
            data,
        ));
    }
}

/// Invoke each `run_on_startup` listener once with its cached state
///
/// The startup flag is shared across all entity ids a listener watches,
/// so a listener bound to several entities still fires exactly once.
pub(crate) async fn run_startup_pass(app: &Arc<AppInner>) {
    let mut startup: Vec<(String, Arc<EntityListener>)> = Vec::new();
    for entry in app.entity_listeners.iter() {
        for listener in entry.value() {
            if listener.run_on_startup {
                startup.push((entry.key().clone(), Arc::clone(listener)));
            }
        }
    }

    for (entity_id, listener) in startup {
        if listener.runtime.startup_done.swap(true, Ordering::SeqCst) {
            continue;
        }
        match app.state.get(&entity_id).await {
            Ok(snapshot) => {
                let data = EntityData {
                    trigger_entity_id: entity_id,
                    from_state: snapshot.state.clone(),
                    from_attributes: snapshot.attributes.clone(),
                    to_state: snapshot.state,
                    to_attributes: snapshot.attributes,
                    last_changed: snapshot.last_changed,
                };
                run_listener_callback(app, &listener, data);
            }
            Err(e) => warn!(
                entity_id = %entity_id,
                error = %e,
                "Failed to fetch state at startup; skipping run_on_startup"
            ),
        }
    }
}
