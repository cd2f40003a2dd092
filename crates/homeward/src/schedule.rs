//! Daily schedules and their run loop

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Days, Duration, Local, NaiveDate};
use homeward_core::{parse_duration, parse_time, Coordinates};
use homeward_scheduling::{FixedTimeTrigger, SunTrigger, Trigger};
use tracing::{info, warn};

use crate::app::AppInner;
use crate::conditions::{
    allowlist_permits, disabled_entities_allow, enabled_entities_allow, outside_exception_dates,
    StatePredicate,
};
use crate::error::AppError;
use crate::service::Services;
use crate::state::StateRegistry;
use crate::CallbackFuture;

/// Callback invoked when a schedule fires
pub type ScheduleCallback = Arc<dyn Fn(Services, StateRegistry) -> CallbackFuture + Send + Sync>;

/// When a daily schedule fires
#[derive(Debug, Clone)]
pub(crate) enum ScheduleTime {
    Fixed { hour: u32, minute: u32 },
    Sunrise { offset: Duration },
    Sunset { offset: Duration },
}

/// A recurring daily automation
///
/// Built with [`DailySchedule::builder`], registered through
/// [`crate::App::register_schedules`]. Runs at a fixed local time or
/// relative to sunrise/sunset, guarded by date allow/deny lists and live
/// entity state.
#[derive(Clone)]
pub struct DailySchedule {
    pub(crate) callback: ScheduleCallback,
    pub(crate) when: ScheduleTime,
    pub(crate) next_run: DateTime<Local>,
    pub(crate) exception_dates: Vec<NaiveDate>,
    pub(crate) allowlist_dates: Vec<NaiveDate>,
    pub(crate) enabled_entities: Vec<StatePredicate>,
    pub(crate) disabled_entities: Vec<StatePredicate>,
}

impl fmt::Debug for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailySchedule")
            .field("when", &self.when)
            .field("next_run", &self.next_run)
            .finish_non_exhaustive()
    }
}

impl DailySchedule {
    /// Start the fluent builder chain
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder {}
    }

    /// The next firing time strictly after `now` for this schedule's time
    pub(crate) fn next_run_after(
        &self,
        coords: Coordinates,
        now: DateTime<Local>,
    ) -> Option<DateTime<Local>> {
        let trigger = match self.when {
            ScheduleTime::Fixed { hour, minute } => {
                Trigger::FixedTime(FixedTimeTrigger { hour, minute })
            }
            ScheduleTime::Sunrise { offset } => Trigger::Sun(SunTrigger::sunrise(
                coords.latitude,
                coords.longitude,
                Some(offset),
            )),
            ScheduleTime::Sunset { offset } => Trigger::Sun(SunTrigger::sunset(
                coords.latitude,
                coords.longitude,
                Some(offset),
            )),
        };
        trigger.next_time(&now)
    }

    /// Evaluate the guards and spawn the callback when they all pass
    pub(crate) async fn maybe_run(&self, app: &Arc<AppInner>) {
        let today = Local::now().date_naive();
        if !outside_exception_dates(&self.exception_dates, today) {
            return;
        }
        if !allowlist_permits(&self.allowlist_dates, today) {
            return;
        }
        if !enabled_entities_allow(&app.state, &self.enabled_entities).await {
            return;
        }
        if !disabled_entities_allow(&app.state, &self.disabled_entities).await {
            return;
        }

        // A panicking callback is confined to its own task.
        tokio::spawn((self.callback)(app.services.clone(), app.state.clone()));
    }
}

/// First builder stage: set the callback
pub struct ScheduleBuilder {}

/// Second builder stage: choose the time of day
pub struct ScheduleBuilderCall {
    schedule: DailySchedule,
}

/// Final builder stage: optional guards, then [`ScheduleBuilderEnd::build`]
pub struct ScheduleBuilderEnd {
    schedule: DailySchedule,
}

impl ScheduleBuilder {
    /// Set the callback to run when the schedule fires
    pub fn call<F, Fut>(self, callback: F) -> ScheduleBuilderCall
    where
        F: Fn(Services, StateRegistry) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        ScheduleBuilderCall {
            schedule: DailySchedule {
                callback: Arc::new(move |services, state| {
                    Box::pin(callback(services, state)) as CallbackFuture
                }),
                when: ScheduleTime::Fixed { hour: 0, minute: 0 },
                next_run: DateTime::<chrono::Utc>::MIN_UTC.into(),
                exception_dates: Vec::new(),
                allowlist_dates: Vec::new(),
                enabled_entities: Vec::new(),
                disabled_entities: Vec::new(),
            },
        }
    }
}

impl ScheduleBuilderCall {
    /// Run at a fixed time each day, given as `"HH:MM"`
    pub fn at(mut self, time: &str) -> Result<ScheduleBuilderEnd, AppError> {
        let parsed = parse_time(time)?;
        use chrono::Timelike;
        self.schedule.when = ScheduleTime::Fixed {
            hour: parsed.hour(),
            minute: parsed.minute(),
        };
        Ok(ScheduleBuilderEnd {
            schedule: self.schedule,
        })
    }

    /// Run at sunrise
    pub fn sunrise(mut self) -> ScheduleBuilderEnd {
        self.schedule.when = ScheduleTime::Sunrise {
            offset: Duration::zero(),
        };
        ScheduleBuilderEnd {
            schedule: self.schedule,
        }
    }

    /// Run at sunrise shifted by a duration string, e.g. `"-30m"`
    pub fn sunrise_offset(mut self, offset: &str) -> Result<ScheduleBuilderEnd, AppError> {
        self.schedule.when = ScheduleTime::Sunrise {
            offset: parse_duration(offset)?,
        };
        Ok(ScheduleBuilderEnd {
            schedule: self.schedule,
        })
    }

    /// Run at sunset
    pub fn sunset(mut self) -> ScheduleBuilderEnd {
        self.schedule.when = ScheduleTime::Sunset {
            offset: Duration::zero(),
        };
        ScheduleBuilderEnd {
            schedule: self.schedule,
        }
    }

    /// Run at sunset shifted by a duration string, e.g. `"+1h"`
    pub fn sunset_offset(mut self, offset: &str) -> Result<ScheduleBuilderEnd, AppError> {
        self.schedule.when = ScheduleTime::Sunset {
            offset: parse_duration(offset)?,
        };
        Ok(ScheduleBuilderEnd {
            schedule: self.schedule,
        })
    }
}

impl ScheduleBuilderEnd {
    /// Dates on which the schedule must not run
    pub fn exception_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.schedule.exception_dates.extend(dates);
        self
    }

    /// Restrict the schedule to run only on these dates
    pub fn only_on_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.schedule.allowlist_dates.extend(dates);
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
        self.schedule.enabled_entities.push(StatePredicate {
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
        self.schedule.disabled_entities.push(StatePredicate {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            run_on_error,
        });
        Ok(self)
    }

    pub fn build(self) -> DailySchedule {
        self.schedule
    }
}

/// The schedules run loop
///
/// Pops the earliest schedule, catches up anything overdue, sleeps until
/// the deadline (or cancellation), runs and requeues.
pub(crate) async fn run_schedules(app: Arc<AppInner>) {
    if app.schedules.is_empty() {
        return;
    }

    loop {
        if app.cancel.is_cancelled() {
            info!("Schedules task shutting down");
            return;
        }

        let Some(mut schedule) = app.schedules.pop() else {
            return;
        };

        // Run overdue schedules back to back in case they overlap.
        while schedule.next_run < Local::now() {
            schedule.maybe_run(&app).await;
            requeue_schedule(&app, schedule);

            match app.schedules.pop() {
                Some(next) => schedule = next,
                None => return,
            }
        }

        info!(next_run = %schedule.next_run, "Next schedule");

        let wait = (schedule.next_run - Local::now())
            .to_std()
            .unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = app.cancel.cancelled() => {
                info!("Schedules task shutting down");
                return;
            }
        }

        schedule.maybe_run(&app).await;
        requeue_schedule(&app, schedule);
    }
}

/// Compute the schedule's next run and put it back on the queue
fn requeue_schedule(app: &Arc<AppInner>, mut schedule: DailySchedule) {
    let next = match schedule.when {
        ScheduleTime::Fixed { .. } => schedule.next_run.checked_add_days(Days::new(1)),
        ScheduleTime::Sunrise { .. } | ScheduleTime::Sunset { .. } => {
            schedule.next_run_after(app.state.coordinates(), Local::now())
        }
    };

    match next {
        Some(next_run) => {
            schedule.next_run = next_run;
            let priority = next_run.timestamp();
            app.schedules.push(schedule, priority);
        }
        None => warn!(schedule = ?schedule, "No further run time; dropping schedule"),
    }
}
