//! Fixed-frequency intervals and their run loop

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime};
use homeward_core::{parse_duration, parse_time};
use tracing::info;

use crate::app::AppInner;
use crate::conditions::{
    disabled_entities_allow, enabled_entities_allow, outside_exception_dates,
    outside_exception_ranges, start_end_time_permits, StatePredicate, TimeRange, UNBOUNDED,
};
use crate::error::AppError;
use crate::service::Services;
use crate::state::StateRegistry;
use crate::CallbackFuture;

/// Callback invoked when an interval fires
pub type IntervalCallback = Arc<dyn Fn(Services, StateRegistry) -> CallbackFuture + Send + Sync>;

/// A fixed-frequency automation, optionally bounded to a daily window
///
/// Built with [`Interval::builder`], registered through
/// [`crate::App::register_intervals`]. `starting_at`/`ending_at` of
/// `"00:00"` mean unbounded.
#[derive(Clone)]
pub struct Interval {
    pub(crate) callback: IntervalCallback,
    pub(crate) frequency: Duration,
    pub(crate) start_time: NaiveTime,
    pub(crate) end_time: NaiveTime,
    pub(crate) next_run: DateTime<Local>,
    pub(crate) exception_dates: Vec<NaiveDate>,
    pub(crate) exception_ranges: Vec<TimeRange>,
    pub(crate) enabled_entities: Vec<StatePredicate>,
    pub(crate) disabled_entities: Vec<StatePredicate>,
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interval")
            .field("frequency", &self.frequency)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("next_run", &self.next_run)
            .finish_non_exhaustive()
    }
}

impl Interval {
    /// Start the fluent builder chain
    pub fn builder() -> IntervalBuilder {
        IntervalBuilder {}
    }

    /// Evaluate the guards and spawn the callback when they all pass
    pub(crate) async fn maybe_run(&self, app: &Arc<AppInner>) {
        let now = Local::now();
        let time_of_day = now.time();
        if !start_end_time_permits(self.start_time, true, time_of_day) {
            return;
        }
        if !start_end_time_permits(self.end_time, false, time_of_day) {
            return;
        }
        if !outside_exception_dates(&self.exception_dates, now.date_naive()) {
            return;
        }
        if !outside_exception_ranges(&self.exception_ranges, now) {
            return;
        }
        if !enabled_entities_allow(&app.state, &self.enabled_entities).await {
            return;
        }
        if !disabled_entities_allow(&app.state, &self.disabled_entities).await {
            return;
        }

        tokio::spawn((self.callback)(app.services.clone(), app.state.clone()));
    }
}

/// First builder stage: set the callback
pub struct IntervalBuilder {}

/// Second builder stage: set the frequency
pub struct IntervalBuilderCall {
    interval: Interval,
}

/// Final builder stage: optional bounds and guards, then build
pub struct IntervalBuilderEnd {
    interval: Interval,
}

impl IntervalBuilder {
    /// Set the callback to run on each tick
    pub fn call<F, Fut>(self, callback: F) -> IntervalBuilderCall
    where
        F: Fn(Services, StateRegistry) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        IntervalBuilderCall {
            interval: Interval {
                callback: Arc::new(move |services, state| {
                    Box::pin(callback(services, state)) as CallbackFuture
                }),
                frequency: Duration::zero(),
                start_time: UNBOUNDED,
                end_time: UNBOUNDED,
                next_run: DateTime::<chrono::Utc>::MIN_UTC.into(),
                exception_dates: Vec::new(),
                exception_ranges: Vec::new(),
                enabled_entities: Vec::new(),
                disabled_entities: Vec::new(),
            },
        }
    }
}

impl IntervalBuilderCall {
    /// Set the tick frequency from a duration string such as `"5m"`
    ///
    /// The frequency must be strictly positive.
    pub fn every(mut self, frequency: &str) -> Result<IntervalBuilderEnd, AppError> {
        let parsed = parse_duration(frequency)?;
        if parsed <= Duration::zero() {
            return Err(AppError::InvalidArgs(format!(
                "interval frequency must be positive, got {frequency:?}"
            )));
        }
        self.interval.frequency = parsed;
        Ok(IntervalBuilderEnd {
            interval: self.interval,
        })
    }
}

impl IntervalBuilderEnd {
    /// First tick of the day, as `"HH:MM"`; `"00:00"` means unbounded
    pub fn starting_at(mut self, time: &str) -> Result<Self, AppError> {
        self.interval.start_time = parse_time(time)?;
        Ok(self)
    }

    /// Last tick of the day, as `"HH:MM"`; `"00:00"` means unbounded
    pub fn ending_at(mut self, time: &str) -> Result<Self, AppError> {
        self.interval.end_time = parse_time(time)?;
        Ok(self)
    }

    /// Dates on which the interval must not run
    pub fn exception_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.interval.exception_dates.extend(dates);
        self
    }

    /// A wall-clock range during which the interval must not run
    pub fn exception_range(mut self, start: DateTime<Local>, end: DateTime<Local>) -> Self {
        self.interval.exception_ranges.push(TimeRange { start, end });
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
        self.interval.enabled_entities.push(StatePredicate {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            run_on_error,
        });
        Ok(self)
    }

    /// Skip ticks while `entity_id` is in `state`
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
        self.interval.disabled_entities.push(StatePredicate {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            run_on_error,
        });
        Ok(self)
    }

    pub fn build(self) -> Interval {
        self.interval
    }
}

/// Seed an interval's first run: today's start time advanced by whole
/// frequencies until strictly in the future
pub(crate) fn initial_next_run(interval: &Interval, now: DateTime<Local>) -> DateTime<Local> {
    let mut next = now
        .date_naive()
        .and_time(interval.start_time)
        .and_local_timezone(Local)
        .earliest()
        .unwrap_or(now);

    while next <= now {
        next += interval.frequency;
    }
    next
}

/// The intervals run loop; same shape as the schedules loop
pub(crate) async fn run_intervals(app: Arc<AppInner>) {
    if app.intervals.is_empty() {
        return;
    }

    loop {
        if app.cancel.is_cancelled() {
            info!("Intervals task shutting down");
            return;
        }

        let Some(mut interval) = app.intervals.pop() else {
            return;
        };

        // Catch up any overdue ticks in case they overlap.
        while interval.next_run < Local::now() {
            interval.maybe_run(&app).await;
            requeue_interval(&app, interval);

            match app.intervals.pop() {
                Some(next) => interval = next,
                None => return,
            }
        }

        let wait = (interval.next_run - Local::now())
            .to_std()
            .unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = app.cancel.cancelled() => {
                info!("Intervals task shutting down");
                return;
            }
        }

        interval.maybe_run(&app).await;
        requeue_interval(&app, interval);
    }
}

/// Advance by one frequency and put the interval back on the queue
fn requeue_interval(app: &Arc<AppInner>, mut interval: Interval) {
    interval.next_run += interval.frequency;
    let priority = interval.next_run.timestamp();
    app.intervals.push(interval, priority);
}
