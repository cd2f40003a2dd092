//! Builder combining several triggers into one schedule

use chrono::{DateTime, Duration, Utc};
use homeward_core::{Coordinates, ParseError};
use thiserror::Error;

use crate::interval::IntervalTrigger;
use crate::trigger::{CompositeTrigger, CronTrigger, FixedTimeTrigger, SunTrigger, Trigger};

/// Errors from constructing triggers
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("no triggers provided")]
    Empty,

    #[error("duplicate trigger: an identical trigger is already registered")]
    DuplicateTrigger,

    #[error("fixed time out of range: {hour:02}:{minute:02} (hour 0-23, minute 0-59)")]
    InvalidFixedTime { hour: u32, minute: u32 },

    #[error("interval offsets must be non-empty and strictly positive")]
    InvalidInterval,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("trigger configuration failed: {0}")]
    Invalid(String),
}

/// Accumulates triggers and produces a single [`Trigger`]
///
/// Errors are collected as the chain is built and reported together from
/// [`TriggerBuilder::build`], so a fluent chain never panics on bad input.
/// Duplicate triggers (by parameter hash) are rejected.
#[derive(Debug, Default)]
pub struct TriggerBuilder {
    triggers: Vec<Trigger>,
    hashes: Vec<u64>,
    errors: Vec<BuildError>,
}

impl TriggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed local time, e.g. `at(8, 0)` for 08:00 daily
    pub fn at(mut self, hour: u32, minute: u32) -> Self {
        match FixedTimeTrigger::new(hour, minute) {
            Ok(t) => self.try_add(Trigger::FixedTime(t)),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Add a sunrise trigger for the given coordinates
    pub fn on_sunrise(mut self, coords: Coordinates, offset: Option<Duration>) -> Self {
        self.try_add(Trigger::Sun(SunTrigger::sunrise(
            coords.latitude,
            coords.longitude,
            offset,
        )));
        self
    }

    /// Add a sunset trigger for the given coordinates
    pub fn on_sunset(mut self, coords: Coordinates, offset: Option<Duration>) -> Self {
        self.try_add(Trigger::Sun(SunTrigger::sunset(
            coords.latitude,
            coords.longitude,
            offset,
        )));
        self
    }

    /// Add a standard 5-field cron expression
    pub fn cron(mut self, expression: &str) -> Self {
        match CronTrigger::new(expression) {
            Ok(t) => self.try_add(Trigger::Cron(t)),
            Err(e) => self.errors.push(e.into()),
        }
        self
    }

    /// Add an interval cycle of offsets measured from `epoch`
    pub fn every(mut self, offsets: Vec<Duration>, epoch: Option<DateTime<Utc>>) -> Self {
        match IntervalTrigger::new(offsets, epoch) {
            Ok(t) => self.try_add(Trigger::Interval(t)),
            Err(e) => self.errors.push(e),
        }
        self
    }

    fn try_add(&mut self, trigger: Trigger) {
        let hash = trigger.hash();
        if self.hashes.contains(&hash) {
            self.errors.push(BuildError::DuplicateTrigger);
            return;
        }
        self.hashes.push(hash);
        self.triggers.push(trigger);
    }

    /// Finish the chain, yielding the single trigger or a composite
    pub fn build(mut self) -> Result<Trigger, BuildError> {
        if self.triggers.is_empty() && self.errors.is_empty() {
            self.errors.push(BuildError::Empty);
        }

        if !self.errors.is_empty() {
            if self.errors.len() == 1 {
                return Err(self.errors.remove(0));
            }
            let joined = self
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(BuildError::Invalid(joined));
        }

        if self.triggers.len() == 1 {
            return Ok(self.triggers.remove(0));
        }
        Ok(Trigger::Composite(CompositeTrigger::new(self.triggers)))
    }
}
