//! Standard 5-field cron expression parsing and evaluation
//!
//! Supports `minute hour day-of-month month day-of-week` with `*`, single
//! values, lists, ranges and `*/n` steps. Day of week runs 0-6 with
//! Sunday = 0. Evaluation is minute-resolution.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use homeward_core::ParseError;

/// A parsed 5-field cron expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CronExpression {
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    weekday: CronField,
}

/// A single field in a cron expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CronField {
    /// `*` - matches all values
    Any,
    /// A single value
    Value(u32),
    /// A comma list, e.g. `1,3,5`
    List(Vec<u32>),
    /// An inclusive range, e.g. `1-5`
    Range(u32, u32),
    /// A step, e.g. `*/15`
    Step(u32),
}

impl CronField {
    fn matches(&self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Value(v) => *v == value,
            Self::List(values) => values.contains(&value),
            Self::Range(start, end) => value >= *start && value <= *end,
            Self::Step(step) => value % step == 0,
        }
    }
}

impl CronExpression {
    /// Parse a standard cron expression, e.g. `*/15 * * * *` or `0 8 * * 1-5`
    pub fn parse(expr: &str) -> Result<Self, ParseError> {
        let err = |reason: &str| ParseError::InvalidCron(expr.to_string(), reason.to_string());

        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(err("expected 5 fields: minute hour dom month dow"));
        }

        Ok(Self {
            minute: parse_field(parts[0], 0, 59).map_err(|r| err(&format!("minute: {r}")))?,
            hour: parse_field(parts[1], 0, 23).map_err(|r| err(&format!("hour: {r}")))?,
            day: parse_field(parts[2], 1, 31).map_err(|r| err(&format!("day of month: {r}")))?,
            month: parse_field(parts[3], 1, 12).map_err(|r| err(&format!("month: {r}")))?,
            weekday: parse_field(parts[4], 0, 6).map_err(|r| err(&format!("day of week: {r}")))?,
        })
    }

    /// Check whether the expression matches a given time, minute resolution
    pub fn matches<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> bool {
        self.minute.matches(time.minute())
            && self.hour.matches(time.hour())
            && self.day.matches(time.day())
            && self.month.matches(time.month())
            && self.weekday.matches(time.weekday().num_days_from_sunday())
    }

    /// The next matching minute strictly after the given time
    ///
    /// Scans at most one year ahead; expressions that never match (e.g.
    /// `0 0 31 2 *`) yield `None`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut current = after
            .clone()
            .with_second(0)?
            .with_nanosecond(0)?
            + Duration::minutes(1);

        for _ in 0..(366 * 24 * 60) {
            if self.matches(&current) {
                return Some(current);
            }
            current = current + Duration::minutes(1);
        }
        None
    }
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<CronField, String> {
    if field == "*" {
        return Ok(CronField::Any);
    }

    if let Some(step_str) = field.strip_prefix("*/") {
        let step: u32 = step_str
            .parse()
            .map_err(|_| format!("invalid step {step_str:?}"))?;
        if step == 0 || step > max {
            return Err(format!("step must be 1-{max}"));
        }
        return Ok(CronField::Step(step));
    }

    if field.contains('-') {
        let (start, end) = field
            .split_once('-')
            .ok_or_else(|| format!("invalid range {field:?}"))?;
        let start: u32 = start.parse().map_err(|_| format!("invalid range start {start:?}"))?;
        let end: u32 = end.parse().map_err(|_| format!("invalid range end {end:?}"))?;
        if start < min || end > max || start > end {
            return Err(format!("range must be {min}-{max} with start <= end"));
        }
        return Ok(CronField::Range(start, end));
    }

    if field.contains(',') {
        let values = field
            .split(',')
            .map(|v| {
                let num: u32 = v.parse().map_err(|_| format!("invalid list value {v:?}"))?;
                if num < min || num > max {
                    return Err(format!("value must be {min}-{max}"));
                }
                Ok(num)
            })
            .collect::<Result<Vec<u32>, String>>()?;
        return Ok(CronField::List(values));
    }

    let value: u32 = field.parse().map_err(|_| format!("invalid value {field:?}"))?;
    if value < min || value > max {
        return Err(format!("value must be {min}-{max}"));
    }
    Ok(CronField::Value(value))
}
