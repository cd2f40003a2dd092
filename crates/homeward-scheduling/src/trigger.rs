//! Trigger variants and the `next_time`/`hash` contract
//!
//! A trigger yields the next firing time strictly after a given instant.
//! Variants are a tagged union rather than trait objects so the set is
//! closed and hashing stays structural.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use homeward_core::ParseError;

use crate::builder::BuildError;
use crate::cron::CronExpression;
use crate::interval::IntervalTrigger;
use crate::sun;

/// A source of future firing times
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// A fixed local wall-clock time each day
    FixedTime(FixedTimeTrigger),
    /// Sunrise or sunset at a coordinate, with an optional offset
    Sun(SunTrigger),
    /// A standard 5-field cron expression
    Cron(CronTrigger),
    /// A repeating cycle of offsets from an epoch
    Interval(IntervalTrigger),
    /// The earliest of several child triggers
    Composite(CompositeTrigger),
}

impl Trigger {
    /// The next firing time strictly after `now`, or `None` if the trigger
    /// can never fire again (e.g. a cron expression that never matches)
    pub fn next_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Trigger::FixedTime(t) => t.next_time(now),
            Trigger::Sun(t) => t.next_time(now),
            Trigger::Cron(t) => t.next_time(now),
            Trigger::Interval(t) => t.next_time(now),
            Trigger::Composite(t) => t.next_time(now),
        }
    }

    /// A stable 64-bit hash of the trigger's parameters
    ///
    /// Identical parameters always produce identical hashes; the builder
    /// uses this to reject duplicate registrations.
    pub fn hash(&self) -> u64 {
        let mut h = DefaultHasher::new();
        match self {
            Trigger::FixedTime(t) => {
                0u8.hash(&mut h);
                t.hour.hash(&mut h);
                t.minute.hash(&mut h);
            }
            Trigger::Sun(t) => {
                1u8.hash(&mut h);
                t.latitude.to_bits().hash(&mut h);
                t.longitude.to_bits().hash(&mut h);
                t.sunset.hash(&mut h);
                t.offset.map(|o| o.num_nanoseconds()).hash(&mut h);
            }
            Trigger::Cron(t) => {
                2u8.hash(&mut h);
                t.expression.hash(&mut h);
            }
            Trigger::Interval(t) => {
                3u8.hash(&mut h);
                t.epoch().timestamp().hash(&mut h);
                t.epoch().timestamp_subsec_nanos().hash(&mut h);
                for offset in t.offsets() {
                    offset.num_nanoseconds().hash(&mut h);
                }
            }
            Trigger::Composite(t) => {
                4u8.hash(&mut h);
                for child in &t.children {
                    child.hash().hash(&mut h);
                }
            }
        }
        h.finish()
    }
}

/// Fires at `hour:minute` local time each day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTimeTrigger {
    pub hour: u32,
    pub minute: u32,
}

impl FixedTimeTrigger {
    /// Create a fixed-time trigger, validating the clock components
    pub fn new(hour: u32, minute: u32) -> Result<Self, BuildError> {
        if hour > 23 || minute > 59 {
            return Err(BuildError::InvalidFixedTime { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    fn next_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        // Up to two extra days: today's slot may be past, and a DST gap can
        // swallow the wall-clock time on a transition day.
        for day in 0..3i64 {
            let date = now.date_naive() + Duration::days(day);
            let naive = date.and_hms_opt(self.hour, self.minute, 0)?;
            if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
                if candidate > *now {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// Fires at sunrise or sunset for a coordinate, shifted by an offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunTrigger {
    pub latitude: f64,
    pub longitude: f64,
    pub sunset: bool,
    pub offset: Option<Duration>,
}

impl SunTrigger {
    pub fn sunrise(latitude: f64, longitude: f64, offset: Option<Duration>) -> Self {
        Self {
            latitude,
            longitude,
            sunset: false,
            offset,
        }
    }

    pub fn sunset(latitude: f64, longitude: f64, offset: Option<Duration>) -> Self {
        Self {
            latitude,
            longitude,
            sunset: true,
            offset,
        }
    }

    fn next_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let start: NaiveDate = now.date_naive() - Duration::days(1);
        // Scan forward day by day; days without a sun event (polar regions)
        // are skipped. The scan starts a day early because the previous
        // calendar date's event can still lie ahead of `now` in some zones.
        for day in 0..368i64 {
            let date = start + Duration::days(day);
            let Some((rise, set)) = sun::sun_times(self.latitude, self.longitude, date) else {
                continue;
            };
            let mut event = if self.sunset { set } else { rise };
            if let Some(offset) = self.offset {
                event += offset;
            }
            let candidate = event.with_timezone(&now.timezone());
            if candidate > *now {
                return Some(candidate);
            }
        }
        None
    }
}

/// Fires on a standard 5-field cron schedule
#[derive(Debug, Clone, PartialEq)]
pub struct CronTrigger {
    pub(crate) expression: String,
    parsed: CronExpression,
}

impl CronTrigger {
    /// Parse a cron expression into a trigger
    pub fn new(expression: impl Into<String>) -> Result<Self, ParseError> {
        let expression = expression.into();
        let parsed = CronExpression::parse(&expression)?;
        Ok(Self { expression, parsed })
    }

    /// The cron expression string this trigger was parsed from
    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn next_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.parsed.next_after(now)
    }
}

/// The earliest of several child triggers
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeTrigger {
    pub(crate) children: Vec<Trigger>,
}

impl CompositeTrigger {
    pub fn new(children: Vec<Trigger>) -> Self {
        Self { children }
    }

    pub fn children(&self) -> &[Trigger] {
        &self.children
    }

    fn next_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.children
            .iter()
            .filter_map(|child| child.next_time(now))
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::IntervalTrigger;
    use chrono::Utc;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_fixed_time_before_and_after_slot() {
        let trigger = Trigger::FixedTime(FixedTimeTrigger::new(8, 0).unwrap());

        let before = utc(2025, 8, 2, 6, 0);
        assert_eq!(trigger.next_time(&before), Some(utc(2025, 8, 2, 8, 0)));

        let after = utc(2025, 8, 2, 10, 0);
        assert_eq!(trigger.next_time(&after), Some(utc(2025, 8, 3, 8, 0)));
    }

    #[test]
    fn test_fixed_time_exact_slot_advances_a_day() {
        let trigger = Trigger::FixedTime(FixedTimeTrigger::new(8, 0).unwrap());
        let at = utc(2025, 8, 2, 8, 0);
        assert_eq!(trigger.next_time(&at), Some(utc(2025, 8, 3, 8, 0)));
    }

    #[test]
    fn test_fixed_time_rejects_bad_components() {
        assert!(FixedTimeTrigger::new(24, 0).is_err());
        assert!(FixedTimeTrigger::new(0, 60).is_err());
    }

    #[test]
    fn test_composite_picks_earliest() {
        let trigger = Trigger::Composite(CompositeTrigger::new(vec![
            Trigger::FixedTime(FixedTimeTrigger::new(8, 0).unwrap()),
            Trigger::FixedTime(FixedTimeTrigger::new(12, 0).unwrap()),
            Trigger::FixedTime(FixedTimeTrigger::new(18, 0).unwrap()),
        ]));

        let mid_morning = utc(2025, 8, 2, 10, 0);
        assert_eq!(trigger.next_time(&mid_morning), Some(utc(2025, 8, 2, 12, 0)));

        let evening = utc(2025, 8, 2, 20, 0);
        assert_eq!(trigger.next_time(&evening), Some(utc(2025, 8, 3, 8, 0)));
    }

    #[test]
    fn test_composite_equals_minimum_of_children() {
        let children = vec![
            Trigger::FixedTime(FixedTimeTrigger::new(6, 30).unwrap()),
            Trigger::Cron(CronTrigger::new("*/15 * * * *").unwrap()),
        ];
        let composite = Trigger::Composite(CompositeTrigger::new(children.clone()));

        let now = utc(2025, 8, 2, 10, 7);
        let expected = children.iter().filter_map(|c| c.next_time(&now)).min();
        assert_eq!(composite.next_time(&now), expected);
    }

    #[test]
    fn test_sun_trigger_advances_past_now() {
        let trigger = Trigger::Sun(SunTrigger::sunrise(51.5074, -0.1278, None));
        let now = utc(2025, 8, 2, 12, 0);
        let next = trigger.next_time(&now).unwrap();
        assert!(next > now);
        // Past noon, the next sunrise is tomorrow's.
        assert_eq!(next.date_naive(), now.date_naive() + Duration::days(1));
    }

    #[test]
    fn test_sun_trigger_offset_applied() {
        let base = Trigger::Sun(SunTrigger::sunset(51.5074, -0.1278, None));
        let shifted = Trigger::Sun(SunTrigger::sunset(
            51.5074,
            -0.1278,
            Some(Duration::minutes(-30)),
        ));

        let now = utc(2025, 8, 2, 0, 0);
        let plain = base.next_time(&now).unwrap();
        let early = shifted.next_time(&now).unwrap();
        assert_eq!(plain - early, Duration::minutes(30));
    }

    #[test]
    fn test_hash_stability_and_distinctness() {
        let a = Trigger::FixedTime(FixedTimeTrigger::new(8, 0).unwrap());
        let b = Trigger::FixedTime(FixedTimeTrigger::new(8, 0).unwrap());
        let c = Trigger::FixedTime(FixedTimeTrigger::new(8, 1).unwrap());
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());

        let cron1 = Trigger::Cron(CronTrigger::new("*/15 * * * *").unwrap());
        let cron2 = Trigger::Cron(CronTrigger::new("*/15 * * * *").unwrap());
        let cron3 = Trigger::Cron(CronTrigger::new("*/10 * * * *").unwrap());
        assert_eq!(cron1.hash(), cron2.hash());
        assert_ne!(cron1.hash(), cron3.hash());

        let sun1 = Trigger::Sun(SunTrigger::sunrise(51.0, 0.0, None));
        let sun2 = Trigger::Sun(SunTrigger::sunset(51.0, 0.0, None));
        assert_ne!(sun1.hash(), sun2.hash());

        let epoch = utc(2025, 1, 1, 0, 0);
        let int1 = Trigger::Interval(
            IntervalTrigger::new(vec![Duration::hours(1)], Some(epoch)).unwrap(),
        );
        let int2 = Trigger::Interval(
            IntervalTrigger::new(vec![Duration::hours(2)], Some(epoch)).unwrap(),
        );
        assert_ne!(int1.hash(), int2.hash());

        // Hashes differ across variants even with overlapping parameter bits.
        assert_ne!(a.hash(), cron1.hash());
        assert_ne!(a.hash(), sun1.hash());

        let comp1 = Trigger::Composite(CompositeTrigger::new(vec![a.clone(), c.clone()]));
        let comp2 = Trigger::Composite(CompositeTrigger::new(vec![a.clone(), c.clone()]));
        let comp3 = Trigger::Composite(CompositeTrigger::new(vec![c, a]));
        assert_eq!(comp1.hash(), comp2.hash());
        assert_ne!(comp1.hash(), comp3.hash());
    }
}
