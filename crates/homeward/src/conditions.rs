//! Condition evaluation shared by every trigger kind
//!
//! Each predicate is a pure pass/fail function over explicit inputs; a
//! schedule, interval or listener runs iff every applicable predicate
//! passes. The entity-backed predicates consult the [`StateRegistry`]
//! and honor the per-predicate `run_on_error` flag.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::debug;

use crate::state::StateRegistry;

/// An entity state requirement used by `enabled_when` / `disabled_when`
#[derive(Debug, Clone)]
pub struct StatePredicate {
    pub entity_id: String,
    pub state: String,
    /// When a state fetch fails, `true` skips this predicate instead of
    /// failing the whole evaluation
    pub run_on_error: bool,
}

/// A wall-clock range used for exception windows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

/// The start/end sentinel meaning "unbounded": midnight, `"00:00"`
pub(crate) const UNBOUNDED: NaiveTime = NaiveTime::MIN;

/// Pass iff `now` falls inside the optional daily window
///
/// With both ends set and `end < start` the window crosses midnight and
/// is extended to whichever side contains `now`. The window includes its
/// start and excludes its end.
pub fn within_time_range(
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
    now: NaiveDateTime,
) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => {
            let mut start_at = now.date().and_time(start);
            let mut end_at = now.date().and_time(end);

            if end < start {
                if end_at < now {
                    end_at += Duration::days(1);
                } else {
                    start_at -= Duration::days(1);
                }
            }

            start_at <= now && now < end_at
        }
        (Some(start), None) => now.date().and_time(start) <= now,
        (None, Some(end)) => now < now.date().and_time(end),
        (None, None) => true,
    }
}

/// Pass iff no state requirement is set, or the observed state matches
pub fn states_match(required: &str, observed: &str) -> bool {
    required.is_empty() || required == observed
}

/// Pass iff no throttle is set or enough time elapsed since the last run
pub fn throttle_elapsed(
    throttle: Duration,
    last_ran: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if throttle <= Duration::zero() {
        return true;
    }
    match last_ran {
        Some(last) => now - last >= throttle,
        None => true,
    }
}

/// Pass iff today is not one of the exception dates
pub fn outside_exception_dates(dates: &[NaiveDate], today: NaiveDate) -> bool {
    !dates.contains(&today)
}

/// Pass iff `now` lies strictly inside none of the exception ranges
pub fn outside_exception_ranges(ranges: &[TimeRange], now: DateTime<Local>) -> bool {
    !ranges
        .iter()
        .any(|range| now > range.start && now < range.end)
}

/// Pass iff the allow-list is empty or contains today
pub fn allowlist_permits(dates: &[NaiveDate], today: NaiveDate) -> bool {
    dates.is_empty() || dates.contains(&today)
}

/// Pass iff every required entity is currently in its required state
pub async fn enabled_entities_allow(
    state: &StateRegistry,
    predicates: &[StatePredicate],
) -> bool {
    for predicate in predicates {
        match state.equals(&predicate.entity_id, &predicate.state).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                debug!(
                    entity_id = %predicate.entity_id,
                    error = %e,
                    run_on_error = predicate.run_on_error,
                    "enabled_when state fetch failed"
                );
                if !predicate.run_on_error {
                    return false;
                }
            }
        }
    }
    true
}

/// Pass iff no disabling entity is currently in its disabling state
pub async fn disabled_entities_allow(
    state: &StateRegistry,
    predicates: &[StatePredicate],
) -> bool {
    for predicate in predicates {
        match state.equals(&predicate.entity_id, &predicate.state).await {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => {
                debug!(
                    entity_id = %predicate.entity_id,
                    error = %e,
                    run_on_error = predicate.run_on_error,
                    "disabled_when state fetch failed"
                );
                if !predicate.run_on_error {
                    return false;
                }
            }
        }
    }
    true
}

/// Pass iff a daily bound permits `now`
///
/// `00:00` is the unbounded sentinel and always passes. A start bound
/// passes once the time of day has reached it; an end bound passes until
/// the time of day exceeds it.
pub fn start_end_time_permits(bound: NaiveTime, is_start: bool, now: NaiveTime) -> bool {
    if bound == UNBOUNDED {
        return true;
    }
    if is_start {
        bound <= now
    } else {
        bound >= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_time_range_plain_window() {
        assert!(within_time_range(Some(t(9, 0)), Some(t(17, 0)), at(12, 0)));
        assert!(!within_time_range(Some(t(9, 0)), Some(t(17, 0)), at(8, 59)));
        // Start is included, end is excluded.
        assert!(within_time_range(Some(t(9, 0)), Some(t(17, 0)), at(9, 0)));
        assert!(!within_time_range(Some(t(9, 0)), Some(t(17, 0)), at(17, 0)));
    }

    #[test]
    fn test_time_range_crosses_midnight() {
        // Night lights window 23:00 -> 07:00.
        assert!(within_time_range(Some(t(23, 0)), Some(t(7, 0)), at(3, 0)));
        assert!(!within_time_range(Some(t(23, 0)), Some(t(7, 0)), at(12, 0)));
        assert!(within_time_range(Some(t(23, 0)), Some(t(7, 0)), at(23, 30)));
    }

    #[test]
    fn test_time_range_single_sided() {
        assert!(within_time_range(Some(t(8, 0)), None, at(9, 0)));
        assert!(!within_time_range(Some(t(8, 0)), None, at(7, 0)));
        assert!(within_time_range(None, Some(t(22, 0)), at(21, 59)));
        assert!(!within_time_range(None, Some(t(22, 0)), at(22, 0)));
        assert!(within_time_range(None, None, at(0, 0)));
    }

    #[test]
    fn test_states_match() {
        assert!(states_match("", "anything"));
        assert!(states_match("on", "on"));
        assert!(!states_match("on", "off"));
    }

    #[test]
    fn test_throttle() {
        let now = Utc.with_ymd_and_hms(2025, 8, 2, 12, 0, 0).unwrap();

        // No throttle, or never ran: always pass.
        assert!(throttle_elapsed(Duration::zero(), Some(now), now));
        assert!(throttle_elapsed(Duration::seconds(10), None, now));

        let recent = now - Duration::seconds(3);
        assert!(!throttle_elapsed(Duration::seconds(10), Some(recent), now));

        let stale = now - Duration::seconds(12);
        assert!(throttle_elapsed(Duration::seconds(10), Some(stale), now));

        // The boundary counts as elapsed.
        let exact = now - Duration::seconds(10);
        assert!(throttle_elapsed(Duration::seconds(10), Some(exact), now));
    }

    #[test]
    fn test_exception_dates() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 2).unwrap();
        let other = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();

        assert!(outside_exception_dates(&[], today));
        assert!(outside_exception_dates(&[other], today));
        assert!(!outside_exception_dates(&[other, today], today));
    }

    #[test]
    fn test_exception_ranges_are_strict() {
        let start = Local.with_ymd_and_hms(2025, 8, 2, 10, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2025, 8, 2, 12, 0, 0).unwrap();
        let range = TimeRange { start, end };

        let inside = Local.with_ymd_and_hms(2025, 8, 2, 11, 0, 0).unwrap();
        assert!(!outside_exception_ranges(&[range], inside));

        // Boundaries are not "strictly inside".
        assert!(outside_exception_ranges(&[range], start));
        assert!(outside_exception_ranges(&[range], end));

        let before = Local.with_ymd_and_hms(2025, 8, 2, 9, 0, 0).unwrap();
        assert!(outside_exception_ranges(&[range], before));
    }

    #[test]
    fn test_allowlist() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 2).unwrap();
        let other = NaiveDate::from_ymd_opt(2025, 8, 3).unwrap();

        assert!(allowlist_permits(&[], today));
        assert!(allowlist_permits(&[other, today], today));
        assert!(!allowlist_permits(&[other], today));
    }

    #[test]
    fn test_start_end_sentinel() {
        assert!(start_end_time_permits(UNBOUNDED, true, t(3, 0)));
        assert!(start_end_time_permits(UNBOUNDED, false, t(3, 0)));
    }

    #[test]
    fn test_start_end_bounds() {
        assert!(start_end_time_permits(t(8, 0), true, t(9, 0)));
        assert!(!start_end_time_permits(t(8, 0), true, t(7, 0)));
        assert!(start_end_time_permits(t(22, 0), false, t(21, 0)));
        assert!(!start_end_time_permits(t(22, 0), false, t(23, 0)));
    }
}
