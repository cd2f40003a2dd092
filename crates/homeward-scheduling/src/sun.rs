//! Sunrise and sunset times for a coordinate and date

use chrono::{DateTime, NaiveDate, Utc};
use sunrise::{Coordinates, SolarDay, SolarEvent};

/// Compute sunrise and sunset for the given coordinates and calendar date
///
/// Returns `None` for out-of-range coordinates or when the sun does not
/// rise and set on that date (polar night collapses the pair); callers
/// are expected to skip forward to the next date rather than schedule at
/// a degenerate instant.
pub fn sun_times(
    latitude: f64,
    longitude: f64,
    date: NaiveDate,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let coord = Coordinates::new(latitude, longitude)?;
    let day = SolarDay::new(coord, date);

    let rise = day.event_time(SolarEvent::Sunrise);
    let set = day.event_time(SolarEvent::Sunset);

    // Without a horizon crossing the solver degenerates to a collapsed
    // (or inverted) pair; there is no event to schedule that day.
    if rise >= set {
        return None;
    }
    Some((rise, set))
}
