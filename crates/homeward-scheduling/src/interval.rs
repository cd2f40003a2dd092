//! Interval trigger: a repeating cycle of offsets from an epoch

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::builder::BuildError;

/// Fires at a repeating cycle of offsets measured from an epoch
///
/// With offsets `[a, b, c]` the firing times are `epoch + a`,
/// `epoch + a + b`, `epoch + a + b + c`, then the cycle repeats from
/// `epoch + (a + b + c)`. A single offset degenerates to a plain fixed
/// interval.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalTrigger {
    offsets: Vec<Duration>,
    epoch: DateTime<Utc>,
    total: Duration,
}

impl IntervalTrigger {
    /// Create an interval trigger from one or more strictly positive offsets
    ///
    /// The epoch defaults to the unix epoch when not supplied.
    pub fn new(
        offsets: Vec<Duration>,
        epoch: Option<DateTime<Utc>>,
    ) -> Result<Self, BuildError> {
        if offsets.is_empty() || offsets.iter().any(|o| *o <= Duration::zero()) {
            return Err(BuildError::InvalidInterval);
        }

        let total = offsets
            .iter()
            .fold(Duration::zero(), |acc, o| acc + *o);

        Ok(Self {
            offsets,
            epoch: epoch.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            total,
        })
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn offsets(&self) -> &[Duration] {
        &self.offsets
    }

    pub(crate) fn next_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let now_utc = now.with_timezone(&Utc);

        // Before the epoch the next firing is simply the first offset.
        if now_utc < self.epoch {
            return Some((self.epoch + self.offsets[0]).with_timezone(&tz));
        }

        let total_nanos = self.total.num_nanoseconds()?;
        let elapsed_nanos = (now_utc - self.epoch).num_nanoseconds()?;
        let cycles = elapsed_nanos / total_nanos;
        let cycle_start = self.epoch + Duration::nanoseconds(cycles * total_nanos);

        let mut candidate = cycle_start;
        for offset in &self.offsets {
            candidate += *offset;
            if candidate > now_utc {
                return Some(candidate.with_timezone(&tz));
            }
        }

        // End of the current cycle; the next firing opens the next one.
        let next = cycle_start + self.total + self.offsets[0];
        Some(next.with_timezone(&tz))
    }
}
