//! Parsers for the `HH:MM` time and duration string grammars

use chrono::{Duration, NaiveTime};
use thiserror::Error;

/// Errors from parsing time or duration strings
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("invalid time {0:?}: format must be HH:MM in 24-hour local time")]
    InvalidTime(String),

    #[error("invalid duration {0:?}: expected sign + number + unit (ns|us|ms|s|m|h), e.g. \"-1h30m\"")]
    InvalidDuration(String),

    #[error("invalid cron expression {0:?}: {1}")]
    InvalidCron(String, String),
}

/// Parse an `HH:MM` 24-hour time string
pub fn parse_time(s: &str) -> Result<NaiveTime, ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| ParseError::InvalidTime(s.to_string()))
}

/// Parse a duration string such as `45s`, `-1h30m` or `1.5h`
///
/// The grammar is an optional sign followed by one or more number+unit
/// segments, where a unit is one of `ns`, `us`, `ms`, `s`, `m`, `h`.
/// Fractional numbers are allowed. The sign applies to the whole value.
pub fn parse_duration(s: &str) -> Result<Duration, ParseError> {
    let err = || ParseError::InvalidDuration(s.to_string());

    let (negative, mut rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if rest.is_empty() {
        return Err(err());
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(err)?;
        if digits == 0 {
            return Err(err());
        }
        let value: f64 = rest[..digits].parse().map_err(|_| err())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            "m" => 60.0 * 1_000_000_000.0,
            "h" => 3_600.0 * 1_000_000_000.0,
            _ => return Err(err()),
        };
        rest = &rest[unit_len..];

        total_nanos += value * unit_nanos;
    }

    if total_nanos > i64::MAX as f64 {
        return Err(err());
    }

    let mut nanos = total_nanos as i64;
    if negative {
        nanos = -nanos;
    }
    Ok(Duration::nanoseconds(nanos))
}
