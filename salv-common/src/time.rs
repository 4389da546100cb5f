//! Timezone-aware time utilities for the schedulers
//!
//! All lifecycle timestamps are stored and compared in UTC. Wall-clock
//! decisions (the nightly fire time, the "last day of month" check, the
//! monthly bucket tag) are made in the organization's operating timezone,
//! never in UTC, so month boundaries cannot slip a day.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a "HH:MM" wall-clock fire time
pub fn parse_fire_time(s: &str) -> Result<(u32, u32)> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| Error::Config(format!("Invalid fire time '{}', expected HH:MM", s)))?;
    let hour: u32 = h
        .parse()
        .map_err(|_| Error::Config(format!("Invalid hour in fire time '{}'", s)))?;
    let minute: u32 = m
        .parse()
        .map_err(|_| Error::Config(format!("Invalid minute in fire time '{}'", s)))?;
    if hour > 23 || minute > 59 {
        return Err(Error::Config(format!("Fire time '{}' out of range", s)));
    }
    Ok((hour, minute))
}

/// Monthly bucket tag ("YYYY-MM") for the given instant, in the org timezone
pub fn month_tag(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m").to_string()
}

/// Whether the given instant falls on the last calendar day of its month
/// in the org timezone
pub fn is_last_day_of_month(at: DateTime<Utc>, tz: Tz) -> bool {
    let date = at.with_timezone(&tz).date_naive();
    match date.succ_opt() {
        Some(next) => next.month() != date.month(),
        None => true,
    }
}

/// Whole hours elapsed between two instants (zero if `since` is in the future)
pub fn hours_since(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_hours().max(0)
}

/// Next occurrence of the given wall-clock time in the given timezone,
/// strictly after `after`, returned as a UTC instant.
///
/// DST handling: an ambiguous local time resolves to its earlier
/// occurrence; a nonexistent local time (spring-forward gap) rolls the
/// fire over to the next day.
pub fn next_occurrence(after: DateTime<Utc>, tz: Tz, hour: u32, minute: u32) -> DateTime<Utc> {
    let mut date = after.with_timezone(&tz).date_naive();
    // Today, tomorrow, and one spare day for a DST gap on the fire time
    for _ in 0..3 {
        if let Some(candidate) = resolve_local(tz, date, hour, minute) {
            if candidate > after {
                return candidate;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    after + Duration::days(1)
}

fn resolve_local(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}
