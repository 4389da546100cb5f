//! Database queries for the scheduler daemon
//!
//! All scheduler mutations go through predicate-scoped conditional updates
//! (`UPDATE ... WHERE <selection predicate> RETURNING ...`). A record that
//! was already transitioned no longer matches the predicate, so overlapping
//! ticks and concurrent schedulers are no-ops for it; no read-modify-write
//! happens in application memory.

pub mod audits;
pub mod users;

use chrono::{DateTime, SecondsFormat, Utc};
use salv_common::{Error, Result};

/// Canonical timestamp encoding for the store: fixed-width RFC3339 UTC,
/// so lexicographic TEXT comparison agrees with chronological order.
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Bad stored timestamp '{}': {}", s, e)))
}

pub(crate) fn parse_ts_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

/// Build a `?, ?, ...` placeholder list for an `IN` clause
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
