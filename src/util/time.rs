//! UTC date helpers shared by the client and orchestrator.
//!
//! All hashing and bookmark formatting goes through these helpers so that
//! every instant renders the same way on every host.

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Utc};

/// Format an instant as RFC3339 with a trailing `Z` and whole seconds.
#[must_use]
pub fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format an instant as its UTC calendar date (`YYYY-MM-DD`).
#[must_use]
pub fn utc_date(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d").to_string()
}

/// Truncate an instant to UTC midnight.
#[must_use]
pub fn day_floor(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(instant.year(), instant.month(), instant.day(), 0, 0, 0)
        .single()
        .unwrap_or(instant)
}

/// The first instant of the calendar month containing `instant`.
#[must_use]
pub fn month_floor(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(instant.year(), instant.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(instant)
}

/// The first instant of the month after the one containing `instant`.
#[must_use]
pub fn next_month_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if instant.month() == 12 {
        (instant.year() + 1, 1)
    } else {
        (instant.year(), instant.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(instant)
}
