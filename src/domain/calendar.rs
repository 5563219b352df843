// Copyright (c) 2025 - Cowboy AI, Inc.
//! Calendar-day helpers
//!
//! Every day boundary in the engine is a UTC calendar day.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Calendar day an instant falls on
pub fn day_of(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Midnight opening the given day
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// Midnight closing the given day (first instant of the next day)
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    start_of_day(day) + Duration::days(1)
}

/// Whole days between two instants, rounding partial days up
///
/// Negative or empty spans count as zero.
pub fn day_span(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let millis = (to - from).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}
