//! Rain-day accounting.
//!
//! Rainfall totals are accumulated from 19:00 one evening to 19:00 the next,
//! and each period is labelled with the calendar date it started on. A
//! reading taken at 10:00 on the 2nd therefore belongs to the rain day of
//! the 1st; one taken at 19:30 on the 2nd belongs to the rain day of the 2nd.
//!
//! Functions here are generic over the chrono `TimeZone` so tests can pin an
//! offset. The daemon always passes `chrono::Local`, which keeps every call
//! in one process on the same timezone.

use chrono::{DateTime, Duration, TimeZone, Timelike};
use std::fmt::Display;

/// Local hour at which a new rain day begins.
pub const RAIN_DAY_CUTOFF_HOUR: u32 = 19;

/// Returns the `YYYY-MM-DD` label of the rain day containing `now`.
pub fn rain_day<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    let mut date = now.date_naive();
    if now.hour() < RAIN_DAY_CUTOFF_HOUR {
        date = date - Duration::days(1);
    }
    date.format("%Y-%m-%d").to_string()
}

/// Human-readable local timestamp stored alongside change records,
/// e.g. `"10:05:00 02/01/2024"`.
pub fn human_time<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    now.format("%H:%M:%S %d/%m/%Y").to_string()
}
