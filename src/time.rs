//! Time helpers shared across the stores and the profile search.
//!
//! Kept free of any particular clock source: the engine only ever deals in
//! seconds-since-midnight (`Timestamp`) plus a `chrono::NaiveDate` to anchor
//! the calendar day a query departs on.

use chrono::{Days, NaiveDate};

use crate::ids::Timestamp;

/// Largest departure time a connection may record (§3): ~36 hours, enough to
/// express the common GTFS convention of overnight trips still belonging to
/// the prior service day.
pub const MAX_DEPARTURE_TIME: Timestamp = (1 << 17) - 1;

/// Largest duration a single connection may span (§3): ~9h6m.
pub const MAX_DURATION: u32 = (1 << 15) - 1;

/// The calendar date a `departure_time` (which may span past midnight)
/// actually falls on, given the date the query's base departure belongs to.
pub fn service_date(base_date: NaiveDate, departure_time: Timestamp) -> NaiveDate {
    let overflow_days = u64::from(departure_time / 86_400);
    if overflow_days == 0 {
        base_date
    } else {
        base_date
            .checked_add_days(Days::new(overflow_days))
            .unwrap_or(base_date)
    }
}
