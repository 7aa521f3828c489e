//! Pagination and date-filter helpers for list endpoints.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default page size for session history.
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Maximum page size for session history.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Clamp a user-provided limit to `[1, max]`, using `default` when absent.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a 1-based page number, defaulting to the first page.
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// Row offset of the first item on `page`.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page - 1).saturating_mul(limit)
}

/// Parse a `YYYY-MM-DD` filter date.
pub fn parse_filter_date(field: &str, value: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        CoreError::Validation(format!("{field} must be a date in YYYY-MM-DD format, got '{value}'"))
    })
}

/// First instant of `date` in UTC (`00:00:00.000Z`).
pub fn start_of_day(date: NaiveDate) -> Timestamp {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Last millisecond of `date` in UTC (`23:59:59.999Z`).
pub fn end_of_day(date: NaiveDate) -> Timestamp {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(last))
}

/// Inclusive creation-time range from optional `createdFrom` / `createdTo`
/// strings. Empty strings count as absent.
pub fn created_range(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(Option<Timestamp>, Option<Timestamp>), CoreError> {
    let from = match from.filter(|s| !s.is_empty()) {
        Some(s) => Some(start_of_day(parse_filter_date("createdFrom", s)?)),
        None => None,
    };
    let to = match to.filter(|s| !s.is_empty()) {
        Some(s) => Some(end_of_day(parse_filter_date("createdTo", s)?)),
        None => None,
    };
    Ok((from, to))
}
