//! Shared helpers for range parsing and output chunking.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Split `items` into chunks of at most `per_chunk` items.
///
/// A `per_chunk` of zero yields a single chunk holding everything.
pub fn chunk_by_count<T: Clone>(items: &[T], per_chunk: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    if per_chunk == 0 {
        return vec![items.to_vec()];
    }
    items.chunks(per_chunk).map(<[T]>::to_vec).collect()
}

/// Parse a range bound given as `YYYY-MM-DD` or RFC 3339.
///
/// A bare date starts the day when `end_of_day` is false and closes it otherwise.
pub fn parse_range_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date '{value}', use YYYY-MM-DD or RFC 3339"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| anyhow!("Invalid time of day"))?;

    Ok(date.and_time(time).and_utc())
}

/// Name of a run directory, e.g. `2025-01-15_14-30-00`
#[must_use]
pub fn run_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d_%H-%M-%S").to_string()
}
