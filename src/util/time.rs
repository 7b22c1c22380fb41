//! Time utilities

use std::time::Instant;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Current calendar date in the given timezone
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Date format used for every date column and API payload
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Leading date part of an ISO-8601 timestamp ("2024-03-09T18:22:00.000Z" -> 2024-03-09)
pub fn date_part(timestamp: &str) -> Option<NaiveDate> {
    let head: String = timestamp.trim().chars().take(10).collect();
    parse_date(&head)
}

/// Inclusive list of dates from `start` to `end`
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .collect()
}

/// Same month/day in another year; Feb 29 becomes Feb 28 outside leap years
pub fn with_year(month: u32, day: u32, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, day.saturating_sub(1)))
        .unwrap_or(NaiveDate::MIN)
}

/// Date shifted by whole years
pub fn add_years(date: NaiveDate, years: i32) -> NaiveDate {
    with_year(date.month(), date.day(), date.year() + years)
}

pub fn days_ago(today: NaiveDate, days: i64) -> NaiveDate {
    today - Duration::days(days)
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn start_of_year(date: NaiveDate) -> NaiveDate {
    with_year(1, 1, date.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_part_strips_time() {
        assert_eq!(date_part("2024-03-09T18:22:00.000Z"), Some(d(2024, 3, 9)));
        assert_eq!(date_part("2024-03-09 18:22:00"), Some(d(2024, 3, 9)));
        assert_eq!(date_part("garbage"), None);
    }

    #[test]
    fn leap_day_clamps() {
        assert_eq!(with_year(2, 29, 2023), d(2023, 2, 28));
        assert_eq!(with_year(2, 29, 2024), d(2024, 2, 29));
        assert_eq!(add_years(d(2024, 2, 29), 1), d(2025, 2, 28));
    }

    #[test]
    fn inclusive_range() {
        let days = date_range(d(2024, 12, 30), d(2025, 1, 2));
        assert_eq!(days.len(), 4);
        assert_eq!(days.last(), Some(&d(2025, 1, 2)));
        assert!(date_range(d(2025, 1, 2), d(2025, 1, 1)).is_empty());
    }
}
