//! Timezone catalogue and scheduling helpers

use chrono::{DateTime, Duration, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::warn;

/// Timezones offered in settings, with the wine regions they cover
pub const WINE_TIMEZONES: &[(&str, &str)] = &[
    ("America/Los_Angeles", "Pacific Coast (Napa, Sonoma, Oregon)"),
    ("America/Vancouver", "British Columbia Wine Region"),
    ("America/Denver", "Colorado Wine Country"),
    ("America/Chicago", "Texas Hill Country"),
    ("America/New_York", "Finger Lakes, NY"),
    ("America/Santiago", "Chilean Wine Region"),
    ("America/Argentina/Mendoza", "Mendoza Wine Country"),
    ("Europe/Paris", "French Wine Regions"),
    ("Europe/Madrid", "Spanish Wine Country"),
    ("Europe/Rome", "Italian Wine Regions"),
    ("Europe/Berlin", "German Wine Regions"),
    ("Europe/Lisbon", "Portuguese Wine Country"),
    ("Europe/Vienna", "Austrian Wine Region"),
    ("Europe/Budapest", "Hungarian Wine Region"),
    ("Australia/Adelaide", "South Australian Wine Region"),
    ("Australia/Melbourne", "Victorian Wine Region"),
    ("Australia/Sydney", "New South Wales Wine Region"),
    ("Australia/Perth", "Western Australian Wine Region"),
    ("Pacific/Auckland", "New Zealand Wine Regions"),
    ("Asia/Tokyo", "Japanese Wine Market"),
    ("Asia/Hong_Kong", "Asian Wine Hub"),
    ("Africa/Johannesburg", "South African Wine Region"),
    ("UTC", "Coordinated Universal Time"),
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimezoneOption {
    pub name: String,
    pub display: String,
}

pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

/// Render a UTC offset in seconds as `UTC+HH:MM`
pub fn format_offset(offset_secs: i32) -> String {
    let sign = if offset_secs < 0 { '-' } else { '+' };
    let abs = offset_secs.abs();
    format!("UTC{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

/// Wine-region timezones with their current UTC offsets, sorted by display name
pub fn timezones_by_region(now: DateTime<Utc>) -> Vec<TimezoneOption> {
    let mut options: Vec<TimezoneOption> = WINE_TIMEZONES
        .iter()
        .filter_map(|(name, region)| {
            let Some(tz) = parse_timezone(name) else {
                warn!(timezone = %name, "Unknown timezone, skipping");
                return None;
            };
            let offset = now.with_timezone(&tz).offset().fix().local_minus_utc();
            Some(TimezoneOption {
                name: name.to_string(),
                display: format!("{} ({})", region, format_offset(offset)),
            })
        })
        .collect();

    options.sort_by(|a, b| a.display.cmp(&b.display));
    options
}

/// Next instant strictly after `now` at which the local wall clock in `tz` reads `at`.
/// Wall times skipped by a DST jump fall through to the following day.
pub fn next_daily_run(now: DateTime<Utc>, tz: Tz, at: NaiveTime) -> DateTime<Utc> {
    let local_now = now.with_timezone(&tz);
    let mut date = local_now.date_naive();

    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
            if candidate > local_now {
                return candidate.with_timezone(&Utc);
            }
        }
        date += Duration::days(1);
    }

    now + Duration::days(1)
}
