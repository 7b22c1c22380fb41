//! Calendar vs fiscal year arithmetic and trend display windows

use chrono::{Datelike, NaiveDate};

use crate::store::{Settings, YearType};
use crate::util::time::{add_years, days_ago, parse_date, start_of_month, start_of_year, with_year};

/// Month and day of a fiscal boundary stored as `MM-DD` or `YYYY-MM-DD`
pub fn month_day(raw: &str) -> Option<(u32, u32)> {
    if let Some(date) = parse_date(raw) {
        return Some((date.month(), date.day()));
    }
    let (month, day) = raw.trim().split_once('-')?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    // Validate against a leap year so 02-29 is accepted
    NaiveDate::from_ymd_opt(2000, month, day)?;
    Some((month, day))
}

/// Start of the fiscal year containing `today`
pub fn fiscal_year_start(fiscal_start: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (month, day) = month_day(fiscal_start)?;
    let this_year = with_year(month, day, today.year());
    if today >= this_year {
        Some(this_year)
    } else {
        Some(with_year(month, day, today.year() - 1))
    }
}

/// First day of the scoring year containing `today`
pub fn year_start(year_type: YearType, fiscal_start: &str, today: NaiveDate) -> NaiveDate {
    match year_type {
        YearType::Fiscal => {
            fiscal_year_start(fiscal_start, today).unwrap_or_else(|| start_of_year(today))
        }
        YearType::Calendar => start_of_year(today),
    }
}

/// Shorthand for [`year_start`] from a settings snapshot
pub fn settings_year_start(settings: &Settings, today: NaiveDate) -> NaiveDate {
    year_start(settings.year_type, &settings.fiscal_year_start, today)
}

/// Start of the calendar or fiscal quarter containing `today`
pub fn quarter_start(year_type: YearType, fiscal_start: &str, today: NaiveDate) -> NaiveDate {
    if year_type == YearType::Fiscal {
        if let Some(fy_start) = fiscal_year_start(fiscal_start, today) {
            let months_since = (today.year() - fy_start.year()) * 12 + today.month() as i32
                - fy_start.month() as i32;
            let quarter = months_since / 3;
            let mut month = fy_start.month() as i32 + quarter * 3;
            let mut year = fy_start.year();
            if month > 12 {
                month -= 12;
                year += 1;
            }
            return NaiveDate::from_ymd_opt(year, month as u32, 1).unwrap_or(fy_start);
        }
    }
    let month = (today.month() - 1) / 3 * 3 + 1;
    NaiveDate::from_ymd_opt(today.year(), month, 1).unwrap_or(today)
}

/// Display window selectable on the trends chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendWindow {
    Days(i64),
    MonthToDate,
    QuarterToDate,
    YearToDate,
}

impl TrendWindow {
    /// Parse the `duration` query value; anything unknown is the 14-day window
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("7") => TrendWindow::Days(7),
            Some("mtd") => TrendWindow::MonthToDate,
            Some("qtd") => TrendWindow::QuarterToDate,
            Some("ytd") => TrendWindow::YearToDate,
            _ => TrendWindow::Days(14),
        }
    }

    pub fn start(&self, year_type: YearType, fiscal_start: &str, today: NaiveDate) -> NaiveDate {
        match *self {
            TrendWindow::Days(days) => days_ago(today, days),
            TrendWindow::MonthToDate => start_of_month(today),
            TrendWindow::QuarterToDate => quarter_start(year_type, fiscal_start, today),
            TrendWindow::YearToDate => year_start(year_type, fiscal_start, today),
        }
    }
}

/// Move full-date fiscal bounds forward by whole years until `end` is not
/// in the past. Returns the new bounds when anything changed.
pub fn roll_fiscal_year(
    start: &str,
    end: &str,
    today: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if today <= end {
        return None;
    }
    let mut years = 0;
    while add_years(end, years) < today {
        years += 1;
    }
    Some((add_years(start, years), add_years(end, years)))
}
