//! Calendar-month helpers. Month keys are zero-padded `YYYY-MM` strings, so
//! lexicographic order is chronological order.

use chrono::{Datelike, NaiveDate};

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// 1-based month number for a three-letter English abbreviation.
pub fn month_from_abbrev(abbrev: &str) -> Option<u32> {
    MONTH_ABBREVIATIONS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(abbrev.trim()))
        .map(|idx| idx as u32 + 1)
}

pub fn month_abbrev(month: u32) -> &'static str {
    MONTH_ABBREVIATIONS[(month.clamp(1, 12) - 1) as usize]
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn parse_month_key(month: &str) -> Option<(i32, u32)> {
    let (y, m) = month.split_once('-')?;
    if y.len() != 4 || m.len() != 2 {
        return None;
    }
    let year = y.parse::<i32>().ok()?;
    let mm = m.parse::<u32>().ok()?;
    (1..=12).contains(&mm).then_some((year, mm))
}

pub fn prev_year_month(month: &str) -> Option<String> {
    let (year, mm) = parse_month_key(month)?;
    Some(format!("{:04}-{:02}", year - 1, mm))
}

/// First day of the month `months - 1` calendar months before `today`, so a
/// lookback of 12 covers the current month plus the eleven before it.
pub fn lookback_start(today: NaiveDate, months: u32) -> NaiveDate {
    let back = months.max(1) as i32 - 1;
    let total = today.year() * 12 + today.month0() as i32 - back;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(today)
}
