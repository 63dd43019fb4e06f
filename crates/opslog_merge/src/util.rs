//! Stateless date helpers shared by the note decoder and the normalizer.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;

use crate::conf::N_EXCEL_SERIAL_MAX;

static RE_LEADING_ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{4})-(\d{2})-(\d{2})").expect("leading ISO date regex is valid")
});

/// Text formats tried after the leading `YYYY-MM-DD` form.
const TUP_DATE_FORMATS: [&str; 6] = [
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
];

/// Parse a leading `YYYY-MM-DD` (anything may follow) into a valid calendar date.
pub fn parse_leading_iso_date(text: &str) -> Option<NaiveDate> {
    let caps = RE_LEADING_ISO_DATE.captures(text)?;
    let year = caps[1].parse::<i32>().ok()?;
    let month = caps[2].parse::<u32>().ok()?;
    let day = caps[3].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a date cell written by a human or a spreadsheet export.
///
/// Accepts the leading ISO form first, then [`TUP_DATE_FORMATS`] against the
/// whole trimmed text and against its first whitespace-separated token
/// (`1/5/2024 10:30` resolves to 2024-01-05).
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let txt = text.trim();
    if txt.is_empty() {
        return None;
    }
    if let Some(date) = parse_leading_iso_date(txt) {
        return Some(date).filter(is_four_digit_year);
    }

    let token_first = txt.split_whitespace().next().unwrap_or(txt);
    for candidate in [txt, token_first] {
        for fmt in TUP_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, fmt)
                && is_four_digit_year(&date)
            {
                return Some(date);
            }
        }
    }
    None
}

/// Convert an Excel serial day number (1900 date system) to a calendar date.
///
/// The fractional time-of-day part is dropped.
pub fn convert_excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > N_EXCEL_SERIAL_MAX {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Canonical `YYYY-MM-DD` text.
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// Canonical text must compare lexicographically in date order; `%Y` also
// accepts `01` from `01/05/24`.
fn is_four_digit_year(date: &NaiveDate) -> bool {
    (1000..=9999).contains(&date.year())
}
