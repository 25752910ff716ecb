use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::models::{BirthDate, RawDate, RawScore};

pub const MAX_AVERAGE: f64 = 20.0;

/// Serials beyond this are not plausible calendar dates.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Coerce a score cell to a number on the 0-20 scale.
///
/// Text uses a comma as the decimal separator ("12,50"); only the first
/// comma is replaced.
pub fn parse_average(score: &RawScore) -> Option<f64> {
    let value = match score {
        RawScore::Number(value) => *value,
        RawScore::Text(text) => text.trim().replacen(',', ".", 1).parse::<f64>().ok()?,
        RawScore::Missing | RawScore::Other(_) => return None,
    };

    if value.is_finite() && (0.0..=MAX_AVERAGE).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Convert a spreadsheet day count to a calendar date.
///
/// The epoch is 1899-12-30, which absorbs the spreadsheet's phantom
/// 1900-02-29 for every serial after it. A zero cell means no date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if serial == 0.0 || !serial.is_finite() || serial.abs() > MAX_EXCEL_SERIAL {
        return None;
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let offset = Duration::try_milliseconds((serial * MILLIS_PER_DAY).round() as i64)?;
    epoch.checked_add_signed(offset).map(|moment| moment.date())
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(moment) = DateTime::parse_from_rfc3339(text) {
        return Some(moment.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(moment) = NaiveDateTime::parse_from_str(text, format) {
            return Some(moment.date());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| parse_partial_date(text))
}

/// `YYYY` and `YYYY-MM` resolve to the first day of the period.
fn parse_partial_date(text: &str) -> Option<NaiveDate> {
    let (year, month) = match text.split_once('-') {
        Some((year, month)) if month.len() == 2 => (year, month.parse::<u32>().ok()?),
        Some(_) => return None,
        None => (text, 1),
    };
    if year.len() != 4 || !year.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    NaiveDate::from_ymd_opt(year.parse().ok()?, month, 1)
}

pub fn normalize_birth_date(raw: RawDate) -> BirthDate {
    let parsed = match &raw {
        RawDate::Serial(serial) => excel_serial_to_date(*serial),
        RawDate::Text(text) => parse_date_text(text),
        RawDate::Missing | RawDate::Other(_) => None,
    };

    BirthDate { raw, parsed }
}

/// `dd/mm/yyyy` when the date parsed, the stored value verbatim otherwise.
pub fn format_display_date(date: &BirthDate) -> String {
    match date.parsed {
        Some(parsed) => parsed.format("%d/%m/%Y").to_string(),
        None => date.raw.to_string(),
    }
}
