use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::{clean_str, Scalar};

/// Formats tried against the whole string, in order. US month-first comes
/// before day-first so `03/04/2024` reads as March 4th, the way browsers do.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

static YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").expect("year-month regex"));
static MONTH_NAME_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]{3,9})\.?[ -](\d{4})$").expect("month-year regex"));

/// Excel serial days in this window are accepted from numeric cells of a
/// date column (roughly 1954–2119).
const SERIAL_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=80_000.0;

/// Parse a free-form date string. Time components are dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = clean_str(raw);
    if s.is_empty() {
        return None;
    }

    if let Some(d) = parse_iso_prefix(&s) {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return Some(d);
        }
    }

    if let Some(caps) = YEAR_MONTH.captures(&s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if let Some(caps) = MONTH_NAME_YEAR.captures(&s) {
        let padded = format!("1 {} {}", &caps[1], &caps[2]);
        return NaiveDate::parse_from_str(&padded, "%d %B %Y")
            .or_else(|_| NaiveDate::parse_from_str(&padded, "%d %b %Y"))
            .ok();
    }

    parse_compact(&s)
}

/// Date from a decoded cell: text goes through [`parse_date`], numbers are
/// read as `YYYYMMDD` or an Excel serial day.
pub fn parse_scalar_date(cell: &Scalar) -> Option<NaiveDate> {
    match cell {
        Scalar::Text(s) => parse_date(s),
        Scalar::Number(n) if n.fract() == 0.0 && (19_000_101.0..=21_001_231.0).contains(n) => {
            parse_compact(&format!("{}", *n as i64))
        }
        Scalar::Number(n) if SERIAL_RANGE.contains(n) => excel_serial_to_date(*n),
        _ => None,
    }
}

/// Excel's 1900 date system, counted from 1899-12-30 so that the phantom
/// 1900-02-29 lines up for every date after March 1900.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Fast path for `YYYY-MM-DD...` and `YYYY/MM/DD...` with anything after the
/// day (time, offset) ignored.
fn parse_iso_prefix(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    if b.len() < 10 || !(b[4] == b'-' || b[4] == b'/') || b[7] != b[4] {
        return None;
    }
    if b.len() > 10 && !(b[10] == b'T' || b[10] == b' ') {
        return None;
    }
    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(5..7)?.parse().ok()?;
    let day: u32 = s.get(8..10)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Contiguous `YYYYMMDD`.
fn parse_compact(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (y, m, d) = (
        s[0..4].parse::<i32>().ok()?,
        s[4..6].parse::<u32>().ok()?,
        s[6..8].parse::<u32>().ok()?,
    );
    if !(1900..=2100).contains(&y) {
        return None;
    }
    NaiveDate::from_ymd_opt(y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_iso_and_datetimes() {
        assert_eq!(parse_date("2024-01-15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024/01/15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T10:30:00Z"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15 08:00:00"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("\"2024-01-15\""), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn slash_dates_prefer_month_first() {
        assert_eq!(parse_date("03/04/2024"), Some(ymd(2024, 3, 4)));
        assert_eq!(parse_date("13/04/2024"), Some(ymd(2024, 4, 13)));
        assert_eq!(parse_date("15-04-2024"), Some(ymd(2024, 4, 15)));
    }

    #[test]
    fn parses_month_only_and_names() {
        assert_eq!(parse_date("2024-03"), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date("Mar 2024"), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date("March 2024"), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date("5 Mar 2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("Mar 5, 2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("20240305"), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("Paracetamol"), None);
    }

    #[test]
    fn numeric_cells() {
        assert_eq!(
            parse_scalar_date(&Scalar::Number(45306.0)),
            Some(ymd(2024, 1, 15))
        );
        assert_eq!(
            parse_scalar_date(&Scalar::Number(20240115.0)),
            Some(ymd(2024, 1, 15))
        );
        assert_eq!(parse_scalar_date(&Scalar::Number(12.0)), None);
        assert_eq!(parse_scalar_date(&Scalar::Empty), None);
    }
}
