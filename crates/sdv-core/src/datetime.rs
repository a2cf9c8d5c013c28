//! Date and timestamp normalization for EDC cell values.
//!
//! Exported cells mix ISO dates, datetimes with a `T` separator,
//! `"date, time unknown"` annotations, and the status-history log's
//! `DD-Mon-YYYY HH:MM:SS (UTC)` pairs. Per-cell parse failures are never
//! errors: a bad date reads as absent.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

static TIME_UNKNOWN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),?\s*time\s*unknown").expect("time-unknown pattern"));

/// Strips the time portion and "time unknown" annotations from a date
/// cell, leaving the bare date text.
pub fn clean_date(value: &str) -> String {
    let mut text = value.trim().to_string();
    if let Some((date, _)) = text.split_once('T') {
        text = date.to_string();
    } else if let Some((head, tail)) = text.rsplit_once(' ') {
        // "2025-02-05 12:30" - drop a trailing clock time
        if tail.contains(':') && tail.chars().any(|c| c.is_ascii_digit()) {
            text = head.to_string();
        }
    }
    TIME_UNKNOWN_RE.replace_all(&text, "").trim().to_string()
}

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d-%b-%Y", "%d/%m/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Lenient date parsing over the formats seen in exports. Returns None
/// for blanks, sentinels, and anything unparseable.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let cleaned = clean_date(value);
    let lower = cleaned.to_lowercase();
    if cleaned.is_empty() || lower == "nan" || lower == "nat" || lower == "none" {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date);
        }
    }
    None
}

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%d-%b-%Y %H:%M:%S (UTC)",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parses the status-history `Date` + `Time` pair into a sortable
/// timestamp. A missing or unparseable time degrades to midnight; an
/// unparseable date yields None (the caller drops the row).
pub fn parse_history_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = date.trim();
    let time = time.trim();
    if date.is_empty() || date.eq_ignore_ascii_case("nan") {
        return None;
    }
    if !time.is_empty() && !time.eq_ignore_ascii_case("nan") {
        let combined = format!("{date} {time}");
        for format in TIMESTAMP_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(&combined, format) {
                return Some(ts);
            }
        }
    }
    parse_date(date).map(|d| NaiveDateTime::new(d, NaiveTime::MIN))
}

/// Display form used for verification timestamps.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_date_strips_t_separator() {
        assert_eq!(clean_date("2025-03-15T10:30:00"), "2025-03-15");
    }

    #[test]
    fn clean_date_strips_time_unknown() {
        assert_eq!(clean_date("2025-03-15, time unknown"), "2025-03-15");
        assert_eq!(clean_date("2025-03-15 Time Unknown"), "2025-03-15");
    }

    #[test]
    fn clean_date_strips_trailing_clock_time() {
        assert_eq!(clean_date("2025-02-05 12:30"), "2025-02-05");
        // A plain date survives untouched
        assert_eq!(clean_date("2025-02-05"), "2025-02-05");
    }

    #[test]
    fn parse_date_handles_export_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert_eq!(parse_date("2025-03-15"), Some(expected));
        assert_eq!(parse_date("15-Mar-2025"), Some(expected));
        assert_eq!(parse_date("2025-03-15T08:00:00"), Some(expected));
        assert_eq!(parse_date("nan"), None);
        assert_eq!(parse_date("March sometime"), None);
    }

    #[test]
    fn history_timestamp_prefers_utc_format() {
        let ts = parse_history_timestamp("15-Mar-2025", "10:30:00 (UTC)").expect("parse");
        assert_eq!(format_timestamp(ts), "2025-03-15 10:30:00");
    }

    #[test]
    fn history_timestamp_degrades_to_midnight() {
        let ts = parse_history_timestamp("2025-03-15", "").expect("parse");
        assert_eq!(format_timestamp(ts), "2025-03-15 00:00:00");
        assert_eq!(parse_history_timestamp("", "10:00:00"), None);
    }
}
