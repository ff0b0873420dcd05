//! # Start Time Resolution
//!
//! Producers accept a start time either as text or as a timestamp. Text is
//! read as ISO-8601; anything unreadable, or no start time at all, means
//! "now". Resolution never fails.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Layouts with a UTC offset that RFC 3339 does not cover: minute precision
/// and the basic `+hhmm` offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y%m%dT%H%M%S%z",
];

/// Naive layouts tried last, with any trailing `Z` removed.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
];

/// Start time handed to a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartTime {
    /// Free-form ISO-8601 text.
    Text(String),
    /// An already resolved timestamp.
    At(DateTime<Utc>),
}

impl StartTime {
    /// Resolve an optional start time to a concrete UTC timestamp.
    #[must_use]
    pub fn resolve(start: Option<&StartTime>) -> DateTime<Utc> {
        match start {
            Some(Self::At(at)) => *at,
            Some(Self::Text(text)) => parse_iso8601(text).unwrap_or_else(|| {
                tracing::debug!(input = %text, "unparseable start time, using current time");
                Utc::now()
            }),
            None => Utc::now(),
        }
    }
}

impl From<&str> for StartTime {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for StartTime {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<DateTime<Utc>> for StartTime {
    fn from(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }
}

/// Parse an ISO-8601 date or date-time. Times without an offset are UTC.
#[must_use]
pub fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    let naive = text.strip_suffix('Z').unwrap_or(text);
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|parsed| parsed.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid time")
    }

    #[test]
    fn parses_minute_precision_zulu() {
        assert_eq!(
            parse_iso8601("2014-11-01T10:34Z"),
            Some(utc(2014, 11, 1, 10, 34, 0))
        );
    }

    #[test]
    fn parses_offsets_into_utc() {
        assert_eq!(
            parse_iso8601("2014-11-01T12:34:00+02:00"),
            Some(utc(2014, 11, 1, 10, 34, 0))
        );
    }

    #[test]
    fn parses_minute_precision_offset() {
        assert_eq!(
            parse_iso8601("2014-11-01T10:34+02:00"),
            Some(utc(2014, 11, 1, 8, 34, 0))
        );
        assert_eq!(
            parse_iso8601("2014-11-01T10:34-0130"),
            Some(utc(2014, 11, 1, 12, 4, 0))
        );
    }

    #[test]
    fn parses_basic_offset() {
        assert_eq!(
            parse_iso8601("2014-11-01T10:34:00+0200"),
            Some(utc(2014, 11, 1, 8, 34, 0))
        );
        assert_eq!(
            parse_iso8601("20141101T103400+0000"),
            Some(utc(2014, 11, 1, 10, 34, 0))
        );
    }

    #[test]
    fn offset_start_time_is_not_replaced_by_now() {
        let resolved = StartTime::resolve(Some(&StartTime::from("2014-11-01T10:34+02:00")));
        assert_eq!(resolved, utc(2014, 11, 1, 8, 34, 0));
    }

    #[test]
    fn parses_bare_date() {
        assert_eq!(parse_iso8601("2014-11-01"), Some(utc(2014, 11, 1, 0, 0, 0)));
    }

    #[test]
    fn garbage_falls_back_to_now() {
        let before = Utc::now();
        let resolved = StartTime::resolve(Some(&StartTime::from("not a time")));
        assert!(resolved >= before);
    }

    #[test]
    fn timestamp_passes_through() {
        let at = utc(2020, 1, 2, 3, 4, 5);
        assert_eq!(StartTime::resolve(Some(&StartTime::At(at))), at);
    }
}
