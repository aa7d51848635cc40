//! Time utilities: timezone lookup, lenient timestamp parsing, calendar-day math.

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::ops::RangeInclusive;
use chrono_tz::Tz;

use crate::transaction::Timestamp;

/// Zone used for calendar days when nothing else is configured
pub const DEFAULT_TZ: Tz = chrono_tz::Asia::Kolkata;

/// Formats tried for naive date-times, interpreted in the caller's zone
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Date-only formats. Slash and dash forms are day-first, as Indian statements are.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Years a feed timestamp may fall in; anything else is treated as unparseable
const PLAUSIBLE_YEARS: RangeInclusive<i32> = 1..=9999;

/// Parse an IANA timezone name like "Asia/Kolkata"
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Parse whatever date string a feed sends. Instants with an offset are kept as-is,
/// naive date-times are read as local to `tz`, bare dates stay dates.
pub fn parse_timestamp(s: &str, tz: Tz) -> Option<Timestamp> {
    parse_any(s, tz).filter(plausible)
}

fn parse_any(s: &str, tz: Tz) -> Option<Timestamp> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Timestamp::Instant(dt.with_timezone(&Utc)));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            // A skipped DST hour has no local instant; fall back to the date.
            return Some(match tz.from_local_datetime(&ndt).earliest() {
                Some(local) => Timestamp::Instant(local.with_timezone(&Utc)),
                None => Timestamp::Date(ndt.date()),
            });
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(Timestamp::Date(d));
        }
    }
    None
}

/// Interpret a numeric epoch. Values past 1e11 are taken as milliseconds.
pub fn from_epoch(value: f64) -> Option<Timestamp> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() >= 1e11 { value } else { value * 1000.0 };
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
        .map(Timestamp::Instant)
        .filter(plausible)
}

fn plausible(ts: &Timestamp) -> bool {
    let year = match ts {
        Timestamp::Date(d) => d.year(),
        Timestamp::Instant(i) => i.year(),
    };
    PLAUSIBLE_YEARS.contains(&year)
}

/// Today's calendar date in `tz`
pub fn today_in(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Whole days from `earlier` to `later`; negative when `earlier` is after `later`
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_timezone() {
        assert!(parse_timezone("Asia/Kolkata").is_ok());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_rfc3339_keeps_instant() {
        let ts = parse_timestamp("2024-01-05T10:20:30+05:30", chrono_tz::UTC).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 5, 4, 50, 30).unwrap();
        assert_eq!(ts, Timestamp::Instant(expected));
    }

    #[test]
    fn test_naive_datetime_is_local() {
        let ts = parse_timestamp("2024-01-05 01:00:00", chrono_tz::Asia::Kolkata).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 4, 19, 30, 0).unwrap();
        assert_eq!(ts, Timestamp::Instant(expected));
        assert_eq!(ts.local_date(chrono_tz::Asia::Kolkata), date(2024, 1, 5));
    }

    #[test]
    fn test_date_formats() {
        let tz = chrono_tz::UTC;
        assert_eq!(parse_timestamp("2024-01-05", tz), Some(Timestamp::Date(date(2024, 1, 5))));
        assert_eq!(parse_timestamp("05/01/2024", tz), Some(Timestamp::Date(date(2024, 1, 5))));
        assert_eq!(parse_timestamp("05-01-2024", tz), Some(Timestamp::Date(date(2024, 1, 5))));
        assert_eq!(parse_timestamp("yesterday", tz), None);
        assert_eq!(parse_timestamp("   ", tz), None);
    }

    #[test]
    fn test_out_of_range_years_rejected() {
        let tz = chrono_tz::UTC;
        assert_eq!(parse_timestamp("-262143-01-02", tz), None);
        assert_eq!(parse_timestamp("+262142-12-31", tz), None);
        assert_eq!(parse_timestamp("0000-06-01", tz), None);
        assert_eq!(from_epoch(-8.0e15), None);
        assert_eq!(parse_timestamp("9999-12-31", tz), Some(Timestamp::Date(date(9999, 12, 31))));
    }

    #[test]
    fn test_epoch_seconds_and_millis() {
        let expected = Timestamp::Instant(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
        assert_eq!(from_epoch(1_704_412_800.0), Some(expected));
        assert_eq!(from_epoch(1_704_412_800_000.0), Some(expected));
        assert_eq!(from_epoch(f64::NAN), None);
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date(2024, 1, 1), date(2024, 1, 8)), 7);
        assert_eq!(days_between(date(2024, 1, 8), date(2024, 1, 1)), -7);
    }
}
