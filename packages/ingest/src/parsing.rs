//! Date, time, and coordinate parsing for incident CSV fields.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

/// Naive date-time layouts seen in police open-data exports.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Time-of-day layouts for a separate time column.
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// A parsed date cell: local wall-clock time plus the offset it carried, if
/// any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocalStamp {
    naive: NaiveDateTime,
    offset: Option<FixedOffset>,
}

fn parse_date_cell(s: &str) -> Option<LocalStamp> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(LocalStamp {
            naive: dt.naive_local(),
            offset: Some(*dt.offset()),
        });
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(LocalStamp {
                naive,
                offset: None,
            });
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(LocalStamp {
                naive: date.and_time(NaiveTime::MIN),
                offset: None,
            });
        }
    }
    None
}

/// Applies a time column to the date's midnight.
///
/// A numeric value is an hour, clamped to 0-23 and truncated. A textual
/// value is a time of day. Blank or unreadable values leave the date at
/// midnight.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn apply_time_cell(date: NaiveDate, time: &str) -> NaiveDateTime {
    let time = time.trim();
    let midnight = date.and_time(NaiveTime::MIN);

    if let Ok(hour) = time.parse::<f64>() {
        if !hour.is_finite() {
            return midnight;
        }
        let hour = hour.clamp(0.0, 23.0) as i64;
        return midnight + TimeDelta::hours(hour);
    }
    for format in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(time, format) {
            return date.and_time(t);
        }
    }
    midnight
}

/// Parses an occurrence timestamp from a date cell and an optional time
/// cell.
///
/// Offset-bearing RFC 3339 values keep their own offset; naive values are
/// interpreted at `default_offset`.
#[must_use]
pub fn parse_occurrence(
    date: &str,
    time: Option<&str>,
    default_offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let stamp = parse_date_cell(date)?;
    let naive = match time {
        Some(t) => apply_time_cell(stamp.naive.date(), t),
        None => stamp.naive,
    };
    let offset = stamp.offset.unwrap_or(default_offset);
    let local = naive.and_local_timezone(offset).single()?;
    Some(local.with_timezone(&Utc))
}

/// Parses a coordinate cell. Returns `None` if blank or unparseable.
///
/// Non-finite values such as `NaN` parse successfully and are rejected
/// later by position validation so they can be counted separately.
#[must_use]
pub fn parse_coordinate(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}
