use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{Result, ScrapeError};

/// `Fri Apr 16 2021 15:00:00 GMT+0000 (UTC)`, JavaScript's `Date.toString()`.
const JS_DATE_FORMAT: &str = "%a %b %d %Y %H:%M:%S GMT%z";
/// `04/16/2021 03:00 PM`
const CALENDAR_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Every slot start in `[open, close)` on `date`, `step_minutes` apart.
///
/// A close time earlier than the open time belongs to the next day.
pub fn generate_slots(
    date: NaiveDate,
    open: NaiveTime,
    close: NaiveTime,
    step_minutes: i64,
) -> Vec<DateTime<Utc>> {
    let start = date.and_time(open).and_utc();
    let mut end = date.and_time(close).and_utc();
    if end < start {
        end += Duration::days(1);
    }

    let step = Duration::minutes(step_minutes.max(1));
    let mut slots = Vec::new();
    let mut current = start;
    while current < end {
        slots.push(current);
        current += step;
    }
    slots
}

/// Candidates minus booked starts, ascending.
pub fn free_slots(
    candidates: impl IntoIterator<Item = DateTime<Utc>>,
    booked: &[DateTime<Utc>],
) -> Vec<DateTime<Utc>> {
    let booked: BTreeSet<_> = booked.iter().copied().collect();
    candidates
        .into_iter()
        .filter(|slot| !booked.contains(slot))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn is_on_grid(time: &DateTime<Utc>, step_minutes: i64) -> bool {
    let step = step_minutes.max(1) as u32;
    time.second() == 0 && time.nanosecond() == 0 && time.minute() % step == 0
}

/// Accepts `HH:MM`, `HH:MM:SS` or a full timestamp. A timestamp contributes
/// its wall clock time as written; the offset is dropped.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    for format in ["%H:%M:%S%.f", "%H:%M", "%I:%M %p"] {
        if let Ok(time) = NaiveTime::parse_from_str(value, format) {
            return Ok(time);
        }
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(stamp.naive_local().time());
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(stamp.time());
    }
    Err(ScrapeError::Timestamp {
        value: value.to_string(),
        format: "a time of day",
    })
}

/// Start time of a slot on `date`. An explicit offset is honoured; a bare
/// wall clock time (with or without the date) is read in `tz`.
pub fn parse_local_start(value: &str, date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(stamp.with_timezone(&Utc));
    }
    let naive = match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(stamp) => stamp,
        Err(_) => date.and_time(parse_time_of_day(value)?),
    };
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|stamp| stamp.with_timezone(&Utc))
        .ok_or_else(|| ScrapeError::Timestamp {
            value: value.to_string(),
            format: "a local time that exists in the display zone",
        })
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part which is dropped.
pub fn parse_calendar_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| ScrapeError::Timestamp {
            value: value.to_string(),
            format: "YYYY-MM-DD",
        })
}

pub fn parse_js_date(value: &str) -> Result<DateTime<Utc>> {
    // The trailing zone name in parentheses is informational only.
    let trimmed = match value.find(" (") {
        Some(idx) => &value[..idx],
        None => value,
    };
    DateTime::parse_from_str(trimmed.trim(), JS_DATE_FORMAT)
        .map(|stamp| stamp.with_timezone(&Utc))
        .map_err(|_| ScrapeError::Timestamp {
            value: value.to_string(),
            format: "a JavaScript date string",
        })
}

/// Parses `MM/DD/YYYY HH:mm A` as UTC. A 24 hour clock with a stray meridiem
/// is tolerated.
pub fn parse_calendar_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let error = || ScrapeError::Timestamp {
        value: value.to_string(),
        format: "MM/DD/YYYY HH:mm A",
    };

    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(true))
    } else if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(false))
    } else {
        (upper.as_str(), None)
    };

    let naive = NaiveDateTime::parse_from_str(clock, CALENDAR_FORMAT).map_err(|_| error())?;
    let hour = naive.hour();
    let adjusted = match meridiem {
        Some(true) if hour < 12 => naive + Duration::hours(12),
        Some(false) if hour == 12 => naive - Duration::hours(12),
        _ => naive,
    };
    Ok(adjusted.and_utc())
}
