/// Precision-carrying timestamps.
///
/// The source web service stamps values with full date/time strings, but the
/// normalized output may only be meaningful to day (daily series) or hour
/// (24-hour series) granularity. `EventTime` pairs a `chrono` datetime with a
/// declared precision so that formatting and comparisons reflect what the
/// timestamp actually labels. Time zone offsets in source strings are parsed
/// and then discarded; the service treats all timestamps as local times.

use std::fmt;

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Timelike};

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

/// Declared granularity of a timestamp, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

// ---------------------------------------------------------------------------
// EventTime
// ---------------------------------------------------------------------------

/// A timestamp with a declared precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventTime {
    datetime: NaiveDateTime,
    precision: TimePrecision,
}

impl EventTime {
    pub fn new(datetime: NaiveDateTime, precision: TimePrecision) -> EventTime {
        EventTime { datetime, precision }
    }

    /// Parses a source timestamp string.
    ///
    /// Accepts RFC 3339 with offset (the offset is dropped), plain
    /// date/times with `T` or space separators with optional fractional
    /// seconds, and bare dates. Bare dates get day precision; everything
    /// else gets second precision.
    pub fn parse(text: &str) -> Result<EventTime, String> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(EventTime::new(dt.naive_local(), TimePrecision::Second));
        }
        for format in [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(EventTime::new(dt, TimePrecision::Second));
            }
        }
        if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Ok(EventTime::new(
                d.and_hms_opt(0, 0, 0).expect("midnight is always valid"),
                TimePrecision::Day,
            ));
        }
        Err(format!("unrecognized timestamp \"{}\"", text))
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    pub fn precision(&self) -> TimePrecision {
        self.precision
    }

    pub fn hour(&self) -> u32 {
        self.datetime.hour()
    }

    /// Returns a copy with the given declared precision; the underlying
    /// datetime is unchanged.
    pub fn with_precision(&self, precision: TimePrecision) -> EventTime {
        EventTime::new(self.datetime, precision)
    }

    /// Shifts back one calendar day, zeroes the time of day, and declares
    /// day precision. This converts a "midnight of the following day" stamp
    /// to the day the data belongs to.
    pub fn to_previous_day(&self) -> EventTime {
        let shifted = self.datetime - Duration::days(1);
        let date = shifted.date();
        EventTime::new(
            date.and_hms_opt(0, 0, 0).expect("midnight is always valid"),
            TimePrecision::Day,
        )
    }

    /// Advances by `count` steps of the given calendar/clock unit.
    pub fn add(&self, precision: TimePrecision, count: i64) -> EventTime {
        let datetime = match precision {
            TimePrecision::Second => self.datetime + Duration::seconds(count),
            TimePrecision::Minute => self.datetime + Duration::minutes(count),
            TimePrecision::Hour => self.datetime + Duration::hours(count),
            TimePrecision::Day => self.datetime + Duration::days(count),
            TimePrecision::Month => add_months(self.datetime, count),
            TimePrecision::Year => add_months(self.datetime, count * 12),
        };
        EventTime::new(datetime, self.precision)
    }
}

fn add_months(datetime: NaiveDateTime, count: i64) -> NaiveDateTime {
    if count >= 0 {
        datetime + Months::new(count as u32)
    } else {
        datetime - Months::new((-count) as u32)
    }
}

impl fmt::Display for EventTime {
    /// Formats only the components covered by the declared precision,
    /// e.g. "2023-01-01" at day precision and "2023-01-02T00" at hour
    /// precision.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = match self.precision {
            TimePrecision::Year => "%Y",
            TimePrecision::Month => "%Y-%m",
            TimePrecision::Day => "%Y-%m-%d",
            TimePrecision::Hour => "%Y-%m-%dT%H",
            TimePrecision::Minute => "%Y-%m-%dT%H:%M",
            TimePrecision::Second => "%Y-%m-%dT%H:%M:%S",
        };
        write!(f, "{}", self.datetime.format(pattern))
    }
}

/// Formats an `EventTime` the way the values web service expects its
/// `from`/`to` query parameters: "YYYY-MM-DD hh:mm".
pub fn format_for_query(t: &EventTime) -> String {
    t.datetime().format("%Y-%m-%d %H:%M").to_string()
}
