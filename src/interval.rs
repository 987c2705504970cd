/// Interval grammar and spacing conversion.
///
/// Intervals follow the "1Day" / "15Minute" / "24Hour" naming convention,
/// with an "Irreg" prefix for declared-irregular intervals ("IrregDay",
/// "IrregSecond"). The catalog web service reports spacing as an ISO-8601
/// duration ("P1D", "PT15M"), which is converted to an interval string when
/// catalog rows are decoded.

use std::fmt;

use crate::time::TimePrecision;

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// Base time unit of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalBase {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl IntervalBase {
    fn name(&self) -> &'static str {
        match self {
            IntervalBase::Second => "Second",
            IntervalBase::Minute => "Minute",
            IntervalBase::Hour => "Hour",
            IntervalBase::Day => "Day",
            IntervalBase::Month => "Month",
            IntervalBase::Year => "Year",
        }
    }

    pub fn precision(&self) -> TimePrecision {
        match self {
            IntervalBase::Second => TimePrecision::Second,
            IntervalBase::Minute => TimePrecision::Minute,
            IntervalBase::Hour => TimePrecision::Hour,
            IntervalBase::Day => TimePrecision::Day,
            IntervalBase::Month => TimePrecision::Month,
            IntervalBase::Year => TimePrecision::Year,
        }
    }
}

/// A parsed interval: base unit, multiplier, and regular/irregular flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub base: IntervalBase,
    pub mult: u32,
    pub irregular: bool,
}

impl Interval {
    pub fn regular(base: IntervalBase, mult: u32) -> Interval {
        Interval { base, mult, irregular: false }
    }

    pub fn irregular(base: IntervalBase) -> Interval {
        Interval { base, mult: 1, irregular: true }
    }

    /// Parses interval strings such as "15Minute", "1Day", "24Hour",
    /// "Month", "IrregDay". Matching is case-insensitive; the multiplier
    /// defaults to 1 when absent.
    pub fn parse(text: &str) -> Result<Interval, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("interval is empty".to_string());
        }
        let (irregular, rest) = match strip_prefix_ci(text, "Irreg") {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let unit = &rest[digits.len()..];
        if irregular && !digits.is_empty() {
            // "Irreg15Minute" is not a thing; irregular intervals have no spacing.
            return Err(format!("irregular interval \"{}\" cannot have a multiplier", text));
        }
        let mult: u32 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| format!("invalid interval multiplier in \"{}\"", text))?
        };
        if mult == 0 {
            return Err(format!("interval multiplier must be positive in \"{}\"", text));
        }
        let base = match unit.to_ascii_lowercase().as_str() {
            "second" => IntervalBase::Second,
            "minute" => IntervalBase::Minute,
            "hour" => IntervalBase::Hour,
            "day" => IntervalBase::Day,
            "month" => IntervalBase::Month,
            "year" => IntervalBase::Year,
            _ => return Err(format!("unrecognized interval \"{}\"", text)),
        };
        Ok(Interval { base, mult, irregular })
    }

    pub fn is_regular(&self) -> bool {
        !self.irregular
    }

    /// Timestamp granularity implied by the interval base, used when an
    /// irregular override forces the output precision.
    pub fn precision(&self) -> TimePrecision {
        self.base.precision()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.irregular {
            write!(f, "Irreg{}", self.base.name())
        } else if matches!(self.base, IntervalBase::Month | IntervalBase::Year) && self.mult == 1 {
            write!(f, "{}", self.base.name())
        } else {
            write!(f, "{}{}", self.mult, self.base.name())
        }
    }
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Spacing conversion
// ---------------------------------------------------------------------------

/// Converts the catalog `ts_spacing` field to an interval string.
///
/// Spacing is normally an ISO-8601 duration with a single component
/// ("P1D" -> "1Day", "PT15M" -> "15Minute", "PT24H" -> "24Hour"). An empty
/// spacing means the series has no fixed spacing and is reported as
/// "IrregSecond". Strings that are already interval names pass through
/// unchanged, as does anything unrecognized (such entries simply fail to
/// match interval filters later).
pub fn spacing_to_interval(spacing: &str) -> String {
    let spacing = spacing.trim();
    if spacing.is_empty() {
        return "IrregSecond".to_string();
    }
    if let Some(interval) = parse_iso8601_spacing(spacing) {
        return interval.to_string();
    }
    spacing.to_string()
}

/// Parses a single-component ISO-8601 duration, e.g. "P1D" or "PT15M".
/// Multi-component durations ("P1DT6H") have no interval equivalent and
/// return `None`.
fn parse_iso8601_spacing(spacing: &str) -> Option<Interval> {
    let rest = spacing.strip_prefix('P')?;
    let (rest, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };
    let mut component: Option<Interval> = None;
    let mut push = |interval: Interval| -> bool {
        if component.is_some() {
            return false;
        }
        component = Some(interval);
        true
    };
    for (text, is_time) in [(rest, false), (time_part.unwrap_or(""), true)] {
        let mut digits = String::new();
        for c in text.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let mult: u32 = digits.parse().ok()?;
            digits.clear();
            let base = match (c, is_time) {
                ('Y', false) => IntervalBase::Year,
                ('M', false) => IntervalBase::Month,
                ('D', false) => IntervalBase::Day,
                ('H', true) => IntervalBase::Hour,
                ('M', true) => IntervalBase::Minute,
                ('S', true) => IntervalBase::Second,
                _ => return None,
            };
            if !push(Interval::regular(base, mult)) {
                return None;
            }
        }
        if !digits.is_empty() {
            return None;
        }
    }
    component
}
