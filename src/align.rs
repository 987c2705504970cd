/// Temporal alignment.
///
/// Converts source timestamps to the interval-ending convention used for
/// output. The policy is a single rule computed once per read from the
/// source interval and the alignment options, then applied uniformly to
/// period bounds and to every value timestamp, so every combination is
/// independently testable instead of living in nested branches.

use crate::ident::AlignmentOptions;
use crate::interval::{Interval, IntervalBase};
use crate::logging::{self, LogSource};
use crate::model::{CatalogError, DataPoint, InterpolationType, RawValue};
use crate::time::{EventTime, TimePrecision};

// ---------------------------------------------------------------------------
// Alignment rules
// ---------------------------------------------------------------------------

/// The per-read timestamp policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentRule {
    /// Decrement one calendar day and discard the time of day. The source
    /// stamps a day's data at the following midnight.
    pub shift_to_previous_day: bool,
    /// Force the declared output precision; `None` keeps the parsed one.
    pub force_precision: Option<TimePrecision>,
    /// Count source timestamps with a non-zero hour (native daily series
    /// that are effectively sub-daily).
    pub count_non_zero_hour: bool,
}

/// Computes the rule for a (source interval, options) combination. The
/// options are assumed validated against the interval already.
///
/// The non-zero-hour diagnostic tracks the source, not the output: every
/// native daily series counts it, whichever reinterpretation is requested.
pub fn alignment_rule(interval: &Interval, options: &AlignmentOptions) -> AlignmentRule {
    let native_daily =
        interval.base == IntervalBase::Day && interval.mult == 1 && interval.is_regular();

    if let Some(irregular) = &options.irregular_interval {
        // Precision follows the override; the day shift still applies when
        // the override granularity is itself day-level.
        let day_level = irregular.precision() == TimePrecision::Day;
        return AlignmentRule {
            shift_to_previous_day: day_level,
            force_precision: Some(irregular.precision()),
            count_non_zero_hour: native_daily,
        };
    }
    if options.read_day_as_24hour {
        // Hour-of-day is preserved from the source, only the declared
        // granularity changes.
        return AlignmentRule {
            shift_to_previous_day: false,
            force_precision: Some(TimePrecision::Hour),
            count_non_zero_hour: native_daily,
        };
    }
    if options.read_24hour_as_day {
        return AlignmentRule {
            shift_to_previous_day: true,
            force_precision: Some(TimePrecision::Day),
            count_non_zero_hour: native_daily,
        };
    }
    if native_daily {
        return AlignmentRule {
            shift_to_previous_day: true,
            force_precision: Some(TimePrecision::Day),
            count_non_zero_hour: true,
        };
    }
    AlignmentRule {
        shift_to_previous_day: false,
        force_precision: None,
        count_non_zero_hour: false,
    }
}

/// Applies the rule to one timestamp.
pub fn align_timestamp(t: &EventTime, rule: &AlignmentRule) -> EventTime {
    if rule.shift_to_previous_day {
        return t.to_previous_day();
    }
    match rule.force_precision {
        Some(precision) => t.with_precision(precision),
        None => *t,
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Counters accumulated over one value batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentDiagnostics {
    /// Interval-start timestamps shifted forward to the interval end.
    pub timestamps_adjusted: usize,
    /// Native daily timestamps with a non-zero hour of day.
    pub day_non_zero_hour: usize,
    pub bad_timestamp: usize,
    pub bad_value: usize,
    /// Missing or unrecognized interpolation type codes.
    pub bad_interpolation: usize,
    /// Values dropped because their aligned timestamp collided with the
    /// previous one.
    pub not_inserted: usize,
    /// Values that could not be stored (non-finite after parsing).
    pub set_value_errors: usize,
}

// ---------------------------------------------------------------------------
// Batch transfer
// ---------------------------------------------------------------------------

/// Converts a raw value batch to aligned data points.
///
/// Decode failures are counted per value, never aborting mid-batch; after
/// the full batch is processed, any bad timestamp, bad value, or bad
/// interpolation type fails the whole read. Colliding aligned timestamps
/// and non-finite values are diagnostics only.
pub fn transfer_values(
    raw: &[RawValue],
    source_interval: &Interval,
    options: &AlignmentOptions,
) -> Result<(Vec<DataPoint>, AlignmentDiagnostics), CatalogError> {
    let rule = alignment_rule(source_interval, options);
    let mut diagnostics = AlignmentDiagnostics::default();
    let mut points: Vec<DataPoint> = Vec::with_capacity(raw.len());

    for record in raw {
        let time = match EventTime::parse(&record.timestamp) {
            Ok(t) => t,
            Err(e) => {
                diagnostics.bad_timestamp += 1;
                logging::warn(LogSource::Values, None, &e);
                continue;
            }
        };
        let value: f64 = match record.value.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                diagnostics.bad_value += 1;
                continue;
            }
        };
        let interpolation = match record.interpolation_code {
            Some(code) => InterpolationType::from_code(code),
            None => InterpolationType::Unknown,
        };
        if interpolation == InterpolationType::Unknown {
            diagnostics.bad_interpolation += 1;
            continue;
        }

        if rule.count_non_zero_hour && time.hour() != 0 {
            diagnostics.day_non_zero_hour += 1;
        }

        // Interval-beginning stamps move forward one interval to the
        // interval-ending convention. Irregular sources have no fixed
        // spacing to shift by, so they are left as stamped.
        let time = if interpolation.timestamp_at_interval_start() && source_interval.is_regular() {
            diagnostics.timestamps_adjusted += 1;
            time.add(source_interval.precision(), i64::from(source_interval.mult))
        } else {
            time
        };

        if !value.is_finite() {
            diagnostics.set_value_errors += 1;
            continue;
        }

        let aligned = align_timestamp(&time, &rule);
        if points.last().map(|p| p.time == aligned).unwrap_or(false) {
            diagnostics.not_inserted += 1;
            continue;
        }
        points.push(DataPoint {
            time: aligned,
            value,
            flag: record.quality_code.trim().to_string(),
        });
    }

    if diagnostics.bad_timestamp > 0 || diagnostics.bad_value > 0 || diagnostics.bad_interpolation > 0
    {
        return Err(CatalogError::ValueDecodeFailure(format!(
            "{} bad timestamps, {} bad values, {} bad interpolation types in batch of {}",
            diagnostics.bad_timestamp,
            diagnostics.bad_value,
            diagnostics.bad_interpolation,
            raw.len()
        )));
    }
    Ok((points, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(timestamp: &str, value: &str, interpolation: i32) -> RawValue {
        RawValue {
            timestamp: timestamp.to_string(),
            value: value.to_string(),
            quality_code: "200".to_string(),
            interpolation_code: Some(interpolation),
        }
    }

    fn day() -> Interval {
        Interval::parse("1Day").unwrap()
    }

    fn no_options() -> AlignmentOptions {
        AlignmentOptions::default()
    }

    #[test]
    fn test_daily_default_shifts_back_one_day() {
        let (points, diagnostics) =
            transfer_values(&[raw("2023-01-02T00:00:00", "84.88", 102)], &day(), &no_options())
                .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time.to_string(), "2023-01-01");
        assert_eq!(points[0].value, 84.88);
        assert_eq!(points[0].flag, "200");
        assert_eq!(diagnostics.day_non_zero_hour, 0);
    }

    #[test]
    fn test_read_day_as_24hour_keeps_date_changes_precision() {
        let options = AlignmentOptions { read_day_as_24hour: true, ..Default::default() };
        let (points, _) =
            transfer_values(&[raw("2023-01-02T00:00:00", "84.88", 102)], &day(), &options)
                .unwrap();
        assert_eq!(points[0].time.to_string(), "2023-01-02T00");
    }

    #[test]
    fn test_read_24hour_as_day_shifts() {
        let options = AlignmentOptions { read_24hour_as_day: true, ..Default::default() };
        let interval = Interval::parse("24Hour").unwrap();
        let (points, _) =
            transfer_values(&[raw("2023-06-10T00:00:00", "1.5", 102)], &interval, &options)
                .unwrap();
        assert_eq!(points[0].time.to_string(), "2023-06-09");
    }

    #[test]
    fn test_hourly_keeps_timestamps() {
        let interval = Interval::parse("1Hour").unwrap();
        let (points, _) =
            transfer_values(&[raw("2022-12-30T18:00:00.000-07:00", "84.88", 102)], &interval, &no_options())
                .unwrap();
        assert_eq!(points[0].time.to_string(), "2022-12-30T18:00:00");
    }

    #[test]
    fn test_interval_start_stamps_shift_forward() {
        // 3xx codes stamp the interval start; output uses interval end.
        let interval = Interval::parse("1Hour").unwrap();
        let (points, diagnostics) =
            transfer_values(&[raw("2023-01-01T06:00:00", "2.0", 302)], &interval, &no_options())
                .unwrap();
        assert_eq!(points[0].time.to_string(), "2023-01-01T07:00:00");
        assert_eq!(diagnostics.timestamps_adjusted, 1);
    }

    #[test]
    fn test_interval_start_shift_uses_multiplier() {
        let interval = Interval::parse("15Minute").unwrap();
        let (points, _) =
            transfer_values(&[raw("2023-01-01T06:00:00", "2.0", 502)], &interval, &no_options())
                .unwrap();
        assert_eq!(points[0].time.to_string(), "2023-01-01T06:15:00");
    }

    #[test]
    fn test_irregular_override_day_level_shifts_and_sets_precision() {
        let options = AlignmentOptions {
            irregular_interval: Some(Interval::parse("IrregDay").unwrap()),
            ..Default::default()
        };
        let interval = Interval::parse("3Day").unwrap();
        let (points, _) =
            transfer_values(&[raw("2023-01-02T00:00:00", "1.0", 102)], &interval, &options)
                .unwrap();
        assert_eq!(points[0].time.to_string(), "2023-01-01");
    }

    #[test]
    fn test_irregular_override_sub_day_keeps_timestamp() {
        let options = AlignmentOptions {
            irregular_interval: Some(Interval::parse("IrregSecond").unwrap()),
            ..Default::default()
        };
        let (points, _) =
            transfer_values(&[raw("2023-01-02T06:30:00", "1.0", 102)], &day(), &options)
                .unwrap();
        assert_eq!(points[0].time.to_string(), "2023-01-02T06:30:00");
    }

    #[test]
    fn test_non_zero_hour_counted_not_rejected() {
        let (points, diagnostics) = transfer_values(
            &[
                raw("2023-01-02T00:00:00", "1.0", 102),
                raw("2023-01-03T06:00:00", "2.0", 102),
            ],
            &day(),
            &no_options(),
        )
        .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(diagnostics.day_non_zero_hour, 1);
    }

    #[test]
    fn test_non_zero_hour_counted_under_read_day_as_24hour() {
        let options = AlignmentOptions { read_day_as_24hour: true, ..Default::default() };
        let (_, diagnostics) =
            transfer_values(&[raw("2023-01-02T07:00:00", "1.0", 102)], &day(), &options).unwrap();
        assert_eq!(diagnostics.day_non_zero_hour, 1);
    }

    #[test]
    fn test_non_zero_hour_counted_under_irregular_override() {
        let options = AlignmentOptions {
            irregular_interval: Some(Interval::parse("IrregDay").unwrap()),
            ..Default::default()
        };
        let (_, diagnostics) =
            transfer_values(&[raw("2023-01-02T07:00:00", "1.0", 102)], &day(), &options).unwrap();
        assert_eq!(diagnostics.day_non_zero_hour, 1);
        // A non-daily source stays uncounted even with a day-level override.
        let interval = Interval::parse("3Day").unwrap();
        let (_, diagnostics) =
            transfer_values(&[raw("2023-01-02T07:00:00", "1.0", 102)], &interval, &options)
                .unwrap();
        assert_eq!(diagnostics.day_non_zero_hour, 0);
    }

    #[test]
    fn test_colliding_aligned_timestamps_counted_as_not_inserted() {
        // Two sub-daily stamps on the same day collapse to one daily point.
        let (points, diagnostics) = transfer_values(
            &[
                raw("2023-01-02T06:00:00", "1.0", 102),
                raw("2023-01-02T12:00:00", "2.0", 102),
            ],
            &day(),
            &no_options(),
        )
        .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(diagnostics.not_inserted, 1);
        assert_eq!(points[0].value, 1.0);
    }

    #[test]
    fn test_bad_timestamp_fails_the_batch() {
        let err = transfer_values(
            &[
                raw("not a date", "1.0", 102),
                raw("2023-01-02T00:00:00", "2.0", 102),
            ],
            &day(),
            &no_options(),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::ValueDecodeFailure(_)));
        assert!(err.to_string().contains("1 bad timestamps"));
    }

    #[test]
    fn test_bad_value_fails_the_batch() {
        let err = transfer_values(&[raw("2023-01-02T00:00:00", "---", 102)], &day(), &no_options())
            .unwrap_err();
        assert!(matches!(err, CatalogError::ValueDecodeFailure(_)));
    }

    #[test]
    fn test_unknown_interpolation_fails_the_batch() {
        let err = transfer_values(&[raw("2023-01-02T00:00:00", "1.0", 999)], &day(), &no_options())
            .unwrap_err();
        assert!(matches!(err, CatalogError::ValueDecodeFailure(_)));

        let missing = RawValue {
            timestamp: "2023-01-02T00:00:00".to_string(),
            value: "1.0".to_string(),
            quality_code: "200".to_string(),
            interpolation_code: None,
        };
        assert!(transfer_values(&[missing], &day(), &no_options()).is_err());
    }

    #[test]
    fn test_non_finite_value_is_diagnostic_only() {
        let (points, diagnostics) = transfer_values(
            &[
                raw("2023-01-02T00:00:00", "NaN", 102),
                raw("2023-01-03T00:00:00", "2.0", 102),
            ],
            &day(),
            &no_options(),
        )
        .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(diagnostics.set_value_errors, 1);
    }

    #[test]
    fn test_rule_table_default_sub_daily_is_identity() {
        let interval = Interval::parse("15Minute").unwrap();
        let rule = alignment_rule(&interval, &no_options());
        assert!(!rule.shift_to_previous_day);
        assert_eq!(rule.force_precision, None);
        assert!(!rule.count_non_zero_hour);
    }

    #[test]
    fn test_rule_table_native_daily() {
        let rule = alignment_rule(&day(), &no_options());
        assert!(rule.shift_to_previous_day);
        assert_eq!(rule.force_precision, Some(TimePrecision::Day));
        assert!(rule.count_non_zero_hour);
    }
}
