/// Core data types for the time series catalog service.
///
/// This module defines the shared domain model imported by all other modules:
/// raw value records as returned by the values web service, processed data
/// points, the interpolation-type classification, the property bag contract,
/// and the error taxonomy for catalog resolution.

use std::collections::BTreeMap;
use std::fmt;

use crate::time::EventTime;

// ---------------------------------------------------------------------------
// Raw and processed value types
// ---------------------------------------------------------------------------

/// One raw record from the values web service, before any parsing.
///
/// Corresponds to one CSV row of the `getTimeseriesValues` response with
/// `returnfields=Timestamp,Value,Quality Code,Interpolation Type`. All fields
/// are kept as strings so that decode failures can be counted per value
/// rather than aborting the whole response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawValue {
    pub timestamp: String,
    pub value: String,
    pub quality_code: String,
    /// Numeric interpolation type code, `None` when missing or non-numeric.
    pub interpolation_code: Option<i32>,
}

/// A single processed data point with an interval-ending timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub time: EventTime,
    pub value: f64,
    /// Data flag derived from the source quality code.
    pub flag: String,
}

// ---------------------------------------------------------------------------
// Interpolation types
// ---------------------------------------------------------------------------

/// Classification of the per-value interpolation type code.
///
/// The source system stamps each value with a numeric code describing how the
/// value relates to its measurement interval. The only thing the aligner
/// needs from it is whether the timestamp labels the beginning of the
/// interval, in which case it must be shifted forward one interval to match
/// the interval-ending convention used for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationType {
    /// Instantaneous measurement, timestamp is the measurement instant (1xx).
    Instantaneous,
    /// Constant over the preceding interval, timestamp at interval end (2xx).
    ConstantPreceding,
    /// Constant over the succeeding interval, timestamp at interval start (3xx).
    ConstantSucceeding,
    /// Linear over the preceding interval, timestamp at interval end (4xx).
    LinearPreceding,
    /// Linear over the succeeding interval, timestamp at interval start (5xx).
    LinearSucceeding,
    /// Unrecognized code; values with this type fail the batch.
    Unknown,
}

impl InterpolationType {
    /// Maps a numeric interpolation type code to its classification.
    pub fn from_code(code: i32) -> InterpolationType {
        match code {
            101..=104 => InterpolationType::Instantaneous,
            201..=204 => InterpolationType::ConstantPreceding,
            301..=304 => InterpolationType::ConstantSucceeding,
            401..=404 => InterpolationType::LinearPreceding,
            501..=504 => InterpolationType::LinearSucceeding,
            _ => InterpolationType::Unknown,
        }
    }

    /// Whether the source timestamp labels the beginning of the interval.
    /// Such timestamps are shifted forward one interval by the aligner.
    pub fn timestamp_at_interval_start(&self) -> bool {
        matches!(
            self,
            InterpolationType::ConstantSucceeding | InterpolationType::LinearSucceeding
        )
    }
}

// ---------------------------------------------------------------------------
// Property bag
// ---------------------------------------------------------------------------

/// A property value exposed through the property bag.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Real(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Sink for string-keyed metadata exposed to the caller.
///
/// The resolver fills this with every catalog entry field plus the alignment
/// diagnostics counters after a read.
pub trait PropertySink {
    fn set_property(&mut self, name: &str, value: PropertyValue);
}

impl PropertySink for BTreeMap<String, PropertyValue> {
    fn set_property(&mut self, name: &str, value: PropertyValue) {
        self.insert(name.to_string(), value);
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when resolving an identifier or reading a series.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// The identifier string violates the grammar (empty interval,
    /// wrong part count, malformed data type split).
    MalformedIdentifier(String),
    /// The interval/multiplier combination cannot be resolved without an
    /// explicit irregular reinterpretation.
    UnsupportedIntervalRequest(String),
    /// An alignment option is incompatible with the source interval.
    IncompatibleAlignmentOption(String),
    /// An irregular override was requested for an already-irregular source.
    RedundantIrregularRequest(String),
    /// The catalog lookup matched no time series.
    NoMatchingSeries(String),
    /// The catalog lookup matched more than one time series.
    AmbiguousSeries { tsid: String, count: usize },
    /// Remote call error or timeout.
    TransportFailure(String),
    /// Raw values could not be parsed (bad timestamps, bad values, or
    /// unknown interpolation types anywhere in the batch).
    ValueDecodeFailure(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::MalformedIdentifier(msg) => {
                write!(f, "Malformed identifier: {}", msg)
            }
            CatalogError::UnsupportedIntervalRequest(msg) => {
                write!(f, "Unsupported interval request: {}", msg)
            }
            CatalogError::IncompatibleAlignmentOption(msg) => {
                write!(f, "Incompatible alignment option: {}", msg)
            }
            CatalogError::RedundantIrregularRequest(msg) => {
                write!(f, "Redundant irregular request: {}", msg)
            }
            CatalogError::NoMatchingSeries(tsid) => {
                write!(f, "No time series found matching {}", tsid)
            }
            CatalogError::AmbiguousSeries { tsid, count } => {
                write!(f, "Matched {} time series for {}, expecting 1", count, tsid)
            }
            CatalogError::TransportFailure(msg) => {
                write!(f, "Transport failure: {}", msg)
            }
            CatalogError::ValueDecodeFailure(msg) => {
                write!(f, "Value decode failure: {}", msg)
            }
        }
    }
}

impl std::error::Error for CatalogError {}
