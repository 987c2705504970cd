/// Identifier grammar and alignment options.
///
/// A requested identifier names one time series as
/// `location.dataType.interval.scenario`, optionally followed by
/// `~datastoreName~inputName`. The data type component is a composite
/// `stationParameterNo-seriesShortName`; components containing `-` or `.`
/// are protected with single quotes and the splitters here honor that
/// quoting. A location of the form `ts_id:NNN` selects lookup by numeric
/// series id instead of by path parts.

use crate::interval::{Interval, IntervalBase};
use crate::model::CatalogError;

// ---------------------------------------------------------------------------
// Quote-aware splitting
// ---------------------------------------------------------------------------

/// Splits on `sep`, treating single-quoted runs as opaque. Quote characters
/// are preserved in the returned parts so composites can be re-split later.
pub fn split_quoted(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in text.chars() {
        if c == '\'' {
            in_quotes = !in_quotes;
            current.push(c);
        } else if c == sep && !in_quotes {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Strips one layer of surrounding single quotes, if present.
pub fn unquote(text: &str) -> &str {
    let t = text.trim();
    if t.len() >= 2 && t.starts_with('\'') && t.ends_with('\'') {
        &t[1..t.len() - 1]
    } else {
        t
    }
}

// ---------------------------------------------------------------------------
// RequestedIdentifier
// ---------------------------------------------------------------------------

/// How the location component selects the series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationType {
    /// `ts_id:NNN` — lookup by numeric series id.
    SeriesId(i64),
    /// Plain station number — lookup by series path parts.
    PathParts,
}

/// A parsed identifier with its derived interval.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedIdentifier {
    /// The identifier string as given, for error messages and echo-back.
    pub text: String,
    pub location: String,
    /// Data source tag; reserved in this grammar and always empty, but kept
    /// so rendered identifiers keep their `loc..type.interval` shape.
    pub source: String,
    /// Composite data type, quoting preserved.
    pub data_type: String,
    pub interval_text: String,
    pub interval: Interval,
    pub scenario: String,
    pub datastore: String,
    pub input_name: Option<String>,
}

impl RequestedIdentifier {
    /// Parses `location.dataType.interval[.scenario]` with optional
    /// `~datastore~inputName` suffix. Trailing empty dot-components are
    /// tolerated; extra non-empty components, an empty location or data
    /// type, or an empty/unparsable interval are grammar violations.
    pub fn parse(text: &str) -> Result<RequestedIdentifier, CatalogError> {
        let malformed = |detail: &str| {
            CatalogError::MalformedIdentifier(format!("\"{}\" ({})", text, detail))
        };

        let mut tilde_parts = text.split('~');
        let main = tilde_parts.next().unwrap_or_default();
        let datastore = tilde_parts.next().unwrap_or_default().to_string();
        let input_name = tilde_parts.next().map(String::from);

        let parts = split_quoted(main, '.');
        if parts.len() < 3 {
            return Err(malformed("expected location.dataType.interval[.scenario]"));
        }
        for extra in parts.iter().skip(4) {
            if !extra.is_empty() {
                return Err(malformed(&format!("unexpected component \"{}\"", extra)));
            }
        }

        let location = parts[0].trim().to_string();
        if location.is_empty() {
            return Err(malformed("location is empty"));
        }
        let data_type = parts[1].trim().to_string();
        if data_type.is_empty() {
            return Err(malformed("data type is empty"));
        }
        let interval_text = parts[2].trim().to_string();
        if interval_text.is_empty() {
            // An empty interval is never valid.
            return Err(malformed("interval is empty"));
        }
        let interval = Interval::parse(&interval_text).map_err(|e| malformed(&e))?;
        let scenario = parts.get(3).map(|s| s.trim().to_string()).unwrap_or_default();

        Ok(RequestedIdentifier {
            text: text.to_string(),
            location,
            source: String::new(),
            data_type,
            interval_text,
            interval,
            scenario,
            datastore,
            input_name,
        })
    }

    /// Which catalog lookup strategy the location component selects.
    pub fn location_type(&self) -> Result<LocationType, CatalogError> {
        match self.location.strip_prefix("ts_id:") {
            Some(id_text) => {
                let id: i64 = id_text.trim().parse().map_err(|_| {
                    CatalogError::MalformedIdentifier(format!(
                        "\"{}\" (series id \"{}\" is not numeric)",
                        self.text, id_text
                    ))
                })?;
                Ok(LocationType::SeriesId(id))
            }
            None => Ok(LocationType::PathParts),
        }
    }

    /// Splits the composite data type into (station parameter number, series
    /// short name), honoring single-quote protection. Exactly two non-empty
    /// parts are required for path-based lookup.
    pub fn split_data_type(&self) -> Result<(String, String), CatalogError> {
        let parts = split_quoted(&self.data_type, '-');
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(CatalogError::MalformedIdentifier(format!(
                "\"{}\" (data type \"{}\" must be stationParameterNo-seriesShortName)",
                self.text, self.data_type
            )));
        }
        Ok((unquote(&parts[0]).to_string(), unquote(&parts[1]).to_string()))
    }
}

// ---------------------------------------------------------------------------
// AlignmentOptions
// ---------------------------------------------------------------------------

/// Per-request flags controlling how source interval/timestamp conventions
/// are reinterpreted for output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentOptions {
    /// Reinterpret the output as this irregular interval ("IrregDay" etc.).
    pub irregular_interval: Option<Interval>,
    /// Source is 24Hour; rename the output interval to 1Day and shift.
    pub read_24hour_as_day: bool,
    /// Source is 1Day; rename the output interval to 24Hour, no shift.
    pub read_day_as_24hour: bool,
}

impl AlignmentOptions {
    /// Builds options from (name, value) property pairs as supplied by
    /// read commands: `IrregularInterval`, `Read24HourAsDay`,
    /// `ReadDayAs24Hour`. Unknown names are ignored.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<AlignmentOptions, CatalogError> {
        let mut options = AlignmentOptions::default();
        for (name, value) in pairs {
            match *name {
                "IrregularInterval" => {
                    let interval = Interval::parse(value)
                        .map_err(|e| CatalogError::IncompatibleAlignmentOption(e))?;
                    if interval.is_regular() {
                        return Err(CatalogError::IncompatibleAlignmentOption(format!(
                            "IrregularInterval \"{}\" is not an irregular interval",
                            value
                        )));
                    }
                    options.irregular_interval = Some(interval);
                }
                "Read24HourAsDay" => options.read_24hour_as_day = parse_bool(name, value)?,
                "ReadDayAs24Hour" => options.read_day_as_24hour = parse_bool(name, value)?,
                _ => {}
            }
        }
        Ok(options)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, CatalogError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" | "" => Ok(false),
        _ => Err(CatalogError::IncompatibleAlignmentOption(format!(
            "{} must be True or False, not \"{}\"",
            name, value
        ))),
    }
}

// ---------------------------------------------------------------------------
// Interval policy validation
// ---------------------------------------------------------------------------

/// Validates the requested interval against the alignment options. Runs
/// before any remote call; the rules are checked in a fixed order so error
/// kinds are deterministic when several rules would fire.
pub fn validate_alignment(
    ident: &RequestedIdentifier,
    options: &AlignmentOptions,
) -> Result<(), CatalogError> {
    let interval = &ident.interval;

    if options.irregular_interval.is_some() && interval.irregular {
        return Err(CatalogError::RedundantIrregularRequest(format!(
            "\"{}\" already has irregular interval {}",
            ident.text, ident.interval_text
        )));
    }
    if interval.base == IntervalBase::Day
        && interval.is_regular()
        && interval.mult != 1
        && options.irregular_interval.is_none()
    {
        return Err(CatalogError::UnsupportedIntervalRequest(format!(
            "\"{}\" (interval {} requires an IrregularInterval reinterpretation)",
            ident.text, ident.interval_text
        )));
    }
    if options.read_day_as_24hour
        && !(interval.base == IntervalBase::Day && interval.mult == 1 && interval.is_regular())
    {
        return Err(CatalogError::IncompatibleAlignmentOption(format!(
            "\"{}\" (ReadDayAs24Hour requires interval 1Day, not {})",
            ident.text, ident.interval_text
        )));
    }
    if options.read_24hour_as_day
        && !(interval.base == IntervalBase::Hour && interval.mult == 24 && interval.is_regular())
    {
        return Err(CatalogError::IncompatibleAlignmentOption(format!(
            "\"{}\" (Read24HourAsDay requires interval 24Hour, not {})",
            ident.text, ident.interval_text
        )));
    }
    if matches!(interval.base, IntervalBase::Month | IntervalBase::Year)
        && interval.is_regular()
        && options.irregular_interval.is_none()
    {
        return Err(CatalogError::UnsupportedIntervalRequest(format!(
            "\"{}\" (interval {} requires an IrregularInterval reinterpretation)",
            ident.text, ident.interval_text
        )));
    }
    Ok(())
}

/// The identifier string for the output series. Equal to the input unless an
/// alignment option changes the interval, in which case the interval
/// component is overwritten with the effective one.
pub fn output_identifier(ident: &RequestedIdentifier, options: &AlignmentOptions) -> String {
    let new_interval = if let Some(irregular) = &options.irregular_interval {
        irregular.to_string()
    } else if options.read_24hour_as_day {
        "1Day".to_string()
    } else if options.read_day_as_24hour {
        "24Hour".to_string()
    } else {
        return ident.text.clone();
    };

    let mut out = format!(
        "{}.{}.{}.{}",
        ident.location, ident.data_type, new_interval, ident.scenario
    );
    if !ident.datastore.is_empty() {
        out.push('~');
        out.push_str(&ident.datastore);
    }
    if let Some(input_name) = &ident.input_name {
        out.push('~');
        out.push_str(input_name);
    }
    out
}
