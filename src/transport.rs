/// Transports for the catalog and values web services.
///
/// The query engine and datastore only depend on the two traits defined
/// here, so tests can substitute canned responses. The HTTP implementations
/// use a blocking reqwest client with a bounded per-request timeout; a
/// timeout is reported the same way as any other transport failure.

use std::time::Duration;

use serde::Deserialize;

use crate::logging::{self, LogSource};
use crate::model::{CatalogError, RawValue};

/// Ceiling for catalog and values requests. The backing service can be slow
/// for unconstrained catalog queries.
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Decoded catalog rows
// ---------------------------------------------------------------------------

/// One flat record from the catalog list response.
///
/// The service returns every field as a JSON string (numbers included), and
/// omits fields that have no value, so everything is an `Option<String>`
/// here. Conversion to typed `CatalogEntry` fields happens in the query
/// engine.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogRow {
    pub catchment_id: Option<String>,
    pub catchment_name: Option<String>,
    pub catchment_no: Option<String>,
    pub parametertype_id: Option<String>,
    pub parametertype_name: Option<String>,
    pub site_id: Option<String>,
    pub site_name: Option<String>,
    pub site_no: Option<String>,
    pub station_id: Option<String>,
    pub station_latitude: Option<String>,
    pub station_longitude: Option<String>,
    pub station_longname: Option<String>,
    pub station_name: Option<String>,
    pub station_no: Option<String>,
    pub stationparameter_longname: Option<String>,
    pub stationparameter_name: Option<String>,
    pub stationparameter_no: Option<String>,
    pub ts_id: Option<String>,
    pub ts_name: Option<String>,
    pub ts_path: Option<String>,
    pub ts_shortname: Option<String>,
    pub ts_spacing: Option<String>,
    pub ts_type_id: Option<String>,
    pub ts_type_name: Option<String>,
    pub ts_unitname: Option<String>,
    pub ts_unitname_abs: Option<String>,
    pub ts_unitsymbol: Option<String>,
    pub ts_unitsymbol_abs: Option<String>,
}

// ---------------------------------------------------------------------------
// Transport traits
// ---------------------------------------------------------------------------

/// Fetches decoded catalog rows for a fully-formed query URL.
pub trait CatalogTransport {
    fn fetch_rows(&self, url: &str) -> Result<Vec<CatalogRow>, CatalogError>;
}

/// Fetches raw (timestamp, value, quality, interpolation) tuples for a
/// fully-formed values query URL.
pub trait ValueTransport {
    fn fetch_values(&self, url: &str) -> Result<Vec<RawValue>, CatalogError>;
}

// ---------------------------------------------------------------------------
// HTTP implementations
// ---------------------------------------------------------------------------

/// Catalog transport over HTTP, decoding the `format=objson` JSON array.
pub struct HttpCatalogTransport {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl HttpCatalogTransport {
    pub fn new() -> Result<HttpCatalogTransport, CatalogError> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<HttpCatalogTransport, CatalogError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| CatalogError::TransportFailure(format!("building HTTP client: {}", e)))?;
        Ok(HttpCatalogTransport { client, timeout })
    }
}

impl CatalogTransport for HttpCatalogTransport {
    fn fetch_rows(&self, url: &str) -> Result<Vec<CatalogRow>, CatalogError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .map_err(|e| CatalogError::TransportFailure(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CatalogError::TransportFailure(format!(
                "HTTP {} from catalog service",
                response.status().as_u16()
            )));
        }
        response
            .json::<Vec<CatalogRow>>()
            .map_err(|e| CatalogError::TransportFailure(format!("decoding catalog response: {}", e)))
    }
}

/// Values transport over HTTP, decoding the `format=csv` response.
pub struct HttpValueTransport {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl HttpValueTransport {
    pub fn new() -> Result<HttpValueTransport, CatalogError> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<HttpValueTransport, CatalogError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| CatalogError::TransportFailure(format!("building HTTP client: {}", e)))?;
        Ok(HttpValueTransport { client, timeout })
    }
}

impl ValueTransport for HttpValueTransport {
    fn fetch_values(&self, url: &str) -> Result<Vec<RawValue>, CatalogError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .map_err(|e| CatalogError::TransportFailure(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CatalogError::TransportFailure(format!(
                "HTTP {} from values service",
                response.status().as_u16()
            )));
        }
        let text = response
            .text()
            .map_err(|e| CatalogError::TransportFailure(format!("reading values response: {}", e)))?;
        Ok(parse_values_csv(&text))
    }
}

// ---------------------------------------------------------------------------
// Values CSV decoding
// ---------------------------------------------------------------------------

/// Parses the semicolon-delimited values response.
///
/// Lines starting with `#` are header comments (`#ts_id;957010`), blank
/// lines are skipped, and every data line must have exactly the four
/// requested fields. Lines with a different field count are dropped with a
/// single warning for the batch. A non-numeric interpolation field yields
/// `interpolation_code: None`, which the aligner later counts as an unknown
/// interpolation type.
pub fn parse_values_csv(text: &str) -> Vec<RawValue> {
    let mut values = Vec::new();
    let mut field_count_warned = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split(';').collect();
        if tokens.len() != 4 {
            if !field_count_warned {
                logging::warn(
                    LogSource::Values,
                    None,
                    &format!("values line has {} fields, expected 4", tokens.len()),
                );
                field_count_warned = true;
            }
            continue;
        }
        values.push(RawValue {
            timestamp: tokens[0].to_string(),
            value: tokens[1].to_string(),
            quality_code: tokens[2].to_string(),
            interpolation_code: tokens[3].trim().parse::<i32>().ok(),
        });
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values_csv_basic() {
        let text = "#ts_id;957010\n\
                    #rows;2\n\
                    #Timestamp;Value;Quality Code;Interpolation Type\n\
                    2022-12-30T18:00:00.000-07:00;84.88;200;102\n\
                    2022-12-30T19:00:00.000-07:00;85.01;200;102\n";
        let values = parse_values_csv(text);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].timestamp, "2022-12-30T18:00:00.000-07:00");
        assert_eq!(values[0].value, "84.88");
        assert_eq!(values[0].quality_code, "200");
        assert_eq!(values[0].interpolation_code, Some(102));
    }

    #[test]
    fn test_parse_values_csv_skips_blank_and_comment_lines() {
        let text = "\n   \n#comment\n2023-01-01T00:00:00;1.0;200;101\n";
        assert_eq!(parse_values_csv(text).len(), 1);
    }

    #[test]
    fn test_parse_values_csv_drops_short_lines() {
        let text = "2023-01-01T00:00:00;1.0\n2023-01-02T00:00:00;2.0;200;101\n";
        let values = parse_values_csv(text);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, "2.0");
    }

    #[test]
    fn test_parse_values_csv_non_numeric_interpolation() {
        let text = "2023-01-01T00:00:00;1.0;200;abc\n";
        let values = parse_values_csv(text);
        assert_eq!(values[0].interpolation_code, None);
    }

    #[test]
    fn test_catalog_row_decodes_partial_json() {
        let json = r#"[{"station_no":"0101","ts_id":"957010","ts_spacing":"P1D"}]"#;
        let rows: Vec<CatalogRow> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].station_no.as_deref(), Some("0101"));
        assert_eq!(rows[0].ts_id.as_deref(), Some("957010"));
        assert_eq!(rows[0].catchment_id, None);
    }
}
