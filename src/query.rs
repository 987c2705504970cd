/// Catalog query engine.
///
/// Builds the `getTimeseriesList` query URL from structured filter criteria,
/// decodes the response rows into typed `CatalogEntry` records, and applies
/// the interval filter locally (the backing service does not accept spacing
/// as a query parameter). Also builds the `getTimeseriesValues` URL used by
/// the datastore when reading data.

use crate::catalog::CatalogEntry;
use crate::interval::spacing_to_interval;
use crate::logging::{self, LogSource};
use crate::model::CatalogError;
use crate::time::{format_for_query, EventTime};
use crate::transport::{CatalogRow, CatalogTransport};

/// Fields requested from the catalog service. When requesting with
/// `returnfields`, all fields must be listed, not just additions beyond the
/// default set.
const RETURN_FIELDS: &str = "catchment_id,catchment_name,catchment_no,\
parametertype_id,parametertype_name,\
site_id,site_name,site_no,\
station_id,station_longitude,station_longname,station_latitude,station_name,station_no,\
stationparameter_longname,stationparameter_name,stationparameter_no,\
ts_id,ts_name,ts_path,ts_shortname,ts_spacing,ts_type_id,ts_type_name,\
ts_unitname,ts_unitsymbol,ts_unitname_abs,ts_unitsymbol_abs";

/// Remote fields that free-form filter predicates may target. A predicate on
/// any other field cannot be pushed to the service and is skipped.
const FILTERABLE_FIELDS: &[&str] = &[
    "catchment_name",
    "catchment_no",
    "site_name",
    "site_no",
    "station_name",
    "station_longname",
    "station_no",
    "stationparameter_name",
    "stationparameter_no",
    "ts_name",
    "ts_shortname",
];

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// Comparison operator of a free-form filter predicate. Only the string
/// matching operators translate to the service's wildcard syntax; the
/// relational ones exist so UI criteria can be represented faithfully even
/// when they cannot be pushed to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Matches,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

/// One (field, operator, value) filter criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl FilterPredicate {
    pub fn new(field: &str, operator: FilterOperator, value: &str) -> FilterPredicate {
        FilterPredicate {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    /// Translates the predicate to a `field=pattern` query parameter, or
    /// `None` when the field or operator has no remote equivalent.
    fn to_query_parameter(&self) -> Option<String> {
        if !FILTERABLE_FIELDS.contains(&self.field.as_str()) {
            return None;
        }
        let pattern = match self.operator {
            FilterOperator::Matches => self.value.clone(),
            FilterOperator::Contains => format!("*{}*", self.value),
            FilterOperator::StartsWith => format!("{}*", self.value),
            FilterOperator::EndsWith => format!("*{}", self.value),
            _ => return None,
        };
        Some(format!("{}={}", self.field, urlencode(&pattern)))
    }
}

// ---------------------------------------------------------------------------
// Query criteria
// ---------------------------------------------------------------------------

/// Structured criteria for one catalog query. `Default` is the unfiltered
/// "match all" query used to populate the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    /// Station parameter number; `None`, empty, or "*" means no filter.
    pub data_type: Option<String>,
    /// Interval string; applied locally after decoding, never sent remote.
    pub data_interval: Option<String>,
    pub filters: Vec<FilterPredicate>,
    /// Exact-match series id.
    pub series_id: Option<i64>,
    /// Exact-match series path; the leading segment may be a wildcard.
    pub series_path: Option<String>,
}

fn is_filtering(value: &Option<String>) -> bool {
    match value {
        None => false,
        Some(v) => !v.is_empty() && v != "*",
    }
}

// ---------------------------------------------------------------------------
// URL building
// ---------------------------------------------------------------------------

/// Builds the catalog list URL for the given criteria.
///
/// The service root is expected to already carry the common request
/// parameters (so it ends with something like "?service=...&datasource=0"),
/// matching how the datastore configuration supplies it. When no criterion
/// produced a remote parameter, a catch-all `station_no=*` is appended
/// because the service rejects fully unconstrained list requests.
pub fn build_catalog_url(service_root: &str, query: &CatalogQuery) -> String {
    let mut url = format!(
        "{}&request=getTimeseriesList&format=objson&returnfields={}",
        service_root, RETURN_FIELDS
    );
    let mut have_filter = false;

    if is_filtering(&query.data_type) {
        let data_type = query.data_type.as_deref().unwrap_or_default();
        url.push_str(&format!("&stationparameter_no={}", urlencode(data_type)));
        have_filter = true;
    }

    // The interval criterion is deliberately not pushed to the service;
    // spacing is filtered locally after rows are decoded.

    for predicate in &query.filters {
        match predicate.to_query_parameter() {
            Some(parameter) => {
                url.push('&');
                url.push_str(&parameter);
                have_filter = true;
            }
            None => {
                logging::warn(
                    LogSource::Catalog,
                    None,
                    &format!(
                        "filter {} {:?} \"{}\" cannot be applied remotely and was skipped",
                        predicate.field, predicate.operator, predicate.value
                    ),
                );
            }
        }
    }

    if let Some(series_id) = query.series_id {
        url.push_str(&format!("&ts_id={}", series_id));
        have_filter = true;
    }
    if let Some(series_path) = &query.series_path {
        url.push_str(&format!("&ts_path={}", urlencode(series_path)));
        have_filter = true;
    }

    if !have_filter {
        url.push_str("&station_no=*");
    }
    url
}

/// Builds the values URL for one series over an optional period. With no
/// bounds the complete record is requested.
pub fn build_values_url(
    service_root: &str,
    series_id: i64,
    read_start: Option<&EventTime>,
    read_end: Option<&EventTime>,
) -> String {
    let mut url = format!(
        "{}&request=getTimeseriesValues&format=csv&ts_id={}&returnfields={}",
        service_root,
        series_id,
        urlencode("Timestamp,Value,Quality Code,Interpolation Type")
    );
    if let Some(start) = read_start {
        url.push_str(&format!("&from={}", urlencode(&format_for_query(start))));
    }
    if let Some(end) = read_end {
        url.push_str(&format!("&to={}", urlencode(&format_for_query(end))));
    }
    if read_start.is_none() && read_end.is_none() {
        url.push_str("&period=complete");
    }
    url
}

/// Percent-encodes a query parameter value. Unreserved characters pass
/// through; the service's own wildcard `*` must be encoded too since it is
/// part of path values, not URL syntax.
fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'*' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

/// Wraps a composite-data-type component in single quotes when it contains a
/// hyphen or period, so the composite can be split unambiguously later.
fn quote_if_needed(component: &str) -> String {
    if component.contains('-') || component.contains('.') {
        format!("'{}'", component)
    } else {
        component.to_string()
    }
}

/// Converts one decoded row to a typed catalog entry.
///
/// The composite data type is `stationparameter_no + "-" + ts_shortname`
/// (each part quoted if needed), matching the series path components so the
/// entry can be re-resolved from its TSID. The interval is derived from the
/// spacing field.
pub fn decode_row(row: &CatalogRow) -> CatalogEntry {
    let mut entry = CatalogEntry::new();

    let station_parameter_no = row.stationparameter_no.clone().unwrap_or_default();
    let ts_short_name = row.ts_shortname.clone().unwrap_or_default();
    entry.data_type = format!(
        "{}-{}",
        quote_if_needed(&station_parameter_no),
        quote_if_needed(&ts_short_name)
    );
    entry.ts_spacing = row.ts_spacing.clone().unwrap_or_default();
    entry.data_interval = spacing_to_interval(&entry.ts_spacing);
    entry.data_units = row.ts_unitsymbol.clone().unwrap_or_default();

    entry.catchment_id = parse_i64(&row.catchment_id);
    entry.catchment_name = row.catchment_name.clone().unwrap_or_default();
    entry.catchment_no = row.catchment_no.clone().unwrap_or_default();

    entry.parameter_type_id = parse_i64(&row.parametertype_id);
    entry.parameter_type_name = row.parametertype_name.clone().unwrap_or_default();

    entry.site_id = parse_i64(&row.site_id);
    entry.site_name = row.site_name.clone().unwrap_or_default();
    entry.site_no = row.site_no.clone().unwrap_or_default();

    entry.station_id = parse_i64(&row.station_id);
    entry.station_latitude = parse_f64(&row.station_latitude);
    entry.station_longitude = parse_f64(&row.station_longitude);
    entry.station_name = row.station_name.clone().unwrap_or_default();
    entry.station_long_name = row.station_longname.clone().unwrap_or_default();
    // Also assigns loc_id.
    entry.set_station_no(row.station_no.as_deref().unwrap_or_default());

    entry.station_parameter_long_name = row.stationparameter_longname.clone().unwrap_or_default();
    entry.station_parameter_name = row.stationparameter_name.clone().unwrap_or_default();
    entry.station_parameter_no = station_parameter_no;

    entry.ts_id = parse_i64(&row.ts_id);
    entry.ts_name = row.ts_name.clone().unwrap_or_default();
    entry.ts_path = row.ts_path.clone().unwrap_or_default();
    entry.ts_short_name = ts_short_name;
    entry.ts_type_id = parse_i64(&row.ts_type_id);
    entry.ts_type_name = row.ts_type_name.clone().unwrap_or_default();
    entry.ts_unit_name = row.ts_unitname.clone().unwrap_or_default();
    entry.ts_unit_name_abs = row.ts_unitname_abs.clone().unwrap_or_default();
    entry.ts_unit_symbol = row.ts_unitsymbol.clone().unwrap_or_default();
    entry.ts_unit_symbol_abs = row.ts_unitsymbol_abs.clone().unwrap_or_default();

    entry
}

fn parse_i64(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

fn parse_f64(value: &Option<String>) -> Option<f64> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Executes catalog queries against an injected transport.
pub struct CatalogQueryEngine<T: CatalogTransport> {
    transport: T,
    service_root: String,
}

impl<T: CatalogTransport> CatalogQueryEngine<T> {
    pub fn new(service_root: &str, transport: T) -> CatalogQueryEngine<T> {
        CatalogQueryEngine {
            transport,
            service_root: service_root.to_string(),
        }
    }

    pub fn service_root(&self) -> &str {
        &self.service_root
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs one catalog query and returns the decoded entries in response
    /// order. A transport error is returned as-is so callers can tell
    /// "no matches" from "query failed"; the catalog store degrades it to an
    /// empty cache with a log entry for UI-path callers.
    pub fn query(&self, query: &CatalogQuery) -> Result<Vec<CatalogEntry>, CatalogError> {
        let url = build_catalog_url(&self.service_root, query);
        logging::debug(LogSource::Catalog, None, &format!("reading catalog from {}", url));
        let rows = self.transport.fetch_rows(&url)?;

        let mut entries: Vec<CatalogEntry> = Vec::with_capacity(rows.len());
        for row in &rows {
            let entry = decode_row(row);
            // Spacing is not a service query parameter, so the interval
            // filter has to be applied here.
            if is_filtering(&query.data_interval)
                && query.data_interval.as_deref() != Some(entry.data_interval.as_str())
            {
                continue;
            }
            entries.push(entry);
        }
        logging::debug(
            LogSource::Catalog,
            None,
            &format!("read {} catalog entries ({} rows)", entries.len(), rows.len()),
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_query_gets_catch_all_wildcard() {
        let url = build_catalog_url("https://example.com/kiwis?datasource=0", &CatalogQuery::default());
        assert!(url.ends_with("&station_no=*"));
        assert!(url.contains("&request=getTimeseriesList"));
        assert!(url.contains("&returnfields="));
    }

    #[test]
    fn test_data_type_becomes_stationparameter_filter() {
        let query = CatalogQuery {
            data_type: Some("WaterLevelRiver".to_string()),
            ..Default::default()
        };
        let url = build_catalog_url("https://example.com/kiwis?datasource=0", &query);
        assert!(url.contains("&stationparameter_no=WaterLevelRiver"));
        assert!(!url.contains("station_no=*"));
    }

    #[test]
    fn test_wildcard_data_type_is_no_filter() {
        for data_type in [None, Some(String::new()), Some("*".to_string())] {
            let query = CatalogQuery { data_type, ..Default::default() };
            let url = build_catalog_url("https://example.com/kiwis?datasource=0", &query);
            assert!(!url.contains("stationparameter_no="));
            assert!(url.contains("&station_no=*"));
        }
    }

    #[test]
    fn test_interval_is_never_a_remote_parameter() {
        let query = CatalogQuery {
            data_interval: Some("1Day".to_string()),
            ..Default::default()
        };
        let url = build_catalog_url("https://example.com/kiwis?datasource=0", &query);
        // ts_spacing appears in returnfields, so check the parameter form.
        assert!(!url.contains("&ts_spacing="));
        assert!(!url.contains("1Day"));
        // An interval-only query still needs the catch-all clause.
        assert!(url.contains("&station_no=*"));
    }

    #[test]
    fn test_series_path_is_encoded() {
        let query = CatalogQuery {
            series_path: Some("*/0101/WaterLevelRiver/HG".to_string()),
            ..Default::default()
        };
        let url = build_catalog_url("https://example.com/kiwis?datasource=0", &query);
        assert!(url.contains("&ts_path=*%2F0101%2FWaterLevelRiver%2FHG"));
        assert!(!url.contains("station_no=*"));
    }

    #[test]
    fn test_filter_predicates_translate_with_wildcards() {
        let query = CatalogQuery {
            filters: vec![
                FilterPredicate::new("station_name", FilterOperator::Contains, "River"),
                FilterPredicate::new("site_no", FilterOperator::StartsWith, "01"),
                FilterPredicate::new("catchment_no", FilterOperator::EndsWith, "9"),
                FilterPredicate::new("station_no", FilterOperator::Matches, "0101"),
            ],
            ..Default::default()
        };
        let url = build_catalog_url("https://example.com/kiwis?datasource=0", &query);
        assert!(url.contains("&station_name=*River*"));
        assert!(url.contains("&site_no=01*"));
        assert!(url.contains("&catchment_no=*9"));
        assert!(url.contains("&station_no=0101"));
    }

    #[test]
    fn test_untranslatable_predicates_are_skipped() {
        let query = CatalogQuery {
            filters: vec![
                FilterPredicate::new("station_latitude", FilterOperator::GreaterThan, "40"),
                FilterPredicate::new("not_a_field", FilterOperator::Matches, "x"),
            ],
            ..Default::default()
        };
        let url = build_catalog_url("https://example.com/kiwis?datasource=0", &query);
        assert!(!url.contains("&station_latitude="));
        assert!(!url.contains("not_a_field"));
        // Nothing translated, so the catch-all applies.
        assert!(url.contains("&station_no=*"));
    }

    #[test]
    fn test_values_url_with_period() {
        let start = EventTime::parse("2023-01-01T00:00:00").unwrap();
        let end = EventTime::parse("2023-02-01T00:00:00").unwrap();
        let url = build_values_url("https://example.com/kiwis?datasource=0", 957010, Some(&start), Some(&end));
        assert!(url.contains("&ts_id=957010"));
        assert!(url.contains("&format=csv"));
        assert!(url.contains("&from=2023-01-01%2000%3A00"));
        assert!(url.contains("&to=2023-02-01%2000%3A00"));
        assert!(!url.contains("period=complete"));
    }

    #[test]
    fn test_values_url_complete_period() {
        let url = build_values_url("https://example.com/kiwis?datasource=0", 957010, None, None);
        assert!(url.ends_with("&period=complete"));
    }

    #[test]
    fn test_decode_row_builds_composite_data_type() {
        let row = CatalogRow {
            station_no: Some("0101".to_string()),
            stationparameter_no: Some("WaterLevelRiver".to_string()),
            ts_shortname: Some("HG".to_string()),
            ts_spacing: Some("P1D".to_string()),
            ts_id: Some("957010".to_string()),
            ts_unitsymbol: Some("ft".to_string()),
            station_latitude: Some("40.5614".to_string()),
            ..Default::default()
        };
        let entry = decode_row(&row);
        assert_eq!(entry.data_type, "WaterLevelRiver-HG");
        assert_eq!(entry.data_interval, "1Day");
        assert_eq!(entry.loc_id, "0101");
        assert_eq!(entry.station_no, "0101");
        assert_eq!(entry.ts_id, Some(957010));
        assert_eq!(entry.data_units, "ft");
        assert_eq!(entry.station_latitude, Some(40.5614));
    }

    #[test]
    fn test_decode_row_quotes_components_with_separators() {
        let row = CatalogRow {
            stationparameter_no: Some("Water-Level".to_string()),
            ts_shortname: Some("H.G".to_string()),
            ..Default::default()
        };
        let entry = decode_row(&row);
        assert_eq!(entry.data_type, "'Water-Level'-'H.G'");
        // The raw fields stay unquoted.
        assert_eq!(entry.station_parameter_no, "Water-Level");
        assert_eq!(entry.ts_short_name, "H.G");
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("Timestamp,Value"), "Timestamp%2CValue");
        assert_eq!(urlencode("*/0101/x"), "*%2F0101%2Fx");
        assert_eq!(urlencode("2023-01-01 00:00"), "2023-01-01%2000%3A00");
    }
}
