/// Datastore orchestration.
///
/// Ties the pieces together for one read: parse the identifier, validate the
/// alignment options, resolve exactly one catalog entry, fetch and align the
/// raw values, and hand metadata plus diagnostics to the caller's property
/// bag. This is the surface the host application talks to.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::align::{align_timestamp, alignment_rule, transfer_values, AlignmentDiagnostics};
use crate::catalog::CatalogEntry;
use crate::config::ServiceConfig;
use crate::ident::{
    output_identifier, validate_alignment, AlignmentOptions, LocationType, RequestedIdentifier,
};
use crate::logging::{self, LogSource};
use crate::model::{CatalogError, DataPoint, PropertySink, PropertyValue};
use crate::query::{build_values_url, CatalogQuery, CatalogQueryEngine};
use crate::requirement::RequirementCheck;
use crate::store::CatalogStore;
use crate::time::EventTime;
use crate::transport::{
    CatalogTransport, HttpCatalogTransport, HttpValueTransport, ValueTransport,
};

/// Datastore version reported to requirement checks.
pub const DATASTORE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Normalized output
// ---------------------------------------------------------------------------

/// One resolved, aligned time series.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTimeSeries {
    /// Output identifier; equals the request unless an alignment option
    /// changed the interval.
    pub identifier: String,
    /// Station name.
    pub description: String,
    /// Unit symbol.
    pub units: String,
    pub interval: String,
    /// Aligned period bounds. When data was read these cover the data
    /// actually returned; otherwise they are the aligned request bounds.
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    /// The aligned request bounds as given, kept alongside the data-derived
    /// ones. `None` when the request carried no bounds.
    pub start_original: Option<EventTime>,
    pub end_original: Option<EventTime>,
    pub points: Vec<DataPoint>,
    pub diagnostics: AlignmentDiagnostics,
}

// ---------------------------------------------------------------------------
// TimeSeriesDatastore
// ---------------------------------------------------------------------------

/// A catalog-backed datastore over injected transports.
pub struct TimeSeriesDatastore<C: CatalogTransport, V: ValueTransport> {
    name: String,
    engine: CatalogQueryEngine<C>,
    values: V,
    store: CatalogStore,
    /// Configuration properties visible to requirement checks.
    configuration: BTreeMap<String, String>,
}

impl<C: CatalogTransport, V: ValueTransport> TimeSeriesDatastore<C, V> {
    pub fn new(
        name: &str,
        service_root: &str,
        catalog_transport: C,
        value_transport: V,
    ) -> TimeSeriesDatastore<C, V> {
        let mut configuration = BTreeMap::new();
        configuration.insert("ServiceRootURI".to_string(), service_root.to_string());
        TimeSeriesDatastore {
            name: name.to_string(),
            engine: CatalogQueryEngine::new(service_root, catalog_transport),
            values: value_transport,
            store: CatalogStore::new(),
            configuration,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &CatalogQueryEngine<C> {
        &self.engine
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Catalog snapshot for discovery UIs; queries only with `force`.
    pub fn catalog(&self, force: bool) -> Arc<Vec<CatalogEntry>> {
        self.store.load(&self.engine, force)
    }

    /// Evaluates a requirement check against this datastore. A check naming
    /// a different datastore is an error rather than a silent pass.
    pub fn check_requirement(&self, check: &RequirementCheck) -> Result<bool, String> {
        if check.datastore != self.name {
            return Err(format!(
                "requirement names datastore {}, this datastore is {}",
                check.datastore, self.name
            ));
        }
        check.is_satisfied(DATASTORE_VERSION, &self.configuration)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolves a parsed identifier to exactly one catalog entry.
    ///
    /// Selects the lookup strategy from the location component, runs a fresh
    /// remote query (the cache is for discovery, not resolution), and
    /// enforces the uniqueness contract.
    pub fn resolve(&self, ident: &RequestedIdentifier) -> Result<CatalogEntry, CatalogError> {
        let query = match ident.location_type()? {
            LocationType::SeriesId(series_id) => CatalogQuery {
                series_id: Some(series_id),
                ..Default::default()
            },
            LocationType::PathParts => {
                let (station_parameter_no, short_name) = ident.split_data_type()?;
                CatalogQuery {
                    series_path: Some(format!(
                        "*/{}/{}/{}",
                        ident.location, station_parameter_no, short_name
                    )),
                    ..Default::default()
                }
            }
        };

        let mut matches = self.engine.query(&query)?;
        match matches.len() {
            0 => Err(CatalogError::NoMatchingSeries(ident.text.clone())),
            1 => Ok(matches.remove(0)),
            count => Err(CatalogError::AmbiguousSeries { tsid: ident.text.clone(), count }),
        }
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Resolves an identifier and reads its values over an optional period.
    ///
    /// Identifier and option validation happens before any remote call.
    /// With `read_data` false only metadata is resolved and the period
    /// bounds are the aligned request bounds. The property bag receives
    /// every catalog entry field plus the alignment diagnostics.
    pub fn read_time_series(
        &self,
        tsid: &str,
        read_start: Option<&EventTime>,
        read_end: Option<&EventTime>,
        read_data: bool,
        options: &AlignmentOptions,
        properties: &mut dyn PropertySink,
    ) -> Result<NormalizedTimeSeries, CatalogError> {
        let ident = RequestedIdentifier::parse(tsid)?;
        validate_alignment(&ident, options)?;
        let entry = self.resolve(&ident)?;
        logging::debug(
            LogSource::Resolver,
            Some(tsid),
            &format!("resolved to series path {}", entry.ts_path),
        );

        let identifier = output_identifier(&ident, options);
        let interval = match &options.irregular_interval {
            Some(irregular) => irregular.to_string(),
            None if options.read_24hour_as_day => "1Day".to_string(),
            None if options.read_day_as_24hour => "24Hour".to_string(),
            None => ident.interval_text.clone(),
        };
        let rule = alignment_rule(&ident.interval, options);

        let start_original = read_start.map(|t| align_timestamp(t, &rule));
        let end_original = read_end.map(|t| align_timestamp(t, &rule));
        let mut series = NormalizedTimeSeries {
            identifier,
            description: entry.station_name.clone(),
            units: entry.ts_unit_symbol.clone(),
            interval,
            start: start_original,
            end: end_original,
            start_original,
            end_original,
            points: Vec::new(),
            diagnostics: AlignmentDiagnostics::default(),
        };

        let mut values_url = None;
        if read_data {
            // No series id means the entry cannot be addressed for values.
            let series_id = entry.ts_id.ok_or_else(|| {
                CatalogError::NoMatchingSeries(format!(
                    "{} (catalog entry carries no series id)",
                    tsid
                ))
            })?;
            let url = build_values_url(self.engine.service_root(), series_id, read_start, read_end);
            logging::debug(LogSource::Values, Some(tsid), &format!("reading values from {}", url));
            let raw = self.values.fetch_values(&url)?;
            let (points, diagnostics) = transfer_values(&raw, &ident.interval, options)?;

            // start/end track the period the data actually covers; the
            // aligned request bounds stay in start_original/end_original.
            if let Some(first) = points.first() {
                series.start = Some(first.time);
            }
            if let Some(last) = points.last() {
                series.end = Some(last.time);
            }
            series.points = points;
            series.diagnostics = diagnostics;
            values_url = Some(url);
        }

        fill_entry_properties(&entry, properties);
        fill_diagnostic_properties(&series.diagnostics, values_url.as_deref(), properties);
        Ok(series)
    }
}

impl TimeSeriesDatastore<HttpCatalogTransport, HttpValueTransport> {
    /// Builds a datastore over HTTP transports from the service config,
    /// carrying the configured per-request timeout.
    pub fn from_config(
        config: &ServiceConfig,
    ) -> Result<TimeSeriesDatastore<HttpCatalogTransport, HttpValueTransport>, CatalogError> {
        let timeout = Duration::from_secs(config.service.timeout_secs);
        logging::info(
            LogSource::Config,
            None,
            &format!(
                "datastore {} using service root {} (timeout {}s)",
                config.service.name, config.service.root, config.service.timeout_secs
            ),
        );
        Ok(TimeSeriesDatastore::new(
            &config.service.name,
            &config.service.root,
            HttpCatalogTransport::with_timeout(timeout)?,
            HttpValueTransport::with_timeout(timeout)?,
        ))
    }
}

// ---------------------------------------------------------------------------
// Property bag population
// ---------------------------------------------------------------------------

/// Exposes every catalog entry field under its web service name.
pub fn fill_entry_properties(entry: &CatalogEntry, properties: &mut dyn PropertySink) {
    let int = PropertyValue::Int;
    let real = PropertyValue::Real;
    let text = |v: &str| PropertyValue::Text(v.to_string());

    if let Some(v) = entry.catchment_id {
        properties.set_property("catchment_id", int(v));
    }
    properties.set_property("catchment_name", text(&entry.catchment_name));
    properties.set_property("catchment_no", text(&entry.catchment_no));
    if let Some(v) = entry.parameter_type_id {
        properties.set_property("parametertype_id", int(v));
    }
    properties.set_property("parametertype_name", text(&entry.parameter_type_name));
    if let Some(v) = entry.site_id {
        properties.set_property("site_id", int(v));
    }
    properties.set_property("site_name", text(&entry.site_name));
    properties.set_property("site_no", text(&entry.site_no));
    if let Some(v) = entry.station_id {
        properties.set_property("station_id", int(v));
    }
    if let Some(v) = entry.station_latitude {
        properties.set_property("station_latitude", real(v));
    }
    if let Some(v) = entry.station_longitude {
        properties.set_property("station_longitude", real(v));
    }
    properties.set_property("station_longname", text(&entry.station_long_name));
    properties.set_property("station_name", text(&entry.station_name));
    properties.set_property("station_no", text(&entry.station_no));
    properties.set_property("stationparameter_longname", text(&entry.station_parameter_long_name));
    properties.set_property("stationparameter_name", text(&entry.station_parameter_name));
    properties.set_property("stationparameter_no", text(&entry.station_parameter_no));
    if let Some(v) = entry.ts_id {
        properties.set_property("ts_id", int(v));
    }
    properties.set_property("ts_name", text(&entry.ts_name));
    properties.set_property("ts_path", text(&entry.ts_path));
    properties.set_property("ts_shortname", text(&entry.ts_short_name));
    properties.set_property("ts_spacing", text(&entry.ts_spacing));
    if let Some(v) = entry.ts_type_id {
        properties.set_property("ts_type_id", int(v));
    }
    properties.set_property("ts_type_name", text(&entry.ts_type_name));
    properties.set_property("ts_unitname", text(&entry.ts_unit_name));
    properties.set_property("ts_unitname_abs", text(&entry.ts_unit_name_abs));
    properties.set_property("ts_unitsymbol", text(&entry.ts_unit_symbol));
    properties.set_property("ts_unitsymbol_abs", text(&entry.ts_unit_symbol_abs));
}

fn fill_diagnostic_properties(
    diagnostics: &AlignmentDiagnostics,
    values_url: Option<&str>,
    properties: &mut dyn PropertySink,
) {
    properties.set_property(
        "ts.TimestampsAdjustedToIntervalEndCount",
        PropertyValue::Int(diagnostics.timestamps_adjusted as i64),
    );
    properties.set_property(
        "ts.DayNonZeroHourCount",
        PropertyValue::Int(diagnostics.day_non_zero_hour as i64),
    );
    properties.set_property(
        "ts.NotInsertedCount",
        PropertyValue::Int(diagnostics.not_inserted as i64),
    );
    properties.set_property(
        "ts.SetDataValueErrorCount",
        PropertyValue::Int(diagnostics.set_value_errors as i64),
    );
    if let Some(url) = values_url {
        properties.set_property("ts.GetTimeSeriesValuesUrl", PropertyValue::Text(url.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::decode_row;
    use crate::transport::CatalogRow;

    #[test]
    fn test_fill_entry_properties_uses_service_names() {
        let row = CatalogRow {
            station_no: Some("0101".to_string()),
            station_name: Some("River at Example".to_string()),
            stationparameter_no: Some("WaterLevelRiver".to_string()),
            ts_shortname: Some("HG".to_string()),
            ts_id: Some("957010".to_string()),
            ts_spacing: Some("P1D".to_string()),
            station_latitude: Some("40.5614".to_string()),
            ..Default::default()
        };
        let entry = decode_row(&row);
        let mut bag: BTreeMap<String, PropertyValue> = BTreeMap::new();
        fill_entry_properties(&entry, &mut bag);

        assert_eq!(bag.get("station_no"), Some(&PropertyValue::Text("0101".to_string())));
        assert_eq!(bag.get("ts_id"), Some(&PropertyValue::Int(957010)));
        assert_eq!(bag.get("ts_spacing"), Some(&PropertyValue::Text("P1D".to_string())));
        assert_eq!(bag.get("station_latitude"), Some(&PropertyValue::Real(40.5614)));
        // Absent numeric fields stay out of the bag.
        assert!(!bag.contains_key("catchment_id"));
    }

    #[test]
    fn test_from_config_builds_http_datastore() {
        let config = ServiceConfig::parse(
            "[service]\nname = \"Hydro\"\nroot = \"https://example.com/kiwis?datasource=0\"\ntimeout_secs = 5\n",
        )
        .unwrap();
        let ds = TimeSeriesDatastore::from_config(&config).unwrap();
        assert_eq!(ds.name(), "Hydro");
        assert_eq!(ds.engine().service_root(), "https://example.com/kiwis?datasource=0");
    }

    #[test]
    fn test_fill_diagnostic_properties() {
        let diagnostics = AlignmentDiagnostics {
            timestamps_adjusted: 3,
            day_non_zero_hour: 1,
            not_inserted: 2,
            set_value_errors: 0,
            ..Default::default()
        };
        let mut bag: BTreeMap<String, PropertyValue> = BTreeMap::new();
        fill_diagnostic_properties(&diagnostics, Some("https://example.com/values"), &mut bag);
        assert_eq!(
            bag.get("ts.TimestampsAdjustedToIntervalEndCount"),
            Some(&PropertyValue::Int(3))
        );
        assert_eq!(bag.get("ts.DayNonZeroHourCount"), Some(&PropertyValue::Int(1)));
        assert_eq!(bag.get("ts.NotInsertedCount"), Some(&PropertyValue::Int(2)));
        assert_eq!(bag.get("ts.SetDataValueErrorCount"), Some(&PropertyValue::Int(0)));
        assert_eq!(
            bag.get("ts.GetTimeSeriesValuesUrl"),
            Some(&PropertyValue::Text("https://example.com/values".to_string()))
        );
    }
}
