/// Catalog entry model.
///
/// One `CatalogEntry` describes one queryable time series: location, data
/// type and interval, plus the site/station/parameter/series/catchment
/// metadata returned by the catalog web service. Entries also carry a
/// problem log used to annotate issues such as non-unique identifiers
/// without dropping the offending rows.

use std::fmt;

// ---------------------------------------------------------------------------
// CatalogEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogEntry {
    // General data, duplicated/derived from the web service fields.
    pub loc_id: String,
    pub data_interval: String,
    pub data_type: String,
    pub data_units: String,

    // Site data.
    pub site_id: Option<i64>,
    pub site_name: String,
    pub site_no: String,

    // Station data.
    pub station_id: Option<i64>,
    pub station_latitude: Option<f64>,
    pub station_longitude: Option<f64>,
    pub station_name: String,
    pub station_long_name: String,
    pub station_no: String,

    // Station parameter data.
    pub station_parameter_name: String,
    pub station_parameter_long_name: String,
    pub station_parameter_no: String,

    // Time series metadata.
    pub ts_id: Option<i64>,
    pub ts_name: String,
    pub ts_path: String,
    pub ts_short_name: String,
    pub ts_spacing: String,
    pub ts_type_id: Option<i64>,
    pub ts_type_name: String,
    pub ts_unit_name: String,
    pub ts_unit_name_abs: String,
    pub ts_unit_symbol: String,
    pub ts_unit_symbol_abs: String,

    // Parameter type data.
    pub parameter_type_id: Option<i64>,
    pub parameter_type_name: String,

    // Catchment data.
    pub catchment_id: Option<i64>,
    pub catchment_name: String,
    pub catchment_no: String,

    // One string per issue; None until the first problem to avoid
    // allocating for the common clean case.
    problems: Option<Vec<String>>,
}

impl CatalogEntry {
    pub fn new() -> CatalogEntry {
        CatalogEntry::default()
    }

    /// Copy constructor.
    ///
    /// With `deep_copy` the problem list is duplicated; mutating the copy's
    /// problems never affects the source. Without it the copy starts with an
    /// empty problem list, which is the mode used when synthesizing a
    /// derived entry (for example a unit/scale-adjusted variant) from an
    /// existing one.
    pub fn copy_from(source: &CatalogEntry, deep_copy: bool) -> CatalogEntry {
        let mut copy = source.clone();
        if !deep_copy {
            copy.problems = None;
        }
        copy
    }

    /// Sets the station number and, as a documented coupling, the location
    /// id to the same value. The location id is a derived alias of the
    /// station number unless explicitly overwritten afterward.
    pub fn set_station_no(&mut self, station_no: &str) {
        self.station_no = station_no.to_string();
        self.loc_id = station_no.to_string();
    }

    /// Adds a problem, lazily allocating the problem list.
    pub fn add_problem(&mut self, problem: &str) {
        self.problems
            .get_or_insert_with(Vec::new)
            .push(problem.to_string());
    }

    pub fn clear_problems(&mut self) {
        if let Some(problems) = self.problems.as_mut() {
            problems.clear();
        }
    }

    pub fn problems(&self) -> &[String] {
        self.problems.as_deref().unwrap_or(&[])
    }

    /// Formats the problems into a single "; "-joined string, empty when
    /// there are none.
    pub fn format_problems(&self) -> String {
        match &self.problems {
            None => String::new(),
            Some(problems) => problems.join("; "),
        }
    }
}

impl fmt::Display for CatalogEntry {
    /// TSID-style identification for logging: `locId..dataType.dataInterval`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}.{}", self.loc_id, self.data_type, self.data_interval)
    }
}

// ---------------------------------------------------------------------------
// Distinct-value helpers
// ---------------------------------------------------------------------------

/// Distinct data interval strings in first-seen order, e.g. "IrregSecond",
/// "15Minute". Entries with a missing interval are skipped. Membership is a
/// linear scan over the growing result, which is fine at the tens of
/// distinct values seen in practice.
pub fn distinct_data_intervals(entries: &[CatalogEntry]) -> Vec<String> {
    distinct(entries, |e| &e.data_interval)
}

/// Distinct data type strings in first-seen order, e.g. "WaterLevelRiver-HG".
pub fn distinct_data_types(entries: &[CatalogEntry]) -> Vec<String> {
    distinct(entries, |e| &e.data_type)
}

fn distinct<F>(entries: &[CatalogEntry], field: F) -> Vec<String>
where
    F: Fn(&CatalogEntry) -> &String,
{
    let mut seen: Vec<String> = Vec::new();
    for entry in entries {
        let value = field(entry);
        if value.is_empty() {
            continue;
        }
        if !seen.iter().any(|v| v == value) {
            seen.push(value.clone());
        }
    }
    seen
}

// ---------------------------------------------------------------------------
// Duplicate annotation
// ---------------------------------------------------------------------------

/// Records a problem on every entry whose `(loc_id, data_type,
/// data_interval)` key is shared with another entry. Conflicting entries are
/// kept; silently dropping them would hide the conflict from discovery UIs.
pub fn annotate_duplicates(entries: &mut [CatalogEntry]) {
    let keys: Vec<(String, String, String)> = entries
        .iter()
        .map(|e| (e.loc_id.clone(), e.data_type.clone(), e.data_interval.clone()))
        .collect();
    for (i, entry) in entries.iter_mut().enumerate() {
        let count = keys.iter().filter(|k| **k == keys[i]).count();
        if count > 1 {
            entry.add_problem(&format!(
                "Time series identifier {} is not unique ({} matching time series).",
                entry, count
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(loc: &str, data_type: &str, interval: &str) -> CatalogEntry {
        let mut e = CatalogEntry::new();
        e.set_station_no(loc);
        e.data_type = data_type.to_string();
        e.data_interval = interval.to_string();
        e
    }

    #[test]
    fn test_set_station_no_also_sets_loc_id() {
        let mut e = CatalogEntry::new();
        e.set_station_no("0101");
        assert_eq!(e.station_no, "0101");
        assert_eq!(e.loc_id, "0101");
    }

    #[test]
    fn test_problems_lazy_and_formatted() {
        let mut e = CatalogEntry::new();
        assert_eq!(e.format_problems(), "");
        assert!(e.problems().is_empty());
        e.add_problem("first issue");
        e.add_problem("second issue");
        assert_eq!(e.format_problems(), "first issue; second issue");
        e.clear_problems();
        assert_eq!(e.format_problems(), "");
    }

    #[test]
    fn test_deep_copy_isolates_problem_list() {
        let mut source = entry("0101", "WaterLevelRiver-HG", "1Day");
        source.add_problem("original problem");
        let mut copy = CatalogEntry::copy_from(&source, true);
        copy.add_problem("copy-only problem");
        assert_eq!(source.problems().len(), 1);
        assert_eq!(copy.problems().len(), 2);
    }

    #[test]
    fn test_shallow_copy_resets_problems() {
        let mut source = entry("0101", "WaterLevelRiver-HG", "1Day");
        source.add_problem("original problem");
        let copy = CatalogEntry::copy_from(&source, false);
        assert!(copy.problems().is_empty());
        assert_eq!(copy.station_no, "0101");
    }

    #[test]
    fn test_distinct_preserves_first_seen_order() {
        let entries = vec![
            entry("a", "WaterLevelRiver-HG", "15Minute"),
            entry("b", "DischargeRiver-QR", "1Hour"),
            entry("c", "WaterLevelRiver-HG", "15Minute"),
            entry("d", "PrecipIncremental-PC", "IrregSecond"),
        ];
        assert_eq!(
            distinct_data_types(&entries),
            vec!["WaterLevelRiver-HG", "DischargeRiver-QR", "PrecipIncremental-PC"]
        );
        assert_eq!(
            distinct_data_intervals(&entries),
            vec!["15Minute", "1Hour", "IrregSecond"]
        );
    }

    #[test]
    fn test_distinct_skips_missing_values() {
        let entries = vec![
            entry("a", "", "1Hour"),
            entry("b", "WaterLevelRiver-HG", ""),
        ];
        assert_eq!(distinct_data_types(&entries), vec!["WaterLevelRiver-HG"]);
        assert_eq!(distinct_data_intervals(&entries), vec!["1Hour"]);
    }

    #[test]
    fn test_annotate_duplicates_marks_each_conflict() {
        let mut entries = vec![
            entry("0101", "WaterLevelRiver-HG", "1Day"),
            entry("0101", "WaterLevelRiver-HG", "1Day"),
            entry("0202", "WaterLevelRiver-HG", "1Day"),
        ];
        annotate_duplicates(&mut entries);
        assert_eq!(entries[0].problems().len(), 1);
        assert_eq!(entries[1].problems().len(), 1);
        assert!(entries[2].problems().is_empty());
        assert!(entries[0].format_problems().contains("not unique"));
    }

    #[test]
    fn test_display_is_tsid_style() {
        let e = entry("0101", "WaterLevelRiver-HG", "1Day");
        assert_eq!(e.to_string(), "0101..WaterLevelRiver-HG.1Day");
    }
}
