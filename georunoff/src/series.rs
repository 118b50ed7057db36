/// Runoff series loading.
///
/// Reads per-basin runoff depth series from a long-format CSV table
/// (one row per basin per time step), e.g.
///
/// ```text
/// site_no,datetime,runoff
/// 03234300,2000-01-01,0.84
/// 03234300,2000-01-02,
/// ```
///
/// Empty or `NaN` runoff cells are missing values; they are kept as missing
/// observations rather than dropped, so the step still exists on the grid.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, Trim};
use log::debug;

use crate::config::ColumnNames;
use crate::intersections::column_index;
use crate::model::{Result, RunoffError, RunoffObservation, RunoffSeries, SeriesByBasin};

/// Naive date-time layouts accepted in addition to RFC 3339; all read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

// ============================================================================
// Parsing
// ============================================================================

/// Parses an RFC 3339 timestamp, a naive date-time (taken as UTC) or a bare
/// `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| RunoffError::InvalidTimestamp(raw.to_string()))
}

/// Parses a runoff cell. Blank and NaN cells are missing values.
fn parse_value(raw: &str, column: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| RunoffError::InvalidNumber {
            column: column.to_string(),
            value: raw.to_string(),
        })
}

// ============================================================================
// Loading
// ============================================================================

/// Reads a long-format runoff CSV into one series per basin.
pub fn load_series_csv<R: Read>(reader: R, columns: &ColumnNames) -> Result<SeriesByBasin> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let site_idx = column_index(&headers, &columns.site)?;
    let time_idx = column_index(&headers, &columns.timestamp)?;
    let value_idx = column_index(&headers, &columns.value)?;

    let mut grouped: BTreeMap<String, Vec<RunoffObservation>> = BTreeMap::new();
    for row in rdr.records() {
        let row = row?;
        let field = |idx: usize| row.get(idx).unwrap_or("");
        let timestamp = parse_timestamp(field(time_idx))?;
        let value = parse_value(field(value_idx), &columns.value)?;
        grouped
            .entry(field(site_idx).to_string())
            .or_default()
            .push(RunoffObservation::new(timestamp, value));
    }

    let series: SeriesByBasin = grouped
        .into_iter()
        .map(|(basin_id, observations)| {
            let series = RunoffSeries::new(&basin_id, observations);
            (basin_id, series)
        })
        .collect();
    debug!("loaded runoff series for {} basins", series.len());
    Ok(series)
}

/// Loads a long-format runoff CSV from disk.
pub fn load_series_file<P: AsRef<Path>>(path: P, columns: &ColumnNames) -> Result<SeriesByBasin> {
    let file = File::open(path)?;
    load_series_csv(file, columns)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_accepts_common_layouts() {
        let midnight = Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2000-01-02").unwrap(), midnight);
        assert_eq!(parse_timestamp("2000-01-02T00:00:00Z").unwrap(), midnight);
        assert_eq!(parse_timestamp("2000-01-01T18:00:00-06:00").unwrap(), midnight);
        assert_eq!(parse_timestamp("2000-01-02 00:00:00").unwrap(), midnight);
        assert_eq!(parse_timestamp("2000-01-02 00:00").unwrap(), midnight);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(parse_timestamp("not-a-date"), Err(RunoffError::InvalidTimestamp(_))));
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_load_groups_by_site_and_keeps_missing_steps() {
        let csv = "\
site_no,datetime,runoff
03234300,2000-01-02,2.0
03234300,2000-01-01,1.0
01646500,2000-01-01,NaN
03234300,2000-01-03,
";
        let series = load_series_csv(csv.as_bytes(), &ColumnNames::default()).expect("valid csv");
        assert_eq!(series.len(), 2);

        let a = &series["03234300"];
        assert_eq!(a.len(), 3, "blank value is still an observed step");
        let first = a.observations()[0];
        assert_eq!(first.value, Some(1.0), "observations are time-sorted");
        assert_eq!(a.observations()[2].value, None);

        let b = &series["01646500"];
        assert_eq!(b.observations()[0].value, None);
    }

    #[test]
    fn test_missing_value_column_is_rejected() {
        let result = load_series_csv("site_no,datetime\nA,2000-01-01\n".as_bytes(), &ColumnNames::default());
        match result {
            Err(RunoffError::MissingColumn { column }) => assert_eq!(column, "runoff"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let result = load_series_csv(
            "site_no,datetime,runoff\nA,2000-01-01,lots\n".as_bytes(),
            &ColumnNames::default(),
        );
        assert!(matches!(result, Err(RunoffError::InvalidNumber { .. })));
    }
}
