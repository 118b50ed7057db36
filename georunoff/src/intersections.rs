/// Intersection table for reporting units and gauged basins.
///
/// Holds the precomputed GIS overlay that relates each reporting unit (e.g. a
/// hydrologic catalog unit) to the drainage basins it overlaps. This is the
/// single source of truth for which basins can contribute to a unit; all
/// other modules look basins up through here rather than scanning raw rows.
///
/// The table is validated once at load time. A malformed table (missing
/// columns, fractions outside [0, 1], duplicate pairs) is rejected before any
/// aggregation runs.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use log::debug;

use crate::config::ColumnNames;
use crate::model::{IntersectionRecord, Result, RunoffError};

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Validated set of intersection records, indexed by unit.
#[derive(Debug, Clone, Default)]
pub struct IntersectionTable {
    records: Vec<IntersectionRecord>,
    /// Unit id -> indices into `records`, in input order.
    by_unit: BTreeMap<String, Vec<usize>>,
}

impl IntersectionTable {
    /// Builds a table from already-typed records.
    ///
    /// Records where both fractions are zero carry no overlap and are
    /// dropped. Out-of-range fractions and repeated unit/basin pairs are
    /// configuration errors; errors name the default column headers.
    pub fn from_records(records: Vec<IntersectionRecord>) -> Result<Self> {
        Self::from_records_with_columns(records, &ColumnNames::default())
    }

    /// Same as [`IntersectionTable::from_records`], with range errors naming
    /// the fraction columns as given in `columns`.
    pub fn from_records_with_columns(records: Vec<IntersectionRecord>, columns: &ColumnNames) -> Result<Self> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut table = IntersectionTable::default();

        for record in records {
            check_fraction(&record, &columns.prop_unit_in_basin, record.prop_unit_in_basin)?;
            check_fraction(&record, &columns.prop_basin_in_unit, record.prop_basin_in_unit)?;

            if !seen.insert((record.unit_id.clone(), record.basin_id.clone())) {
                return Err(RunoffError::DuplicateRecord {
                    unit_id: record.unit_id,
                    basin_id: record.basin_id,
                });
            }
            if !record.overlaps() {
                debug!(
                    "dropping zero-overlap record for unit {} basin {}",
                    record.unit_id, record.basin_id
                );
                continue;
            }

            let idx = table.records.len();
            table
                .by_unit
                .entry(record.unit_id.clone())
                .or_default()
                .push(idx);
            table.records.push(record);
        }

        Ok(table)
    }

    /// Reads a CSV intersection table whose header names are given by `columns`.
    ///
    /// Identifiers are kept as strings so leading zeros in site numbers and
    /// catalog codes survive.
    pub fn from_csv_reader<R: Read>(reader: R, columns: &ColumnNames) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let unit_idx = column_index(&headers, &columns.unit_id)?;
        let basin_idx = column_index(&headers, &columns.basin_id)?;
        let in_basin_idx = column_index(&headers, &columns.prop_unit_in_basin)?;
        let in_unit_idx = column_index(&headers, &columns.prop_basin_in_unit)?;

        let mut records = Vec::new();
        for row in rdr.records() {
            let row = row?;
            let field = |idx: usize| row.get(idx).unwrap_or("");
            records.push(IntersectionRecord {
                unit_id: field(unit_idx).to_string(),
                basin_id: field(basin_idx).to_string(),
                prop_unit_in_basin: parse_fraction(field(in_basin_idx), &columns.prop_unit_in_basin)?,
                prop_basin_in_unit: parse_fraction(field(in_unit_idx), &columns.prop_basin_in_unit)?,
            });
        }

        let table = Self::from_records_with_columns(records, columns)?;
        debug!(
            "loaded intersection table: {} records across {} units",
            table.len(),
            table.by_unit.len()
        );
        Ok(table)
    }

    /// Loads a CSV intersection table from disk.
    pub fn load_csv<P: AsRef<Path>>(path: P, columns: &ColumnNames) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_csv_reader(file, columns)
    }

    /// Records for one unit, in input order. Empty when the unit is unknown.
    pub fn records_for_unit(&self, unit_id: &str) -> Vec<&IntersectionRecord> {
        self.by_unit
            .get(unit_id)
            .map(|indices| indices.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Looks up the record for one unit/basin pair.
    pub fn find(&self, unit_id: &str, basin_id: &str) -> Option<&IntersectionRecord> {
        self.records_for_unit(unit_id)
            .into_iter()
            .find(|r| r.basin_id == basin_id)
    }

    /// Site Selector: all basins with a nonzero overlap against `unit_id`.
    /// A unit with no records yields an empty set. The aggregation driver
    /// draws its candidates from this set.
    pub fn select_basins(&self, unit_id: &str) -> BTreeSet<String> {
        self.records_for_unit(unit_id)
            .into_iter()
            .map(|r| r.basin_id.clone())
            .collect()
    }

    /// Unit ids present in the table, sorted.
    pub fn unit_ids(&self) -> Vec<&str> {
        self.by_unit.keys().map(String::as_str).collect()
    }

    pub fn contains_unit(&self, unit_id: &str) -> bool {
        self.by_unit.contains_key(unit_id)
    }

    pub fn records(&self) -> &[IntersectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Free-function form of [`IntersectionTable::select_basins`].
pub fn select_basins(unit_id: &str, table: &IntersectionTable) -> BTreeSet<String> {
    table.select_basins(unit_id)
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

pub(crate) fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| RunoffError::MissingColumn {
            column: name.to_string(),
        })
}

fn parse_fraction(raw: &str, column: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| RunoffError::InvalidNumber {
        column: column.to_string(),
        value: raw.to_string(),
    })
}

fn check_fraction(record: &IntersectionRecord, column: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RunoffError::FractionOutOfRange {
            unit_id: record.unit_id.clone(),
            basin_id: record.basin_id.clone(),
            column: column.to_string(),
            value,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_CSV: &str = "\
huc_id,site_no,pct_in_basin,pct_in_huc
05090201,03234300,0.99,0.985
05090201,03237020,0.12,0.40
05090202,03237020,0.30,0.55
05090202,03237280,0.00,0.00
";

    fn load(csv: &str) -> Result<IntersectionTable> {
        IntersectionTable::from_csv_reader(csv.as_bytes(), &ColumnNames::default())
    }

    #[test]
    fn test_select_basins_for_known_unit() {
        let table = load(TABLE_CSV).expect("valid table");
        let basins = table.select_basins("05090201");
        let expected: BTreeSet<String> = ["03234300", "03237020"].iter().map(|s| s.to_string()).collect();
        assert_eq!(basins, expected);
    }

    #[test]
    fn test_select_basins_for_unknown_unit_is_empty() {
        let table = load(TABLE_CSV).expect("valid table");
        assert!(select_basins("99999999", &table).is_empty());
    }

    #[test]
    fn test_zero_overlap_records_are_dropped() {
        let table = load(TABLE_CSV).expect("valid table");
        assert_eq!(table.len(), 3);
        assert!(table.find("05090202", "03237280").is_none());
    }

    #[test]
    fn test_leading_zeros_are_preserved() {
        let table = load(TABLE_CSV).expect("valid table");
        assert_eq!(table.unit_ids(), vec!["05090201", "05090202"]);
        let record = table.find("05090201", "03234300").expect("record present");
        assert_eq!(record.prop_unit_in_basin, 0.99);
    }

    #[test]
    fn test_custom_column_names() {
        let csv = "huc_cd,gauge,a,b\nX,G1,0.5,0.5\n";
        let columns = ColumnNames {
            unit_id: "huc_cd".to_string(),
            basin_id: "gauge".to_string(),
            prop_unit_in_basin: "a".to_string(),
            prop_basin_in_unit: "b".to_string(),
            ..ColumnNames::default()
        };
        let table = IntersectionTable::from_csv_reader(csv.as_bytes(), &columns).expect("valid table");
        assert!(table.contains_unit("X"));
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let result = load("huc_id,site_no,pct_in_basin\nX,G1,0.5\n");
        match result {
            Err(RunoffError::MissingColumn { column }) => assert_eq!(column, "pct_in_huc"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_fraction_above_one_is_rejected() {
        let result = load("huc_id,site_no,pct_in_basin,pct_in_huc\nX,G1,1.2,0.5\n");
        assert!(matches!(result, Err(RunoffError::FractionOutOfRange { .. })));
    }

    #[test]
    fn test_range_error_names_the_csv_header() {
        let csv = "huc_cd,gauge,a,b\nX,G1,0.5,-0.1\n";
        let columns = ColumnNames {
            unit_id: "huc_cd".to_string(),
            basin_id: "gauge".to_string(),
            prop_unit_in_basin: "a".to_string(),
            prop_basin_in_unit: "b".to_string(),
            ..ColumnNames::default()
        };
        match IntersectionTable::from_csv_reader(csv.as_bytes(), &columns) {
            Err(RunoffError::FractionOutOfRange { column, value, .. }) => {
                assert_eq!(column, "b");
                assert_eq!(value, -0.1);
            }
            other => panic!("expected FractionOutOfRange, got {:?}", other),
        }

        let default_names = load("huc_id,site_no,pct_in_basin,pct_in_huc\nX,G1,1.2,0.5\n");
        assert!(
            matches!(default_names, Err(RunoffError::FractionOutOfRange { ref column, .. }) if column == "pct_in_basin"),
            "got {:?}",
            default_names
        );
    }

    #[test]
    fn test_non_numeric_fraction_is_rejected() {
        let result = load("huc_id,site_no,pct_in_basin,pct_in_huc\nX,G1,abc,0.5\n");
        assert!(matches!(result, Err(RunoffError::InvalidNumber { .. })));
    }

    #[test]
    fn test_duplicate_pair_is_rejected() {
        let result = load("huc_id,site_no,pct_in_basin,pct_in_huc\nX,G1,0.5,0.5\nX,G1,0.4,0.4\n");
        assert!(matches!(result, Err(RunoffError::DuplicateRecord { .. })));
    }

    #[test]
    fn test_same_basin_may_intersect_many_units() {
        let table = load(TABLE_CSV).expect("valid table");
        assert!(table.find("05090201", "03237020").is_some());
        assert!(table.find("05090202", "03237020").is_some());
    }
}
