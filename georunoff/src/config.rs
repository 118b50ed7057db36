/// Aggregation configuration and TOML loader.
///
/// Loads the knobs that control classification and output mode, plus the
/// column names used by the tabular inputs, from a TOML file such as:
///
/// ```toml
/// full_overlap_threshold = 0.98
/// clip_downstream_basins = true
/// percentage = false
/// start_date = "2000-01-01"
///
/// [columns]
/// unit_id = "huc_id"
/// basin_id = "site_no"
/// ```
///
/// Every key is optional; missing keys take the defaults below.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::model::{Result, RunoffError};

/// Default boundary for declaring a near-exact unit/basin match.
pub const DEFAULT_FULL_OVERLAP_THRESHOLD: f64 = 0.98;

// ============================================================================
// TOML Configuration Structures
// ============================================================================

/// Column names of the intersection table and the runoff series table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Reporting unit identifier in the intersection table.
    pub unit_id: String,
    /// Basin (gauge site) identifier in the intersection table.
    pub basin_id: String,
    /// Fraction of the unit's area inside the basin.
    pub prop_unit_in_basin: String,
    /// Fraction of the basin's area inside the unit.
    pub prop_basin_in_unit: String,
    /// Basin identifier in the runoff series table.
    pub site: String,
    /// Observation time in the runoff series table.
    pub timestamp: String,
    /// Runoff value in the runoff series table.
    pub value: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            unit_id: "huc_id".to_string(),
            basin_id: "site_no".to_string(),
            prop_unit_in_basin: "pct_in_basin".to_string(),
            prop_basin_in_unit: "pct_in_huc".to_string(),
            site: "site_no".to_string(),
            timestamp: "datetime".to_string(),
            value: "runoff".to_string(),
        }
    }
}

/// Parameters recognized by the aggregation driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Both overlap fractions at or above this value make a near-exact match.
    /// A single fraction at or above it makes a containing/contained basin.
    pub full_overlap_threshold: f64,
    /// Restrict containing basins to the single smallest one.
    pub clip_downstream_basins: bool,
    /// Emit the percentage of candidate weight with data instead of runoff.
    pub percentage: bool,
    /// Process units on the rayon thread pool.
    pub parallel: bool,
    /// Inclusive lower bound on the step grid (`YYYY-MM-DD`).
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on the step grid (`YYYY-MM-DD`).
    pub end_date: Option<NaiveDate>,
    pub columns: ColumnNames,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            full_overlap_threshold: DEFAULT_FULL_OVERLAP_THRESHOLD,
            clip_downstream_basins: true,
            percentage: false,
            parallel: false,
            start_date: None,
            end_date: None,
            columns: ColumnNames::default(),
        }
    }
}

impl AggregationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AggregationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make classification meaningless.
    pub fn validate(&self) -> Result<()> {
        let t = self.full_overlap_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(RunoffError::InvalidConfig(format!(
                "full_overlap_threshold must be in (0, 1], got {}",
                t
            )));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(RunoffError::InvalidConfig(format!(
                    "start_date {} is after end_date {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    /// `true` when `timestamp` falls inside the configured date window.
    /// Both bounds are inclusive whole days in UTC.
    pub fn in_window(&self, timestamp: DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load aggregation settings from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AggregationConfig> {
    let content = fs::read_to_string(path)?;
    AggregationConfig::from_toml_str(&content)
}

// ============================================================================
// Tests
// ============================================================================
