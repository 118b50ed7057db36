/// Core data types for geometric runoff aggregation.
///
/// This module defines the shared domain model imported by all other modules:
/// intersection records, per-basin runoff series, aggregated output rows and
/// the crate error type. It contains no aggregation logic and no I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Intersection types
// ---------------------------------------------------------------------------

/// One row of the precomputed GIS overlay between a reporting unit and a
/// gauged drainage basin.
///
/// Both fractions lie in `[0, 1]`. A record only exists for pairs with
/// nonzero spatial overlap; nesting (many basins per unit, many units per
/// basin) is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionRecord {
    pub unit_id: String,
    pub basin_id: String,
    /// Fraction of the unit's area that lies inside the basin.
    pub prop_unit_in_basin: f64,
    /// Fraction of the basin's area that lies inside the unit.
    pub prop_basin_in_unit: f64,
}

impl IntersectionRecord {
    pub fn new(unit_id: &str, basin_id: &str, prop_unit_in_basin: f64, prop_basin_in_unit: f64) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            basin_id: basin_id.to_string(),
            prop_unit_in_basin,
            prop_basin_in_unit,
        }
    }

    /// Mutual-correspondence weight of this unit/basin pair.
    pub fn weight(&self) -> f64 {
        weight(self.prop_unit_in_basin, self.prop_basin_in_unit)
    }

    /// `true` when either fraction is nonzero.
    pub fn overlaps(&self) -> bool {
        self.prop_unit_in_basin > 0.0 || self.prop_basin_in_unit > 0.0
    }
}

/// Product of the two overlap fractions. Large only when the unit is mostly
/// covered by the basin and the basin is mostly covered by the unit.
pub fn weight(prop_unit_in_basin: f64, prop_basin_in_unit: f64) -> f64 {
    prop_unit_in_basin * prop_basin_in_unit
}

// ---------------------------------------------------------------------------
// Runoff series
// ---------------------------------------------------------------------------

/// A single runoff depth observation for a basin. `value` is `None` when the
/// gauge reported nothing usable at that time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunoffObservation {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

impl RunoffObservation {
    /// Builds an observation, folding NaN and infinities into "missing".
    pub fn new(timestamp: DateTime<Utc>, value: Option<f64>) -> Self {
        Self {
            timestamp,
            value: value.filter(|v| v.is_finite()),
        }
    }
}

/// Time-ordered runoff observations for one gauged basin, in depth per time
/// (e.g. mm/day). Supplied by the caller and read-only to the aggregation.
///
/// Observations are always sorted by time with no repeated timestamps; every
/// constructor, deserialization included, goes through [`RunoffSeries::new`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawRunoffSeries")]
pub struct RunoffSeries {
    pub basin_id: String,
    observations: Vec<RunoffObservation>,
}

/// Unvalidated wire form of [`RunoffSeries`].
#[derive(Deserialize)]
struct RawRunoffSeries {
    basin_id: String,
    observations: Vec<RunoffObservation>,
}

impl From<RawRunoffSeries> for RunoffSeries {
    fn from(raw: RawRunoffSeries) -> Self {
        RunoffSeries::new(&raw.basin_id, raw.observations)
    }
}

impl RunoffSeries {
    /// Builds a series from unordered observations. Observations are sorted by
    /// time; when a timestamp repeats, the later entry wins.
    pub fn new(basin_id: &str, observations: Vec<RunoffObservation>) -> Self {
        let mut observations: Vec<RunoffObservation> = observations
            .into_iter()
            .map(|obs| RunoffObservation::new(obs.timestamp, obs.value))
            .collect();
        // Stable sort keeps input order among equal timestamps, so the
        // retained entry after dedup is the last one supplied.
        observations.sort_by_key(|obs| obs.timestamp);
        let mut deduped: Vec<RunoffObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match deduped.last_mut() {
                Some(last) if last.timestamp == obs.timestamp => *last = obs,
                _ => deduped.push(obs),
            }
        }
        Self {
            basin_id: basin_id.to_string(),
            observations: deduped,
        }
    }

    /// Convenience constructor from `(timestamp, value)` pairs.
    pub fn from_pairs(basin_id: &str, pairs: &[(DateTime<Utc>, Option<f64>)]) -> Self {
        let observations = pairs
            .iter()
            .map(|&(timestamp, value)| RunoffObservation::new(timestamp, value))
            .collect();
        Self::new(basin_id, observations)
    }

    /// Observed value at `timestamp`, or `None` when the basin has no
    /// observation there or the observation is missing.
    pub fn value_at(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.observations
            .binary_search_by_key(&timestamp, |obs| obs.timestamp)
            .ok()
            .and_then(|idx| self.observations[idx].value)
    }

    /// Observations in ascending time order.
    pub fn observations(&self) -> &[RunoffObservation] {
        &self.observations
    }

    /// All timestamps present in the series, including those with missing values.
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.observations.iter().map(|obs| obs.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }
}

/// Runoff series keyed by basin id.
pub type SeriesByBasin = BTreeMap<String, RunoffSeries>;

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

/// One row of the tidy output table: the runoff estimate for a reporting
/// unit at one time step.
///
/// `estimated_runoff` is always populated; `estimated_percentage` is added in
/// percentage mode. A row is only emitted when at least one contributing
/// basin has data at that step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRunoff {
    pub unit_id: String,
    pub timestamp: DateTime<Utc>,
    pub estimated_runoff: Option<f64>,
    pub estimated_percentage: Option<f64>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by loading or validating inputs.
///
/// Every variant is a usage or data-assembly problem that must be fixed
/// before results can be trusted. Missing runoff data is never an error; it
/// shows up as absent output rows.
#[derive(Error, Debug)]
pub enum RunoffError {
    /// A required column is absent from a tabular input.
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    /// An overlap fraction is not a number in [0, 1].
    #[error("Overlap fraction {column}={value} out of range for unit {unit_id}, basin {basin_id}")]
    FractionOutOfRange {
        unit_id: String,
        basin_id: String,
        column: String,
        value: f64,
    },

    /// The same unit/basin pair appears more than once.
    #[error("Duplicate intersection record for unit {unit_id}, basin {basin_id}")]
    DuplicateRecord { unit_id: String, basin_id: String },

    /// A field could not be parsed as a number.
    #[error("Failed to parse {column} value '{value}'")]
    InvalidNumber { column: String, value: String },

    /// The aggregation configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown runoff frequency name.
    #[error("Invalid frequency '{0}', expected one of: annual, monthly, daily")]
    InvalidFrequency(String),

    /// A timestamp could not be parsed.
    #[error("Failed to parse timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for Results using RunoffError
pub type Result<T> = std::result::Result<T, RunoffError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
