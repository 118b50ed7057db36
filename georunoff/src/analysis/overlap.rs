//! Overlap classification and downstream resolution.
//!
//! Decides, once per reporting unit and independently of time, which basins
//! take part in the unit's runoff estimate and with what weight:
//!
//! - a near-exact match (both fractions at or above the threshold) wins
//!   outright and is the only contributor;
//! - otherwise every basin contained by the unit contributes, together with
//!   either the smallest containing basin or all containing basins,
//!   depending on `clip_downstream_basins`;
//! - weak partial overlaps never contribute.
//!
//! Ties are broken deterministically: highest weight first, then lowest
//! basin id. Input order never matters.

use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::IntersectionRecord;

// ---------------------------------------------------------------------------
// Per-record classification
// ---------------------------------------------------------------------------

/// How one basin relates to one reporting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapClass {
    /// Unit and basin are nearly the same area.
    NearExact,
    /// Basin lies almost entirely inside the unit (a tributary sub-area).
    ContainedByUnit,
    /// Unit lies almost entirely inside the basin (a downstream basin).
    ContainingUnit,
    /// Partial overlap in both directions.
    Irrelevant,
}

/// Classifies a single record against the full-overlap threshold.
pub fn classify_record(record: &IntersectionRecord, threshold: f64) -> OverlapClass {
    let unit_in_basin = record.prop_unit_in_basin >= threshold;
    let basin_in_unit = record.prop_basin_in_unit >= threshold;
    match (unit_in_basin, basin_in_unit) {
        (true, true) => OverlapClass::NearExact,
        (false, true) => OverlapClass::ContainedByUnit,
        (true, false) => OverlapClass::ContainingUnit,
        (false, false) => OverlapClass::Irrelevant,
    }
}

// ---------------------------------------------------------------------------
// Per-unit classification
// ---------------------------------------------------------------------------

/// Classified candidate basins for one unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification {
    pub unit_id: String,
    pub near_exact: Vec<IntersectionRecord>,
    pub contained: Vec<IntersectionRecord>,
    pub containing: Vec<IntersectionRecord>,
    pub excluded: Vec<IntersectionRecord>,
}

/// Sorts candidate basins into the four overlap classes.
///
/// Records belonging to other units are ignored.
pub fn classify(
    unit_id: &str,
    candidates: &[&IntersectionRecord],
    full_overlap_threshold: f64,
) -> Classification {
    let mut classification = Classification {
        unit_id: unit_id.to_string(),
        ..Classification::default()
    };

    for &record in candidates {
        if record.unit_id != unit_id {
            debug!(
                "skipping basin {}: record belongs to unit {}, not {}",
                record.basin_id, record.unit_id, unit_id
            );
            continue;
        }
        let bucket = match classify_record(record, full_overlap_threshold) {
            OverlapClass::NearExact => &mut classification.near_exact,
            OverlapClass::ContainedByUnit => &mut classification.contained,
            OverlapClass::ContainingUnit => &mut classification.containing,
            OverlapClass::Irrelevant => &mut classification.excluded,
        };
        bucket.push(record.clone());
    }

    classification
}

impl Classification {
    /// The near-exact match that represents the unit on its own, if any:
    /// highest weight, then lowest basin id.
    pub fn representative(&self) -> Option<&IntersectionRecord> {
        self.near_exact.iter().min_by(|a, b| {
            b.weight()
                .total_cmp(&a.weight())
                .then_with(|| a.basin_id.cmp(&b.basin_id))
        })
    }

    /// Final weighted basin set used by the aggregator.
    pub fn basin_weights(&self, clip_downstream_basins: bool) -> BasinWeights {
        if let Some(exact) = self.representative() {
            return BasinWeights::new(vec![BasinWeight::from_record(exact)]);
        }

        let mut weights: Vec<BasinWeight> = self.contained.iter().map(BasinWeight::from_record).collect();
        if clip_downstream_basins {
            weights.extend(resolve_downstream(&self.containing).map(BasinWeight::from_record));
        } else {
            weights.extend(self.containing.iter().map(BasinWeight::from_record));
        }
        BasinWeights::new(weights)
    }

    pub fn has_exact_match(&self) -> bool {
        !self.near_exact.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Downstream resolution
// ---------------------------------------------------------------------------

/// Picks the smallest basin among those containing the unit: the one with
/// the highest `prop_basin_in_unit`. Equal fractions fall back to the
/// lowest basin id. Returns `None` for an empty slice.
pub fn resolve_downstream(containing: &[IntersectionRecord]) -> Option<&IntersectionRecord> {
    containing.iter().min_by(|a, b| {
        match b.prop_basin_in_unit.total_cmp(&a.prop_basin_in_unit) {
            Ordering::Equal => a.basin_id.cmp(&b.basin_id),
            other => other,
        }
    })
}

// ---------------------------------------------------------------------------
// Weighted basin set
// ---------------------------------------------------------------------------

/// A basin that participates in a unit's estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinWeight {
    pub basin_id: String,
    pub weight: f64,
}

impl BasinWeight {
    pub fn new(basin_id: &str, weight: f64) -> Self {
        Self {
            basin_id: basin_id.to_string(),
            weight,
        }
    }

    fn from_record(record: &IntersectionRecord) -> Self {
        Self::new(&record.basin_id, record.weight())
    }
}

/// Participating basins for one unit, ordered by basin id.
///
/// Basins with a zero weight can never move the weighted mean and are
/// dropped on construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BasinWeights {
    weights: Vec<BasinWeight>,
}

impl BasinWeights {
    pub fn new(mut weights: Vec<BasinWeight>) -> Self {
        weights.retain(|w| w.weight > 0.0);
        weights.sort_by(|a, b| a.basin_id.cmp(&b.basin_id));
        Self { weights }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BasinWeight> {
        self.weights.iter()
    }

    /// Sum of all participating weights, observed or not.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    pub fn basin_ids(&self) -> Vec<&str> {
        self.weights.iter().map(|w| w.basin_id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const T: f64 = 0.98;

    fn rec(basin: &str, unit_in_basin: f64, basin_in_unit: f64) -> IntersectionRecord {
        IntersectionRecord::new("U1", basin, unit_in_basin, basin_in_unit)
    }

    fn classify_all(records: &[IntersectionRecord]) -> Classification {
        let refs: Vec<&IntersectionRecord> = records.iter().collect();
        classify("U1", &refs, T)
    }

    // --- Single records -----------------------------------------------------

    #[test]
    fn test_classify_record_covers_all_four_classes() {
        assert_eq!(classify_record(&rec("A", 0.99, 0.99), T), OverlapClass::NearExact);
        assert_eq!(classify_record(&rec("A", 0.10, 0.99), T), OverlapClass::ContainedByUnit);
        assert_eq!(classify_record(&rec("A", 0.99, 0.10), T), OverlapClass::ContainingUnit);
        assert_eq!(classify_record(&rec("A", 0.50, 0.50), T), OverlapClass::Irrelevant);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        assert_eq!(classify_record(&rec("A", 0.98, 0.98), T), OverlapClass::NearExact);
        assert_eq!(classify_record(&rec("A", 0.9799, 0.98), T), OverlapClass::ContainedByUnit);
    }

    // --- Near-exact matches -------------------------------------------------

    #[test]
    fn test_near_exact_match_excludes_every_other_basin() {
        let c = classify_all(&[rec("A", 0.9, 0.2), rec("B", 0.95, 0.97), rec("C", 0.99, 0.99), rec("D", 0.1, 0.99)]);
        let weights = c.basin_weights(true);
        assert_eq!(weights.basin_ids(), vec!["C"]);
        assert!((weights.total_weight() - 0.99 * 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_highest_weight_near_exact_match_wins() {
        let c = classify_all(&[rec("A", 0.985, 0.985), rec("B", 1.0, 0.99)]);
        assert_eq!(c.representative().map(|r| r.basin_id.as_str()), Some("B"));
    }

    #[test]
    fn test_near_exact_tie_falls_back_to_lowest_basin_id() {
        let forward = classify_all(&[rec("Z", 0.99, 0.99), rec("M", 0.99, 0.99)]);
        let reverse = classify_all(&[rec("M", 0.99, 0.99), rec("Z", 0.99, 0.99)]);
        assert_eq!(forward.representative().map(|r| r.basin_id.as_str()), Some("M"));
        assert_eq!(reverse.representative().map(|r| r.basin_id.as_str()), Some("M"));
    }

    // --- Contained / containing ---------------------------------------------

    #[test]
    fn test_all_contained_basins_are_retained() {
        let c = classify_all(&[rec("A", 0.2, 1.0), rec("B", 0.3, 0.99), rec("C", 0.5, 0.5)]);
        assert_eq!(c.basin_weights(true).basin_ids(), vec!["A", "B"]);
        assert_eq!(c.excluded.len(), 1);
    }

    #[test]
    fn test_clip_keeps_only_smallest_containing_basin() {
        let c = classify_all(&[rec("BIG", 1.0, 0.3), rec("SMALL", 1.0, 0.7)]);
        let clipped = c.basin_weights(true);
        assert_eq!(clipped.basin_ids(), vec!["SMALL"]);

        let unclipped = c.basin_weights(false);
        assert_eq!(unclipped.basin_ids(), vec!["BIG", "SMALL"]);
        assert!((unclipped.total_weight() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_contained_plus_clipped_downstream() {
        let c = classify_all(&[rec("TRIB", 0.25, 1.0), rec("DS1", 1.0, 0.4), rec("DS2", 0.99, 0.2)]);
        assert_eq!(c.basin_weights(true).basin_ids(), vec!["DS1", "TRIB"]);
        assert_eq!(c.basin_weights(false).basin_ids(), vec!["DS1", "DS2", "TRIB"]);
    }

    #[test]
    fn test_resolve_downstream_tie_breaks_on_basin_id() {
        let forward = vec![rec("B2", 1.0, 0.5), rec("B1", 0.99, 0.5)];
        let reverse = vec![rec("B1", 0.99, 0.5), rec("B2", 1.0, 0.5)];
        assert_eq!(resolve_downstream(&forward).map(|r| r.basin_id.as_str()), Some("B1"));
        assert_eq!(resolve_downstream(&reverse).map(|r| r.basin_id.as_str()), Some("B1"));
        assert!(resolve_downstream(&[]).is_none());
    }

    // --- Degenerate inputs --------------------------------------------------

    #[test]
    fn test_only_partial_overlaps_yield_no_basins() {
        let c = classify_all(&[rec("A", 0.4, 0.6), rec("B", 0.7, 0.1)]);
        assert!(c.basin_weights(true).is_empty());
        assert!(c.basin_weights(false).is_empty());
    }

    #[test]
    fn test_records_for_other_units_are_ignored() {
        let other = IntersectionRecord::new("U2", "X", 1.0, 1.0);
        let c = classify("U1", &[&other], T);
        assert!(!c.has_exact_match());
        assert!(c.basin_weights(true).is_empty());
    }
}
