//! Intersection Coverage Report
//!
//! Audits how each requested reporting unit will be estimated before any
//! time series is touched: which regime applies, which basins participate
//! and with what weight, and how many overlapping basins are discarded as
//! slivers. Use this to sanity-check a new intersection table.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::analysis::driver::plan_unit;
use crate::analysis::overlap::BasinWeight;
use crate::config::AggregationConfig;
use crate::intersections::IntersectionTable;

// ============================================================================
// Report Structures
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub generated_at: String,
    pub full_overlap_threshold: f64,
    pub clip_downstream_basins: bool,
    pub units: Vec<UnitCoverage>,
    pub summary: CoverageSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_units: usize,
    pub exact_match: usize,
    pub weighted: usize,
    pub no_candidates: usize,
    pub no_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitCoverage {
    pub unit_id: String,
    pub regime: Regime,
    pub basins: Vec<BasinWeight>,
    pub total_weight: f64,
    pub contained_count: usize,
    pub containing_count: usize,
    pub excluded_count: usize,
}

/// How a unit's estimate will be formed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Regime {
    /// A single near-exact basin represents the unit.
    ExactMatch,
    /// Weighted mean over contained and containing basins.
    Weighted,
    /// The unit overlaps basins, but only as slivers.
    NoCandidates,
    /// The unit is absent from the intersection table.
    NoOverlap,
}

// ============================================================================
// Report Builder
// ============================================================================

pub fn unit_coverage(unit_id: &str, table: &IntersectionTable, config: &AggregationConfig) -> UnitCoverage {
    let plan = plan_unit(unit_id, table, config);
    let classification = &plan.classification;

    let regime = if !table.contains_unit(unit_id) {
        Regime::NoOverlap
    } else if classification.has_exact_match() {
        Regime::ExactMatch
    } else if plan.weights.is_empty() {
        Regime::NoCandidates
    } else {
        Regime::Weighted
    };

    UnitCoverage {
        unit_id: unit_id.to_string(),
        regime,
        basins: plan.weights.iter().cloned().collect(),
        total_weight: plan.weights.total_weight(),
        contained_count: classification.contained.len(),
        containing_count: classification.containing.len(),
        excluded_count: classification.excluded.len(),
    }
}

pub fn coverage_report<S: AsRef<str>>(
    table: &IntersectionTable,
    unit_ids: &[S],
    config: &AggregationConfig,
) -> CoverageReport {
    let mut summary = CoverageSummary::default();
    let units: Vec<UnitCoverage> = unit_ids
        .iter()
        .map(|unit_id| {
            let coverage = unit_coverage(unit_id.as_ref(), table, config);
            summary.total_units += 1;
            match coverage.regime {
                Regime::ExactMatch => summary.exact_match += 1,
                Regime::Weighted => summary.weighted += 1,
                Regime::NoCandidates => summary.no_candidates += 1,
                Regime::NoOverlap => summary.no_overlap += 1,
            }
            coverage
        })
        .collect();

    CoverageReport {
        generated_at: Utc::now().to_rfc3339(),
        full_overlap_threshold: config.full_overlap_threshold,
        clip_downstream_basins: config.clip_downstream_basins,
        units,
        summary,
    }
}

pub fn print_summary(report: &CoverageReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 INTERSECTION COVERAGE SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!(
        "Threshold: {}   Clip downstream basins: {}",
        report.full_overlap_threshold, report.clip_downstream_basins
    );
    println!();

    for unit in &report.units {
        match unit.regime {
            Regime::ExactMatch | Regime::Weighted => {
                let basins: Vec<String> = unit
                    .basins
                    .iter()
                    .map(|b| format!("{} ({:.3})", b.basin_id, b.weight))
                    .collect();
                println!("  {} ... ✓ {:?}: {}", unit.unit_id, unit.regime, basins.join(", "));
            }
            Regime::NoCandidates => {
                println!("  {} ... ⚠ only partial overlaps ({} excluded)", unit.unit_id, unit.excluded_count);
            }
            Regime::NoOverlap => {
                println!("  {} ... ✗ not in intersection table", unit.unit_id);
            }
        }
    }

    let s = &report.summary;
    let covered = s.exact_match + s.weighted;
    let coverage_rate = if s.total_units > 0 {
        (covered as f64 / s.total_units as f64) * 100.0
    } else {
        0.0
    };

    println!();
    println!("Exact match:      {}", s.exact_match);
    println!("Weighted:         {}", s.weighted);
    println!("Partial only:     {}", s.no_candidates);
    println!("Not in table:     {}", s.no_overlap);
    println!();
    println!("Overall Coverage: {:.1}% ({}/{})", coverage_rate, covered, s.total_units);
    println!("═══════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IntersectionRecord;

    fn table() -> IntersectionTable {
        IntersectionTable::from_records(vec![
            IntersectionRecord::new("EXACT", "A", 0.99, 0.99),
            IntersectionRecord::new("EXACT", "B", 0.3, 1.0),
            IntersectionRecord::new("MIXED", "B", 0.3, 1.0),
            IntersectionRecord::new("MIXED", "C", 1.0, 0.2),
            IntersectionRecord::new("MIXED", "D", 0.4, 0.4),
            IntersectionRecord::new("SLIVER", "D", 0.1, 0.05),
        ])
        .expect("valid table")
    }

    #[test]
    fn test_regimes_are_assigned_per_unit() {
        let config = AggregationConfig::default();
        let t = table();
        assert_eq!(unit_coverage("EXACT", &t, &config).regime, Regime::ExactMatch);
        assert_eq!(unit_coverage("MIXED", &t, &config).regime, Regime::Weighted);
        assert_eq!(unit_coverage("SLIVER", &t, &config).regime, Regime::NoCandidates);
        assert_eq!(unit_coverage("ABSENT", &t, &config).regime, Regime::NoOverlap);
    }

    #[test]
    fn test_weighted_unit_lists_participants_and_exclusions() {
        let coverage = unit_coverage("MIXED", &table(), &AggregationConfig::default());
        let ids: Vec<_> = coverage.basins.iter().map(|b| b.basin_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
        assert_eq!(coverage.contained_count, 1);
        assert_eq!(coverage.containing_count, 1);
        assert_eq!(coverage.excluded_count, 1);
        assert!((coverage.total_weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_summary_counts_every_regime() {
        let report = coverage_report(
            &table(),
            &["EXACT", "MIXED", "SLIVER", "ABSENT"],
            &AggregationConfig::default(),
        );
        assert_eq!(
            report.summary,
            CoverageSummary {
                total_units: 4,
                exact_match: 1,
                weighted: 1,
                no_candidates: 1,
                no_overlap: 1,
            }
        );
        let json = serde_json::to_string(&report).expect("report serializes");
        assert!(json.contains("\"regime\":\"ExactMatch\""));
    }
}
