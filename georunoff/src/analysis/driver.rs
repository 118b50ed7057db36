//! Multi-unit, multi-period aggregation driver.
//!
//! Runs selection → classification → downstream resolution → weighting for
//! each requested unit and concatenates the rows in unit order. Units never
//! interact, so they can be processed on the rayon pool; the shared inputs
//! are only ever read.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::debug;
use rayon::prelude::*;

use crate::analysis::overlap::{BasinWeights, Classification, classify};
use crate::analysis::weighting::aggregate;
use crate::config::AggregationConfig;
use crate::intersections::{IntersectionTable, select_basins};
use crate::logging::log_run_summary;
use crate::model::{AggregatedRunoff, IntersectionRecord, Result, SeriesByBasin};

/// Static (time-independent) decision for one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitPlan {
    pub classification: Classification,
    pub weights: BasinWeights,
}

/// Classifies a unit's candidate basins and derives its weighted basin set.
pub fn plan_unit(unit_id: &str, table: &IntersectionTable, config: &AggregationConfig) -> UnitPlan {
    let candidates: Vec<&IntersectionRecord> = select_basins(unit_id, table)
        .iter()
        .filter_map(|basin_id| table.find(unit_id, basin_id))
        .collect();
    let classification = classify(unit_id, &candidates, config.full_overlap_threshold);
    let weights = classification.basin_weights(config.clip_downstream_basins);
    UnitPlan {
        classification,
        weights,
    }
}

/// Union of all timestamps observed by the participating basins, restricted
/// to the configured date window, in ascending order.
pub fn step_grid(
    weights: &BasinWeights,
    series_by_basin: &SeriesByBasin,
    config: &AggregationConfig,
) -> Vec<DateTime<Utc>> {
    let grid: BTreeSet<DateTime<Utc>> = weights
        .iter()
        .filter_map(|basin| series_by_basin.get(&basin.basin_id))
        .flat_map(|series| series.timestamps())
        .filter(|&ts| config.in_window(ts))
        .collect();
    grid.into_iter().collect()
}

/// Aggregated rows for a single unit. A unit with no participating basins,
/// or whose basins have no data in the window, yields no rows.
pub fn aggregate_unit(
    unit_id: &str,
    series_by_basin: &SeriesByBasin,
    table: &IntersectionTable,
    config: &AggregationConfig,
) -> Vec<AggregatedRunoff> {
    let plan = plan_unit(unit_id, table, config);
    if plan.weights.is_empty() {
        debug!("unit {}: no participating basins", unit_id);
        return Vec::new();
    }

    let grid = step_grid(&plan.weights, series_by_basin, config);
    let rows = aggregate(unit_id, &plan.weights, series_by_basin, &grid, config.percentage);
    debug!(
        "unit {}: {} basins {:?}, {} steps, {} rows",
        unit_id,
        plan.weights.len(),
        plan.weights.basin_ids(),
        grid.len(),
        rows.len()
    );
    rows
}

/// Aggregates every unit in `unit_ids` into one tidy table.
///
/// The configuration is validated before any unit is processed. Rows are
/// ordered by the position of their unit in `unit_ids`, then by time, so
/// identical inputs always give identical output regardless of `parallel`.
pub fn aggregate_many<S: AsRef<str> + Sync>(
    unit_ids: &[S],
    series_by_basin: &SeriesByBasin,
    table: &IntersectionTable,
    config: &AggregationConfig,
) -> Result<Vec<AggregatedRunoff>> {
    config.validate()?;

    let per_unit: Vec<Vec<AggregatedRunoff>> = if config.parallel {
        unit_ids
            .par_iter()
            .map(|unit_id| aggregate_unit(unit_id.as_ref(), series_by_basin, table, config))
            .collect()
    } else {
        unit_ids
            .iter()
            .map(|unit_id| aggregate_unit(unit_id.as_ref(), series_by_basin, table, config))
            .collect()
    };

    let units_with_rows = per_unit.iter().filter(|rows| !rows.is_empty()).count();
    let rows: Vec<AggregatedRunoff> = per_unit.into_iter().flatten().collect();
    log_run_summary(unit_ids.len(), units_with_rows, rows.len());
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
