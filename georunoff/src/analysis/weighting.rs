//! Per-step weighted aggregation of basin runoff.
//!
//! At every step the weights are renormalized over the basins that actually
//! reported a value, so a gap at one gauge redistributes its weight among the
//! others instead of dragging the estimate toward zero:
//!
//! ```text
//! estimate(t) = Σ w_b · v_b(t) / Σ w_b      over basins b with data at t
//! ```
//!
//! A step where no participating basin has data has no estimate at all.

use chrono::{DateTime, Utc};

use crate::analysis::overlap::BasinWeights;
use crate::model::{AggregatedRunoff, SeriesByBasin};

/// Weighted result for one unit at one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEstimate {
    /// Renormalized weighted mean runoff.
    pub runoff: f64,
    /// Share of the unit's participating weight that had data, scaled to 100.
    ///
    /// This is a share of the weight the unit's estimate is built from, not
    /// of the unit's area: a unit represented by a single tributary that
    /// covers a quarter of it still reports 100 when that tributary has data.
    pub percentage: f64,
    /// Number of basins that contributed.
    pub contributors: usize,
}

/// Computes the estimate for one step. `value_of` returns a basin's value at
/// that step, or `None` when the basin is missing there.
pub fn weighted_step<F>(weights: &BasinWeights, value_of: F) -> Option<StepEstimate>
where
    F: Fn(&str) -> Option<f64>,
{
    let mut weighted_sum = 0.0;
    let mut available_weight = 0.0;
    let mut contributors = 0;
    let mut last_value = 0.0;

    for basin in weights.iter() {
        if let Some(value) = value_of(&basin.basin_id) {
            weighted_sum += basin.weight * value;
            available_weight += basin.weight;
            contributors += 1;
            last_value = value;
        }
    }

    if contributors == 0 || available_weight <= 0.0 {
        return None;
    }

    // A lone contributor is passed through untouched rather than as w·v / w.
    let runoff = if contributors == 1 {
        last_value
    } else {
        weighted_sum / available_weight
    };

    Some(StepEstimate {
        runoff,
        percentage: 100.0 * available_weight / weights.total_weight(),
        contributors,
    })
}

/// Aggregates a unit's participating basins over a step grid.
///
/// Returns one row per step that has at least one contributing value. Every
/// row carries the runoff estimate; percentage mode adds the coverage
/// percentage alongside it.
pub fn aggregate(
    unit_id: &str,
    weights: &BasinWeights,
    series_by_basin: &SeriesByBasin,
    timestamps: &[DateTime<Utc>],
    percentage: bool,
) -> Vec<AggregatedRunoff> {
    timestamps
        .iter()
        .filter_map(|&timestamp| {
            let estimate = weighted_step(weights, |basin_id| {
                series_by_basin
                    .get(basin_id)
                    .and_then(|series| series.value_at(timestamp))
            })?;
            Some(AggregatedRunoff {
                unit_id: unit_id.to_string(),
                timestamp,
                estimated_runoff: Some(estimate.runoff),
                estimated_percentage: percentage.then_some(estimate.percentage),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
