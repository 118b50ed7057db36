/// Runoff aggregation for reporting units.
///
/// Submodules, leaf-first:
/// - `overlap`: classifies each unit's candidate basins and resolves the
///   downstream basin; time-independent.
/// - `weighting`: per-step weighted mean with renormalization over the
///   basins that reported data.
/// - `driver`: runs the above across many units and assembles the tidy
///   output table.

pub mod driver;
pub mod overlap;
pub mod weighting;

pub use driver::{aggregate_many, aggregate_unit, plan_unit, step_grid, UnitPlan};
pub use overlap::{
    classify, classify_record, resolve_downstream, BasinWeight, BasinWeights, Classification,
    OverlapClass,
};
pub use weighting::{aggregate, weighted_step, StepEstimate};
