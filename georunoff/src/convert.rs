//! Streamflow to runoff depth conversion.
//!
//! Turns gauge discharge (cubic feet per second) into runoff depth over the
//! gauge's drainage area, so basins of very different size can be averaged.

use std::fmt;
use std::str::FromStr;

use crate::model::{Result, RunoffError, RunoffObservation, RunoffSeries};

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_YEAR: f64 = 365.25;
const CUBIC_METERS_PER_CUBIC_FOOT: f64 = 0.3048 * 0.3048 * 0.3048;
const SQUARE_METERS_PER_SQUARE_KM: f64 = 1_000_000.0;
const MM_PER_M: f64 = 1_000.0;

/// Time basis of the produced runoff depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// mm/yr
    Annual,
    /// mm/month (a twelfth of a year)
    Monthly,
    /// mm/day
    Daily,
}

impl FromStr for Frequency {
    type Err = RunoffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "annual" => Ok(Frequency::Annual),
            "monthly" => Ok(Frequency::Monthly),
            "daily" => Ok(Frequency::Daily),
            other => Err(RunoffError::InvalidFrequency(other.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Annual => write!(f, "annual"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Daily => write!(f, "daily"),
        }
    }
}

/// Converts a discharge in cfs to runoff depth in mm per `frequency` period
/// for a drainage area in km².
pub fn convert_cfs_to_runoff(cfs: f64, drainage_area_km2: f64, frequency: Frequency) -> Result<f64> {
    if !(drainage_area_km2 > 0.0) {
        return Err(RunoffError::InvalidConfig(format!(
            "drainage area must be positive, got {} km2",
            drainage_area_km2
        )));
    }

    let cubic_meters_per_year = cfs * SECONDS_PER_DAY * DAYS_PER_YEAR * CUBIC_METERS_PER_CUBIC_FOOT;
    let mm_per_year = cubic_meters_per_year / (drainage_area_km2 * SQUARE_METERS_PER_SQUARE_KM) * MM_PER_M;

    Ok(match frequency {
        Frequency::Annual => mm_per_year,
        Frequency::Monthly => mm_per_year / 12.0,
        Frequency::Daily => mm_per_year / DAYS_PER_YEAR,
    })
}

/// Converts a discharge series (values in cfs) into a runoff series. Missing
/// discharge stays missing.
pub fn streamflow_to_runoff(
    discharge: &RunoffSeries,
    drainage_area_km2: f64,
    frequency: Frequency,
) -> Result<RunoffSeries> {
    let observations = discharge
        .observations()
        .iter()
        .map(|obs| {
            let value = obs
                .value
                .map(|cfs| convert_cfs_to_runoff(cfs, drainage_area_km2, frequency))
                .transpose()?;
            Ok(RunoffObservation::new(obs.timestamp, value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RunoffSeries::new(&discharge.basin_id, observations))
}
