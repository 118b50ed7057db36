//! Area-weighted runoff estimates for geographic reporting units.
//!
//! Combines runoff observed at gauged drainage basins into one time series
//! per reporting unit (e.g. a hydrologic catalog unit), using a precomputed
//! table of mutual area-overlap fractions between units and basins.
//!
//! ```no_run
//! use georunoff::{aggregate_many, AggregationConfig, IntersectionTable};
//! use georunoff::series::load_series_file;
//!
//! # fn main() -> georunoff::Result<()> {
//! let config = georunoff::config::load_config("runoff.toml")?;
//! let table = IntersectionTable::load_csv("huc_site_weights.csv", &config.columns)?;
//! let series = load_series_file("runoff.csv", &config.columns)?;
//! let rows = aggregate_many(&table.unit_ids(), &series, &table, &config)?;
//! georunoff::output::write_csv(&rows, std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod convert;
pub mod intersections;
pub mod logging;
pub mod model;
pub mod output;
pub mod series;
pub mod verify;

pub use analysis::{aggregate_many, aggregate_unit};
pub use config::{AggregationConfig, ColumnNames};
pub use intersections::{select_basins, IntersectionTable};
pub use model::{AggregatedRunoff, IntersectionRecord, Result, RunoffError, RunoffSeries, SeriesByBasin};
