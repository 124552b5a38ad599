//! climos: seasonal climatologies from monthly NetCDF model output
//!
//! Given monthly model output files named `<name>.YYYY-MM.nc`, climos computes
//! one climatology per requested season: a time-weighted average of every
//! month of the season over all years, written as a CF-1.7 climatology file.
//!
//! ## Key Features
//!
//! - **Season selection**: annual, the four meteorological seasons and single months
//! - **Time-weighted means**: each month weighs by the days it covers (noleap calendar)
//! - **Year-end seasons**: DJF's December and January–February slices are merged into one
//! - **CF metadata**: time in data units, `time_climo` span, history and source provenance
//! - **Safe replacement**: outputs are replaced through a temporary file with a backup
//!
//! ## Module Organization
//!
//! - [`season`]: season identifiers and the noleap calendar
//! - [`selector`]: picks the input files of a season
//! - [`reduction`]: the [`SeasonalAccumulator`](reduction::SeasonalAccumulator) capability and its NetCDF implementation
//! - [`container`]: in-memory state of one season's output
//! - [`merge`]: merging of the two slices of a year-end season
//! - [`normalize`]: time axis and global attribute fix-ups
//! - [`netcdf_io`]: reading inputs and writing outputs
//! - [`metadata`]: input metadata checks and output summaries
//! - [`config`], [`cli`]: run configuration
//! - [`pipeline`]: the per-season driver
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use climos::prelude::*;
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     PathBuf::from("run/cam.h0.0001-12.nc"),
//!     PathBuf::from("run/cam.h0.0002-01.nc"),
//!     PathBuf::from("run/cam.h0.0002-02.nc"),
//! ];
//! let config = RunConfig::new(
//!     files,
//!     "run_XXX_climo.nc",
//!     vec!["DJF".to_string()],
//!     VariableSelection::All,
//! )?;
//! let summary = run_climatologies(&config, &NetcdfAccumulator::new())?;
//! for path in summary.outputs() {
//!     println!("wrote {}", path.display());
//! }
//! # Ok::<(), climos::errors::ClimoError>(())
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod errors;
pub mod merge;
pub mod metadata;
pub mod netcdf_io;
pub mod normalize;
pub mod pipeline;
pub mod reduction;
pub mod season;
pub mod selector;

pub use errors::{ClimoError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::{ClimoRequest, RunConfig, VariableSelection};
    pub use crate::container::{ContainerState, OutputContainer, TimeExtent};
    pub use crate::errors::{ClimoError, Result};
    pub use crate::merge::{merge_boundary_slices, MergeOutcome};
    pub use crate::metadata::InputMetadata;
    pub use crate::pipeline::{run_climatologies, RunSummary, SeasonOutcome};
    pub use crate::reduction::{NetcdfAccumulator, SeasonalAccumulator};
    pub use crate::season::Season;
}
