//! Centralized error handling for climos
//!
//! Every fallible operation in the crate returns [`Result`]. Most errors are
//! contained to the season being processed; [`ClimoError::is_fatal`] picks out
//! the few that must stop the whole run.

use thiserror::Error;

/// Main error type for climos operations
#[derive(Debug, Error)]
pub enum ClimoError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// Malformed job request or omit list
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The input data uses a calendar or time unit we cannot reduce
    #[error("Unsupported input data: {message}")]
    FatalPrecondition { message: String },

    /// Season identifier not in the season table
    #[error("Unknown season '{season}'")]
    UnknownSeason { season: String },

    /// No input file is left for a season after exclusions and matching
    #[error("No input files for season '{season}'")]
    EmptySeasonSelection { season: String },

    /// The bounds of the two residual time slices break the calendar assumptions
    #[error("Time bounds cannot be merged: {message}")]
    MergeConsistency { message: String },

    /// Accumulation left a number of slices the merger does not handle
    #[error("Season '{season}' reduced to {count} time slices, expected 1 or 2")]
    UnsupportedSliceCount { season: String, count: usize },

    /// Variable not found in NetCDF file
    #[error("Variable '{var}' not found in file")]
    VariableNotFound { var: String },

    /// Dimension not found in variable
    #[error("Dimension '{dim}' not found in variable '{var}'")]
    DimensionNotFound { var: String, dim: String },

    /// Output container used out of lifecycle order
    #[error("Output container cannot go from {from} to {to}")]
    InvalidState { from: String, to: String },

    /// Weighted-mean computation errors
    #[error("Statistics computation error: {0}")]
    StatisticsError(String),

    /// Invalid command line or request
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl ClimoError {
    /// Errors that abort every season, not only the current one.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClimoError::FatalPrecondition { .. } | ClimoError::MergeConsistency { .. }
        )
    }
}

impl From<tempfile::PathPersistError> for ClimoError {
    fn from(error: tempfile::PathPersistError) -> Self {
        ClimoError::IoError(error.error)
    }
}

/// Result type alias for climos operations
pub type Result<T> = std::result::Result<T, ClimoError>;
