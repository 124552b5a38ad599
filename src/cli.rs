//! Defines command-line interface options using `clap` for the climos application.

use crate::config::{
    list_netcdf_files, parse_name_list, read_omit_file, ClimoRequest, RunConfig, VariableSelection,
};
use crate::errors::{ClimoError, Result};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::PathBuf;

/// Compute seasonal climatologies from monthly NetCDF model output
#[derive(Parser, Debug)]
#[command(
    name = "climos",
    version,
    about = "Seasonal climatologies from monthly NetCDF model output"
)]
pub struct Args {
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    /// Monthly input files, named <name>.YYYY-MM.nc
    pub files: Vec<PathBuf>,

    /// Use every *.nc file of this directory as input
    #[arg(short, long, conflicts_with = "files")]
    pub input_dir: Option<PathBuf>,

    /// Output file; XXX is replaced by the season, e.g. out_XXX_climo.nc
    #[arg(short, long)]
    pub output: Option<String>,

    /// Seasons to compute, as a comma list or a JSON list (ANN, DJF, MAM, JJA, SON, JAN..DEC, 01..12)
    #[arg(short, long, value_parser = parse_names, default_value = "ANN")]
    pub seasons: NameList,

    /// Variables to reduce; ALL for every variable, AMWG for the AMWG diagnostics set
    #[arg(long, value_parser = parse_names, default_value = "ALL")]
    pub variables: NameList,

    /// JSON file of files to leave out, by season
    #[arg(long)]
    pub omit: Option<PathBuf>,

    /// JSON job request with in_dir, out_filename, seasons and variables
    #[arg(long, conflicts_with_all = ["files", "input_dir", "output"])]
    pub request: Option<PathBuf>,

    /// Print a summary of each climatology written
    #[arg(long)]
    pub describe: bool,
}

/// A list of names given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameList(pub Vec<String>);

fn parse_names(s: &str) -> std::result::Result<NameList, String> {
    parse_name_list(s)
        .map(NameList)
        .map_err(|e| format!("Invalid list '{s}': {e}"))
}

impl Args {
    /// Resolve the arguments into the configuration of a run.
    pub fn into_config(self) -> Result<RunConfig> {
        let config = match self.request {
            Some(request) => ClimoRequest::from_file(&request)?.into_config()?,
            None => {
                let files = match &self.input_dir {
                    Some(dir) => list_netcdf_files(dir)?,
                    None => self.files,
                };
                let output = self.output.ok_or_else(|| {
                    ClimoError::ConfigError("--output is required without --request".to_string())
                })?;
                RunConfig::new(
                    files,
                    output,
                    self.seasons.0,
                    VariableSelection::from_names(&self.variables.0),
                )?
            }
        };

        match &self.omit {
            Some(path) => Ok(config.with_omissions(read_omit_file(path)?)),
            None => Ok(config),
        }
    }
}
