//! Per-season climatology pipeline
//!
//! For every requested season: select its files, accumulate them, merge the two
//! slices of a season that wraps the year end, normalize the time axis and
//! attributes, and write the result. Seasons are independent; only
//! [fatal](crate::errors::ClimoError::is_fatal) errors stop the run.

use crate::config::RunConfig;
use crate::container::ContainerState;
use crate::errors::{ClimoError, Result};
use crate::merge::{merge_boundary_slices, MergeOutcome};
use crate::metadata::InputMetadata;
use crate::netcdf_io::replace_with;
use crate::normalize::{normalize_time_axis, stamp_global_attributes};
use crate::reduction::{hold_bounds, SeasonalAccumulator};
use crate::season::Season;
use crate::selector::select_season_files;
use log::{debug, info, warn};
use std::path::PathBuf;

/// What happened to one season
#[derive(Debug, Clone, PartialEq)]
pub enum SeasonOutcome {
    Written(PathBuf),
    /// Written with two time slices that could not be merged
    Unmerged(PathBuf),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonReport {
    pub season: String,
    pub outcome: SeasonOutcome,
}

/// Outcome of every season of a run, in request order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<SeasonReport>,
}

impl RunSummary {
    /// Files written, merged or not.
    pub fn outputs(&self) -> Vec<&PathBuf> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                SeasonOutcome::Written(p) | SeasonOutcome::Unmerged(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.reports
            .iter()
            .any(|r| matches!(r.outcome, SeasonOutcome::Failed(_)))
    }

    pub fn outcome(&self, season: &str) -> Option<&SeasonOutcome> {
        self.reports
            .iter()
            .find(|r| r.season == season)
            .map(|r| &r.outcome)
    }
}

/// Computes every season of `config`, reading the input metadata from the
/// first input file.
///
/// # Errors
///
/// Returns an error if the input metadata cannot be read, or on the first
/// fatal error. Other errors are reported per season in the summary.
pub fn run_climatologies<A: SeasonalAccumulator>(
    config: &RunConfig,
    accumulator: &A,
) -> Result<RunSummary> {
    let first = config
        .files
        .first()
        .ok_or_else(|| ClimoError::ConfigError("no input files".to_string()))?;
    let metadata = InputMetadata::read(first)?;
    run_with_metadata(config, accumulator, &metadata)
}

/// Like [`run_climatologies`], with the input metadata already read.
pub fn run_with_metadata<A: SeasonalAccumulator>(
    config: &RunConfig,
    accumulator: &A,
    metadata: &InputMetadata,
) -> Result<RunSummary> {
    metadata.check_supported()?;

    let mut summary = RunSummary::default();
    for season in &config.seasons {
        info!("doing season {season}");
        let outcome = match reduce_season(config, accumulator, metadata, season) {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(ClimoError::EmptySeasonSelection { .. }) => {
                warn!("no input data, skipping season {season}");
                SeasonOutcome::Skipped("no input files".to_string())
            }
            Err(e) => {
                warn!("season {season} failed: {e}");
                SeasonOutcome::Failed(e.to_string())
            }
        };
        summary.reports.push(SeasonReport {
            season: season.clone(),
            outcome,
        });
    }
    Ok(summary)
}

/// Computes and writes the climatology of one season.
pub fn reduce_season<A: SeasonalAccumulator>(
    config: &RunConfig,
    accumulator: &A,
    metadata: &InputMetadata,
    season_id: &str,
) -> Result<SeasonOutcome> {
    let season = Season::lookup(season_id)?;
    let files = select_season_files(&config.files_for_season(season_id), &season);
    let Some(first) = files.first() else {
        return Err(ClimoError::EmptySeasonSelection {
            season: season_id.to_string(),
        });
    };
    let output = config.output_path(season_id);

    let mut container = accumulator.initialize(first, &config.variables, &season)?;
    container.advance(ContainerState::Accumulating)?;
    let extent = accumulator.fold_files(&mut container, &files, hold_bounds)?;
    info!(
        "season {season}: {} files folded into {} time slices",
        files.len(),
        container.slice_count()
    );

    let (mut container, merged) = match container.slice_count() {
        1 => (container, true),
        2 => {
            container.advance(ContainerState::Merging)?;
            replace_with(&container, &output, false)?;
            match merge_boundary_slices(&container)? {
                MergeOutcome::Merged(merged) => {
                    if let Some(backup) = replace_with(&merged, &output, true)? {
                        debug!("unmerged {season} kept as {}", backup.display());
                    }
                    (merged, true)
                }
                MergeOutcome::NotAdjacent => {
                    warn!(
                        "season {season}: time slices {:?} do not touch, leaving them unmerged",
                        container.bounds()
                    );
                    (container, false)
                }
            }
        }
        count => {
            return Err(ClimoError::UnsupportedSliceCount {
                season: season_id.to_string(),
                count,
            })
        }
    };

    container.advance(ContainerState::Normalizing)?;
    normalize_time_axis(&mut container, extent, metadata.time_units())?;
    stamp_global_attributes(&mut container, &metadata.global_attributes, &files, season.id())?;
    replace_with(&container, &output, false)?;
    container.advance(ContainerState::Finalized)?;

    Ok(if merged {
        SeasonOutcome::Written(output)
    } else {
        SeasonOutcome::Unmerged(output)
    })
}
