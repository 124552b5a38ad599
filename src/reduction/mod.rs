//! Seasonal accumulation of monthly files into climatological time slices
//!
//! The accumulator is a capability behind the [`SeasonalAccumulator`] trait so
//! that the merge and normalization steps can be driven by a fake that
//! produces controlled one- or two-slice containers.
//!
//! # Organization
//!
//! - [`weighted`]: weighted-mean kernels shared with the merger
//! - [`netcdf`]: the accumulator reading real NetCDF model output
//!
//! The slotting rules below are file-format independent: a contribution with
//! climatological bounds `[lo, hi]` either lies within an existing slice,
//! abuts one (and extends it), or opens a new slice. The year wrap is never
//! bridged here.

pub mod netcdf;
pub mod weighted;

pub use self::netcdf::NetcdfAccumulator;
pub use weighted::{fold_into, weighted_mean, weighted_mean_arrays};

use crate::config::VariableSelection;
use crate::container::{OutputContainer, TimeExtent};
use crate::errors::Result;
use crate::season::{Season, DAYS_PER_YEAR};
use std::path::{Path, PathBuf};

/// Rule for the new bounds of a slice that receives another contribution.
///
/// Called with the slice's current bounds and the contribution's
/// climatological bounds.
pub type AdvanceBounds = fn(reduced: [f64; 2], contributed: [f64; 2]) -> [f64; 2];

/// Keep the reduced bounds as they are.
pub fn hold_bounds(reduced: [f64; 2], _contributed: [f64; 2]) -> [f64; 2] {
    reduced
}

/// Grow the reduced bounds to cover the contribution.
pub fn widen_bounds(reduced: [f64; 2], contributed: [f64; 2]) -> [f64; 2] {
    [reduced[0].min(contributed[0]), reduced[1].max(contributed[1])]
}

/// Reduces a season's files into an output container
pub trait SeasonalAccumulator {
    /// Create the season's container from its first file: climatological time
    /// axis, no slices, time-less variables loaded by value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks a time axis.
    fn initialize(
        &self,
        first_file: &Path,
        selection: &VariableSelection,
        season: &Season,
    ) -> Result<OutputContainer>;

    /// Fold every file, in order, into the container's running weighted means.
    ///
    /// Returns the time span covered by the folded data, in the data's units.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or is inconsistent with the
    /// first one.
    fn fold_files(
        &self,
        container: &mut OutputContainer,
        files: &[PathBuf],
        advance: AdvanceBounds,
    ) -> Result<TimeExtent>;
}

/// Where a contribution goes among the existing slices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Within the bounds of slice `i`
    Within(usize),
    /// Directly before or after slice `i`
    Extends(usize),
    New,
}

/// Map data-unit bounds onto the `[0, 365)` climatological year.
pub fn climatological_bounds(lower: f64, upper: f64) -> [f64; 2] {
    let lo = lower.rem_euclid(DAYS_PER_YEAR);
    [lo, lo + (upper - lower)]
}

pub fn find_slot(slices: &[[f64; 2]], contribution: [f64; 2]) -> Slot {
    let [lo, hi] = contribution;
    if let Some(i) = slices.iter().position(|b| b[0] <= lo && hi <= b[1]) {
        return Slot::Within(i);
    }
    if let Some(i) = slices.iter().position(|b| hi == b[0] || lo == b[1]) {
        return Slot::Extends(i);
    }
    Slot::New
}

/// Slice order that starts at the season's first month.
pub fn season_order(slices: &[[f64; 2]], season: &Season) -> Vec<usize> {
    let mut order: Vec<usize> = (0..slices.len()).collect();
    order.sort_by(|&a, &b| {
        season
            .offset_in_window(slices[a][0])
            .total_cmp(&season.offset_in_window(slices[b][0]))
    });
    order
}
