//! Picks the input files that belong to a season
//!
//! Model output is expected to be named `<anything>.YYYY-MM.nc`. Files that do
//! not follow that convention are kept rather than dropped: a naming drift
//! should never silently remove data from a climatology.

use crate::season::Season;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static MONTHLY_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*\.(\d{4})-(\d{2})\.nc$").unwrap());

/// Year and month encoded in a monthly file name, if it has one.
pub fn year_month(path: &Path) -> Option<(i32, u32)> {
    let name = path.to_string_lossy();
    let caps = MONTHLY_FILE_RE.captures(&name)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    Some((year, month))
}

/// Returns the sorted subset of `files` that belong to `season`.
///
/// Files whose names don't carry a `YYYY-MM` tag are retained with a warning.
/// Sorting is lexicographic, which is chronological under the naming scheme.
pub fn select_season_files(files: &[PathBuf], season: &Season) -> Vec<PathBuf> {
    let mut selected: Vec<PathBuf> = files
        .iter()
        .filter(|path| match year_month(path) {
            Some((_, month)) => season.contains_month(month),
            None => {
                warn!(
                    "file name {} does not match <name>.YYYY-MM.nc, keeping it for season {}",
                    path.display(),
                    season
                );
                true
            }
        })
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    selected
}
