//! Season identifiers and the noleap calendar they live on
//!
//! A season is a named set of calendar months. Months are stored in season
//! order, so `DJF` starts with December even though it is month 12.

use crate::errors::{ClimoError, Result};
use std::fmt;

/// Days in a noleap year.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// First day-of-year of each month in the noleap calendar, plus the year end.
const MONTH_STARTS: [u32; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

const SEASON_TABLE: &[(&str, &[u32])] = &[
    ("ANN", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]),
    ("DJF", &[12, 1, 2]),
    ("MAM", &[3, 4, 5]),
    ("JJA", &[6, 7, 8]),
    ("SON", &[9, 10, 11]),
    ("JAN", &[1]),
    ("FEB", &[2]),
    ("MAR", &[3]),
    ("APR", &[4]),
    ("MAY", &[5]),
    ("JUN", &[6]),
    ("JUL", &[7]),
    ("AUG", &[8]),
    ("SEP", &[9]),
    ("OCT", &[10]),
    ("NOV", &[11]),
    ("DEC", &[12]),
    ("01", &[1]),
    ("02", &[2]),
    ("03", &[3]),
    ("04", &[4]),
    ("05", &[5]),
    ("06", &[6]),
    ("07", &[7]),
    ("08", &[8]),
    ("09", &[9]),
    ("10", &[10]),
    ("11", &[11]),
    ("12", &[12]),
];

/// A season from the static table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    id: &'static str,
    months: &'static [u32],
}

impl Season {
    /// Look up a season identifier such as `"DJF"` or `"07"`.
    pub fn lookup(id: &str) -> Result<Self> {
        SEASON_TABLE
            .iter()
            .find(|(name, _)| *name == id)
            .map(|&(id, months)| Season { id, months })
            .ok_or_else(|| ClimoError::UnknownSeason {
                season: id.to_string(),
            })
    }

    /// Member months of a season identifier.
    pub fn months_of(id: &str) -> Result<&'static [u32]> {
        Ok(Self::lookup(id)?.months)
    }

    /// All identifiers the table knows about.
    pub fn identifiers() -> impl Iterator<Item = &'static str> {
        SEASON_TABLE.iter().map(|(name, _)| *name)
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Months in season order.
    pub fn months(&self) -> &'static [u32] {
        self.months
    }

    pub fn contains_month(&self, month: u32) -> bool {
        self.months.contains(&month)
    }

    /// Day-of-year on which the season's first month starts.
    pub fn window_start(&self) -> f64 {
        // Table entries are never empty.
        let first = self.months.first().copied().unwrap_or(1);
        month_day_bounds(first).map(|(start, _)| start).unwrap_or(0.0)
    }

    /// Offset of a day-of-year from the start of the season, wrapping at year end.
    pub fn offset_in_window(&self, day_of_year: f64) -> f64 {
        (day_of_year - self.window_start()).rem_euclid(DAYS_PER_YEAR)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}

/// `[start, end)` day-of-year bounds of a month in the noleap calendar.
pub fn month_day_bounds(month: u32) -> Option<(f64, f64)> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let i = month as usize - 1;
    Some((f64::from(MONTH_STARTS[i]), f64::from(MONTH_STARTS[i + 1])))
}
