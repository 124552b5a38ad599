//! Merging of the two time slices left by a season that straddles the year end
//!
//! Accumulation maps every contribution into `[0, 365)`, so a season such as
//! DJF comes out as two slices: December at the end of the year and
//! January–February at its start. This module joins them into the single slice
//! a climatology should have.

use crate::container::{OutputContainer, ReducedVariable, VarValues};
use crate::errors::{ClimoError, Result};
use crate::reduction::{weighted_mean, weighted_mean_arrays};
use crate::season::DAYS_PER_YEAR;
use ndarray::Axis;

/// Result of trying to merge two slices
#[derive(Debug)]
pub enum MergeOutcome {
    Merged(OutputContainer),
    /// The slices don't touch; nothing was done.
    NotAdjacent,
}

/// How the first slice of a pair meets the second one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjacency {
    /// The first slice ends at the year end and the second starts at day 0.
    Wrap,
    Contiguous,
}

impl Adjacency {
    /// Days to subtract from the first slice to line it up with the second.
    pub fn shift(self) -> f64 {
        match self {
            Self::Wrap => DAYS_PER_YEAR,
            Self::Contiguous => 0.0,
        }
    }
}

pub fn adjacency(first: [f64; 2], second: [f64; 2]) -> Option<Adjacency> {
    if first[1] - DAYS_PER_YEAR == second[0] {
        Some(Adjacency::Wrap)
    } else if first[1] == second[0] {
        Some(Adjacency::Contiguous)
    } else {
        None
    }
}

/// Checks that two slices can be read as one interval, once the first is moved
/// back a year if it starts after the second ends.
pub fn check_bounds_consistency(first: [f64; 2], second: [f64; 2]) -> Result<()> {
    let [mut g00, mut g01] = first;
    let [g10, g11] = second;
    if g00 > g11 {
        g00 -= DAYS_PER_YEAR;
        g01 -= DAYS_PER_YEAR;
    }

    let violation = if g01 != g10 {
        Some("first slice does not end where the second starts")
    } else if g00 >= g01 {
        Some("first slice is empty or reversed")
    } else if g11 <= g10 {
        Some("second slice is empty or reversed")
    } else {
        None
    };

    match violation {
        Some(what) => Err(ClimoError::MergeConsistency {
            message: format!("{what}: {first:?} then {second:?}"),
        }),
        None => Ok(()),
    }
}

/// Joins the two time slices of `container` into one.
///
/// Float variables become the mean of both slices weighted by their time
/// weights, missing wherever either slice holds the fill value. Integer and
/// text variables keep the first slice; variables without a time dimension are
/// copied.
///
/// # Errors
///
/// [`ClimoError::UnsupportedSliceCount`] unless there are exactly two slices,
/// and [`ClimoError::MergeConsistency`] if the slices touch but their bounds
/// contradict the calendar.
pub fn merge_boundary_slices(container: &OutputContainer) -> Result<MergeOutcome> {
    if container.slice_count() != 2 {
        return Err(ClimoError::UnsupportedSliceCount {
            season: container.season().to_string(),
            count: container.slice_count(),
        });
    }

    let (b0, b1) = (container.bounds()[0], container.bounds()[1]);
    let Some(adjacent) = adjacency(b0, b1) else {
        return Ok(MergeOutcome::NotAdjacent);
    };
    check_bounds_consistency(b0, b1)?;

    let shift = adjacent.shift();
    let (t0, t1) = (container.time_values()[0], container.time_values()[1]);
    let (w0, w1) = (container.weights()[0], container.weights()[1]);

    let time = weighted_mean(t0 - shift, w0, t1, w1)?;
    let bounds = [b0[0] - shift, b1[1]];

    let variables = container
        .variables()
        .iter()
        .map(|var| merge_variable(var, w0, w1))
        .collect::<Result<Vec<_>>>()?;

    let mut merged = container.clone();
    merged.replace_contents(vec![time], vec![bounds], vec![w0 + w1], variables)?;
    Ok(MergeOutcome::Merged(merged))
}

fn merge_variable(var: &ReducedVariable, w0: f64, w1: f64) -> Result<ReducedVariable> {
    if !var.has_time {
        return Ok(var.clone());
    }
    let values = match &var.values {
        VarValues::Float(a) => {
            let mean = weighted_mean_arrays(
                a.index_axis(Axis(0), 0),
                w0,
                a.index_axis(Axis(0), 1),
                w1,
                var.fill_value(),
            )?;
            VarValues::Float(mean.insert_axis(Axis(0)))
        }
        other => other.time_slice(0),
    };
    Ok(ReducedVariable {
        values,
        ..var.clone()
    })
}
