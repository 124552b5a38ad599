//! Time-weighted means
//!
//! Every combination of time slices in climos is a mean weighted by the number
//! of days each slice covers. Data are held as `f64` so that long runs of
//! monthly contributions don't lose precision.
//!
//! Array kernels take the variable's fill value. A cell that is missing in
//! any input with a positive weight is missing in the result.

use crate::errors::{ClimoError, Result};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};

fn check_weights(wa: f64, wb: f64) -> Result<f64> {
    let total = wa + wb;
    if !(wa >= 0.0 && wb >= 0.0) || !total.is_finite() || total <= 0.0 {
        return Err(ClimoError::StatisticsError(format!(
            "weights must be non-negative with a positive sum, got {wa} and {wb}"
        )));
    }
    Ok(total)
}

/// `(a·wa + b·wb) / (wa + wb)`
pub fn weighted_mean(a: f64, wa: f64, b: f64, wb: f64) -> Result<f64> {
    let total = check_weights(wa, wb)?;
    Ok((a * wa + b * wb) / total)
}

fn combine(x: f64, wx: f64, y: f64, wy: f64, total: f64, fill: Option<f64>) -> f64 {
    match fill {
        Some(f) if (wx > 0.0 && x == f) || (wy > 0.0 && y == f) => f,
        _ => (x * wx + y * wy) / total,
    }
}

/// Element-wise weighted mean of two equally shaped arrays.
pub fn weighted_mean_arrays(
    a: ArrayViewD<f64>,
    wa: f64,
    b: ArrayViewD<f64>,
    wb: f64,
    fill: Option<f64>,
) -> Result<ArrayD<f64>> {
    let total = check_weights(wa, wb)?;
    if a.shape() != b.shape() {
        return Err(ClimoError::StatisticsError(format!(
            "cannot average arrays of shape {:?} and {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(Zip::from(&a)
        .and(&b)
        .map_collect(|&x, &y| combine(x, wa, y, wb, total, fill)))
}

/// Fold a contribution of weight `weight` into a running mean of weight `acc_weight`.
pub fn fold_into(
    mut acc: ArrayViewMutD<f64>,
    acc_weight: f64,
    contribution: ArrayViewD<f64>,
    weight: f64,
    fill: Option<f64>,
) -> Result<()> {
    let total = check_weights(acc_weight, weight)?;
    if acc.shape() != contribution.shape() {
        return Err(ClimoError::StatisticsError(format!(
            "contribution of shape {:?} does not fit running mean of shape {:?}",
            contribution.shape(),
            acc.shape()
        )));
    }
    acc.zip_mut_with(&contribution, |s, &x| {
        *s = combine(*s, acc_weight, x, weight, total, fill)
    });
    Ok(())
}
