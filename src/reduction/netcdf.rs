//! Seasonal accumulation over NetCDF model output
//!
//! Each time step of each input file is mapped onto the climatological year and
//! folded into a running time-weighted mean.

use super::{
    climatological_bounds, find_slot, fold_into, season_order, weighted_mean, widen_bounds,
    AdvanceBounds, SeasonalAccumulator, Slot,
};
use crate::config::VariableSelection;
use crate::container::{
    OutputContainer, ReducedVariable, TimeAxis, TimeExtent, ValueKind, VarValues,
    CLIMATOLOGICAL_LONG_NAME, CLIMATOLOGICAL_UNITS, TIME_DIM,
};
use crate::errors::{ClimoError, Result};
use crate::metadata::{global_attributes, variable_attributes, TimeAxisInfo, SUPPORTED_CALENDAR};
use crate::netcdf_io::{read_time_bounds, read_values};
use crate::season::Season;
use log::{debug, warn};
use ndarray::Axis;
use netcdf::File;
use std::path::{Path, PathBuf};

/// Accumulator reading `<name>.YYYY-MM.nc` model output
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfAccumulator;

impl NetcdfAccumulator {
    pub fn new() -> Self {
        Self
    }
}

impl SeasonalAccumulator for NetcdfAccumulator {
    fn initialize(
        &self,
        first_file: &Path,
        selection: &VariableSelection,
        season: &Season,
    ) -> Result<OutputContainer> {
        let file = netcdf::open(first_file)?;
        let info = TimeAxisInfo::read(&file)?;

        let axis = TimeAxis {
            units: CLIMATOLOGICAL_UNITS.to_string(),
            calendar: info
                .calendar
                .clone()
                .unwrap_or_else(|| SUPPORTED_CALENDAR.to_string()),
            long_name: CLIMATOLOGICAL_LONG_NAME.to_string(),
            bounds_name: info.bounds_name.clone(),
            attributes: info.attributes.clone(),
        };
        let mut container = OutputContainer::new(season.id(), axis, &info.bounds_dim);

        let available: Vec<String> = file
            .variables()
            .map(|v| v.name().to_string())
            .filter(|name| name != TIME_DIM && *name != info.bounds_name)
            .collect();

        for name in selection.resolve(&available) {
            if let Some(variable) = reduced_variable(&file, &name)? {
                container.add_variable(variable)?;
            }
        }

        container.set_global_attributes(global_attributes(&file)?)?;
        Ok(container)
    }

    fn fold_files(
        &self,
        container: &mut OutputContainer,
        files: &[PathBuf],
        advance: AdvanceBounds,
    ) -> Result<TimeExtent> {
        let season = Season::lookup(container.season())?;
        let bounds_name = container.time_axis().bounds_name.clone();
        let mut extent: Option<TimeExtent> = None;

        for path in files {
            let file = netcdf::open(path)?;
            let steps = read_time_bounds(&file, &bounds_name)?;
            let series = read_series(&file, container, steps.len())?;

            for (step, &[lower, upper]) in steps.iter().enumerate() {
                extent
                    .get_or_insert(TimeExtent::new(lower, upper))
                    .include(lower, upper);

                let climo = climatological_bounds(lower, upper);
                let weight = upper - lower;
                let time = (climo[0] + climo[1]) / 2.0;

                match find_slot(container.bounds(), climo) {
                    Slot::Within(i) => {
                        fold_step(container, i, &series, step, time, climo, weight, advance)?
                    }
                    Slot::Extends(i) => {
                        fold_step(container, i, &series, step, time, climo, weight, widen_bounds)?
                    }
                    Slot::New => {
                        container.push_slice(time, climo, weight)?;
                        for (var, values) in container.variables_mut()?.iter_mut().zip(&series) {
                            if let Some(values) = values {
                                var.values.push_slice(&values.time_step(step))?;
                            }
                        }
                    }
                }
            }

            debug!(
                "folded {} time steps of {} into {} ({} slices)",
                steps.len(),
                path.display(),
                season,
                container.slice_count()
            );
        }

        let order = season_order(container.bounds(), &season);
        container.reorder_slices(&order)?;

        extent.ok_or_else(|| ClimoError::EmptySeasonSelection {
            season: season.id().to_string(),
        })
    }
}

/// Sets up one selected variable, or `None` if it cannot be reduced.
fn reduced_variable(file: &File, name: &str) -> Result<Option<ReducedVariable>> {
    let var = file
        .variable(name)
        .ok_or_else(|| ClimoError::VariableNotFound {
            var: name.to_string(),
        })?;

    let type_name = format!("{:?}", var.vartype());
    let Some(kind) = ValueKind::from_type_name(&type_name) else {
        warn!("skipping variable '{name}': type {type_name} is not reduced");
        return Ok(None);
    };

    let dimensions: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
    let shape: Vec<usize> = var.dimensions().iter().map(netcdf::Dimension::len).collect();

    let (values, has_time) = match dimensions.iter().position(|d| d == TIME_DIM) {
        Some(0) => (VarValues::empty_series(kind, &shape[1..])?, true),
        Some(_) => {
            warn!("skipping variable '{name}': time is not its first dimension");
            return Ok(None);
        }
        None => (read_values(&var, kind)?, false),
    };

    Ok(Some(ReducedVariable {
        name: name.to_string(),
        dimensions,
        kind,
        values,
        attributes: variable_attributes(&var)?,
        has_time,
    }))
}

/// Values of every time-varying variable of the container in `file`, aligned
/// with the container's variables.
fn read_series(
    file: &File,
    container: &OutputContainer,
    n_steps: usize,
) -> Result<Vec<Option<VarValues>>> {
    container
        .variables()
        .iter()
        .map(|reduced| {
            if !reduced.has_time {
                return Ok(None);
            }
            let var = file
                .variable(&reduced.name)
                .ok_or_else(|| ClimoError::VariableNotFound {
                    var: reduced.name.clone(),
                })?;
            let values = read_values(&var, reduced.kind)?;
            let expected = &reduced.shape()[1..];
            if values.shape().first() != Some(&n_steps) || &values.shape()[1..] != expected {
                return Err(ClimoError::StatisticsError(format!(
                    "variable '{}' has shape {:?}, expected {} time steps of {:?}",
                    reduced.name,
                    values.shape(),
                    n_steps,
                    expected
                )));
            }
            Ok(Some(values))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn fold_step(
    container: &mut OutputContainer,
    slice: usize,
    series: &[Option<VarValues>],
    step: usize,
    time: f64,
    climo: [f64; 2],
    weight: f64,
    advance: AdvanceBounds,
) -> Result<()> {
    let reduced_weight = container.weights()[slice];
    let reduced_time = container.time_values()[slice];
    let reduced_bounds = container.bounds()[slice];

    let new_time = weighted_mean(reduced_time, reduced_weight, time, weight)?;
    let new_bounds = advance(reduced_bounds, climo);

    for (var, values) in container.variables_mut()?.iter_mut().zip(series) {
        let fill = var.fill_value();
        // Integer and text variables keep the slice's first contribution.
        if let (VarValues::Float(acc), Some(VarValues::Float(x))) = (&mut var.values, values) {
            fold_into(
                acc.index_axis_mut(Axis(0), slice),
                reduced_weight,
                x.index_axis(Axis(0), step),
                weight,
                fill,
            )?;
        }
    }

    container.set_slice(slice, new_time, new_bounds, reduced_weight + weight)
}
