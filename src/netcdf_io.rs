//! NetCDF I/O for climatology containers
//!
//! Reading variables of monthly input files into [`VarValues`], writing a whole
//! [`OutputContainer`] to a new file, and replacing an existing output through a
//! temporary file so that a failed write never leaves a half-written output in
//! place.

use crate::container::{
    attribute_number, OutputContainer, ReducedVariable, ValueKind, VarValues, FILL_VALUE_ATTR,
    TIME_CLIMO_VAR, TIME_DIM, TIME_WEIGHTS_VAR,
};
use crate::errors::{ClimoError, Result};
use log::{debug, warn};
use ndarray::{indices, ArrayD, Dimension, IxDyn};
use netcdf::{AttributeValue, Extents, File, FileMut, NcTypeDescriptor, Variable};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Reads a whole variable, widened to the container's storage type.
pub fn read_values(var: &Variable, kind: ValueKind) -> Result<VarValues> {
    let shape: Vec<usize> = var
        .dimensions()
        .iter()
        .map(netcdf::Dimension::len)
        .collect();

    Ok(match kind {
        ValueKind::Text => {
            let mut strings = Vec::with_capacity(shape.iter().product());
            for index in indices(IxDyn(&shape)) {
                strings.push(var.get_string(index.slice())?);
            }
            VarValues::Text(ArrayD::from_shape_vec(shape, strings)?)
        }
        k if k.is_float() => {
            let data = var.get_values::<f64, _>(Extents::All)?;
            VarValues::Float(ArrayD::from_shape_vec(shape, data)?)
        }
        _ => {
            let data = var.get_values::<i64, _>(Extents::All)?;
            VarValues::Int(ArrayD::from_shape_vec(shape, data)?)
        }
    })
}

/// Reads the `[lower, upper]` bounds of every time step of a file.
pub fn read_time_bounds(file: &File, bounds_name: &str) -> Result<Vec<[f64; 2]>> {
    let var = file
        .variable(bounds_name)
        .ok_or_else(|| ClimoError::VariableNotFound {
            var: bounds_name.to_string(),
        })?;

    let dims = var.dimensions();
    if dims.len() != 2 || dims[1].len() != 2 {
        return Err(ClimoError::DimensionNotFound {
            var: bounds_name.to_string(),
            dim: "bounds dimension of length 2".to_string(),
        });
    }

    let values = var.get_values::<f64, _>(Extents::All)?;
    Ok(values.chunks_exact(2).map(|b| [b[0], b[1]]).collect())
}

/// Writes a container to a new NetCDF file at `path`, clobbering it.
///
/// The file is closed when this returns.
pub fn write_container(container: &OutputContainer, path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;
    let axis = container.time_axis();
    let bounds_dim = container.bounds_dim();
    let n_slices = container.slice_count();

    file.add_dimension(TIME_DIM, n_slices)?;
    file.add_dimension(bounds_dim, 2)?;
    for (name, len) in data_dimensions(container)? {
        file.add_dimension(&name, len)?;
    }

    {
        let mut time = file.add_variable::<f64>(TIME_DIM, &[TIME_DIM])?;
        time.put_attribute("units", axis.units.as_str())?;
        time.put_attribute("calendar", axis.calendar.as_str())?;
        time.put_attribute("long_name", axis.long_name.as_str())?;
        time.put_attribute("bounds", axis.bounds_name.as_str())?;
        for (name, value) in &axis.attributes {
            time.put_attribute(name, value.clone())?;
        }
        time.put_values(container.time_values(), Extents::All)?;
    }

    let flat_bounds: Vec<f64> = container.bounds().iter().flatten().copied().collect();
    {
        let mut bounds = file.add_variable::<f64>(&axis.bounds_name, &[TIME_DIM, bounds_dim])?;
        bounds.put_attribute("units", axis.units.as_str())?;
        bounds.put_values(&flat_bounds, Extents::All)?;
    }

    {
        let mut weights = file.add_variable::<f64>(TIME_WEIGHTS_VAR, &[TIME_DIM])?;
        weights.put_attribute("long_name", "days contributing to each time slice")?;
        weights.put_attribute("units", "days")?;
        weights.put_values(container.weights(), Extents::All)?;
    }

    if let Some(extent) = container.climo_extent() {
        let span: Vec<f64> = (0..n_slices).flat_map(|_| [extent.min, extent.max]).collect();
        let mut climo = file.add_variable::<f64>(TIME_CLIMO_VAR, &[TIME_DIM, bounds_dim])?;
        climo.put_attribute("long_name", "time span of the data in the climatology")?;
        climo.put_attribute("units", axis.units.as_str())?;
        climo.put_attribute("initialized", "yes")?;
        climo.put_values(&span, Extents::All)?;
    }

    for var in container.variables() {
        write_variable(&mut file, var)?;
    }

    for (name, value) in container.global_attributes() {
        file.add_attribute(name, value.clone())?;
    }

    debug!(
        "wrote {} variables over {} time slices to {}",
        container.variables().len(),
        n_slices,
        path.display()
    );
    Ok(())
}

/// Dimensions used by the variables other than time and the bounds dimension.
fn data_dimensions(container: &OutputContainer) -> Result<Vec<(String, usize)>> {
    let mut dims: Vec<(String, usize)> = Vec::new();
    for var in container.variables() {
        for (name, &len) in var.dimensions.iter().zip(var.shape()) {
            if name == TIME_DIM || name == container.bounds_dim() {
                continue;
            }
            match dims.iter().find(|(n, _)| n == name) {
                Some(&(_, existing)) if existing != len => {
                    return Err(ClimoError::StatisticsError(format!(
                        "dimension '{name}' has length {existing} but '{}' needs {len}",
                        var.name
                    )));
                }
                Some(_) => {}
                None => dims.push((name.clone(), len)),
            }
        }
    }
    Ok(dims)
}

fn write_variable(file: &mut FileMut, var: &ReducedVariable) -> Result<()> {
    let dims: Vec<&str> = var.dimensions.iter().map(String::as_str).collect();
    match (&var.values, var.kind) {
        (VarValues::Float(a), ValueKind::Float32) => {
            write_numeric(file, var, &dims, a.mapv(|x| x as f32))
        }
        (VarValues::Float(a), _) => write_numeric(file, var, &dims, a.clone()),
        (VarValues::Int(a), ValueKind::Int16) => {
            write_numeric(file, var, &dims, a.mapv(|x| x as i16))
        }
        (VarValues::Int(a), ValueKind::Int32) => {
            write_numeric(file, var, &dims, a.mapv(|x| x as i32))
        }
        (VarValues::Int(a), _) => write_numeric(file, var, &dims, a.clone()),
        (VarValues::Text(a), _) => {
            let mut out = file.add_string_variable(&var.name, &dims)?;
            for (index, value) in a.indexed_iter() {
                out.put_string(value, index.slice())?;
            }
            for (name, value) in &var.attributes {
                out.put_attribute(name, value.clone())?;
            }
            Ok(())
        }
    }
}

fn write_numeric<T: NcTypeDescriptor + Copy>(
    file: &mut FileMut,
    var: &ReducedVariable,
    dims: &[&str],
    data: ArrayD<T>,
) -> Result<()> {
    let mut out = file.add_variable::<T>(&var.name, dims)?;

    // The fill value has to be set before any data and match the variable type.
    if let Some((_, fill)) = var.attributes.iter().find(|(n, _)| n == FILL_VALUE_ATTR) {
        match coerce_fill_value(fill, var.kind) {
            Some(fill) => {
                out.put_attribute(FILL_VALUE_ATTR, fill)?;
            }
            None => warn!(
                "dropping _FillValue {fill:?} of '{}': not representable as {:?}",
                var.name, var.kind
            ),
        }
    }

    out.put(data.view(), Extents::All)?;

    for (name, value) in var.attributes.iter().filter(|(n, _)| n != FILL_VALUE_ATTR) {
        out.put_attribute(name, value.clone())?;
    }
    Ok(())
}

/// Converts a numeric fill value to the attribute type matching `kind`.
///
/// Returns `None` for non-numeric fill values and for values the type cannot
/// hold exactly.
pub fn coerce_fill_value(fill: &AttributeValue, kind: ValueKind) -> Option<AttributeValue> {
    let value = attribute_number(fill)?;
    let integral = |min: f64, end: f64| value.fract() == 0.0 && (min..end).contains(&value);
    match kind {
        ValueKind::Float32 => {
            (!value.is_finite() || value.abs() <= f64::from(f32::MAX))
                .then(|| AttributeValue::Float(value as f32))
        }
        ValueKind::Float64 => Some(AttributeValue::Double(value)),
        ValueKind::Int16 => integral(f64::from(i16::MIN), f64::from(i16::MAX) + 1.0)
            .then(|| AttributeValue::Short(value as i16)),
        ValueKind::Int32 => integral(f64::from(i32::MIN), f64::from(i32::MAX) + 1.0)
            .then(|| AttributeValue::Int(value as i32)),
        ValueKind::Int64 => integral(-(2f64.powi(63)), 2f64.powi(63))
            .then(|| AttributeValue::Longlong(value as i64)),
        ValueKind::Text => None,
    }
}

/// Path the replaced output is moved to: `<stem>.old.nc` next to it.
pub fn backup_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!("{stem}.old.nc"))
}

/// Replaces a file by way of a temporary file in the same directory
///
/// The new content is written to [`staging_path`](Self::staging_path) and must
/// be complete and closed before [`commit`](Self::commit). If the transaction
/// is dropped without committing, the temporary file is removed and the target
/// is untouched.
#[derive(Debug)]
pub struct ReplaceTransaction {
    target: PathBuf,
    staging: TempPath,
    keep_backup: bool,
}

impl ReplaceTransaction {
    /// Opens a temporary file next to `target`, creating the directory if needed.
    pub fn begin(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let staging = tempfile::Builder::new()
            .prefix(".climos-")
            .suffix(".nc")
            .tempfile_in(&dir)?
            .into_temp_path();

        Ok(Self {
            target: target.to_path_buf(),
            staging,
            keep_backup: false,
        })
    }

    /// Keep the replaced file at [`backup_path`] instead of overwriting it.
    pub fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = keep;
        self
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Moves the staged file into place. Returns the backup path if one was kept.
    pub fn commit(self) -> Result<Option<PathBuf>> {
        let backup = if self.keep_backup && self.target.exists() {
            let backup = backup_path(&self.target);
            fs::rename(&self.target, &backup)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = self.staging.persist(&self.target) {
            if let Some(backup) = &backup {
                if let Err(restore) = fs::rename(backup, &self.target) {
                    warn!(
                        "could not restore {} from {}: {restore}",
                        self.target.display(),
                        backup.display()
                    );
                }
            }
            return Err(e.into());
        }

        Ok(backup)
    }
}

/// Writes `container` over `target` through a [`ReplaceTransaction`].
pub fn replace_with(
    container: &OutputContainer,
    target: &Path,
    keep_backup: bool,
) -> Result<Option<PathBuf>> {
    let transaction = ReplaceTransaction::begin(target)?.keep_backup(keep_backup);
    write_container(container, transaction.staging_path())?;
    transaction.commit()
}
