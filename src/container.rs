//! In-memory state of one season's climatology output
//!
//! An [`OutputContainer`] is created from the first input file of a season,
//! filled by an accumulator, possibly merged, normalized and finally persisted.
//! It only moves forward through [`ContainerState`]; once finalized it rejects
//! every mutation.

use crate::errors::{ClimoError, Result};
use ndarray::{concatenate, ArrayD, ArrayViewD, Axis, Slice};
use netcdf::AttributeValue;
use std::fmt;

/// Name of the time dimension and coordinate variable.
pub const TIME_DIM: &str = "time";

/// Units of the time axis while a season is being reduced.
pub const CLIMATOLOGICAL_UNITS: &str = "days since 0";

/// Long name of the time axis while a season is being reduced.
pub const CLIMATOLOGICAL_LONG_NAME: &str = "climatological time";

/// Name of the variable holding the time weights.
pub const TIME_WEIGHTS_VAR: &str = "time_weights";

/// Name of the variable holding the time actually covered by the data.
pub const TIME_CLIMO_VAR: &str = "time_climo";

/// Attribute marking missing cells of a variable.
pub const FILL_VALUE_ATTR: &str = "_FillValue";

/// Ordered list of NetCDF attributes.
pub type Attributes = Vec<(String, AttributeValue)>;

/// Lifecycle of an output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContainerState {
    Created,
    Accumulating,
    Merging,
    Normalizing,
    Finalized,
}

impl ContainerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Accumulating => "accumulating",
            Self::Merging => "merging",
            Self::Normalizing => "normalizing",
            Self::Finalized => "finalized",
        }
    }

    fn can_advance_to(self, next: ContainerState) -> bool {
        use ContainerState::*;
        matches!(
            (self, next),
            (Created, Accumulating)
                | (Accumulating, Merging)
                | (Accumulating, Normalizing)
                | (Merging, Normalizing)
                | (Normalizing, Finalized)
        )
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage type of a reduced variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Float32,
    Float64,
    Int16,
    Int32,
    Int64,
    Text,
}

impl ValueKind {
    /// Classify a NetCDF variable type from its lowercased debug name.
    ///
    /// Returns `None` for types we don't reduce (chars, compounds, vlens...).
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let t = type_name.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| t.contains(n));
        if has(&["f64", "double"]) {
            Some(Self::Float64)
        } else if has(&["f32", "float"]) {
            Some(Self::Float32)
        } else if has(&["i64", "int64", "u64", "u32", "longlong", "uint"]) {
            Some(Self::Int64)
        } else if has(&["u16", "ushort"]) {
            Some(Self::Int32)
        } else if has(&["i16", "i8", "u8", "short", "byte"]) {
            Some(Self::Int16)
        } else if has(&["i32", "int"]) {
            Some(Self::Int32)
        } else if has(&["string"]) {
            Some(Self::Text)
        } else {
            None
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Values of a reduced variable, time (if any) on the first axis
#[derive(Debug, Clone, PartialEq)]
pub enum VarValues {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
    Text(ArrayD<String>),
}

impl VarValues {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Float(a) => a.shape(),
            Self::Int(a) => a.shape(),
            Self::Text(a) => a.shape(),
        }
    }

    /// Empty values with a zero-length leading time axis.
    pub fn empty_series(kind: ValueKind, slice_shape: &[usize]) -> Result<Self> {
        let mut shape = Vec::with_capacity(slice_shape.len() + 1);
        shape.push(0);
        shape.extend_from_slice(slice_shape);
        Ok(match kind {
            ValueKind::Text => Self::Text(ArrayD::from_shape_vec(shape, Vec::new())?),
            k if k.is_float() => Self::Float(ArrayD::from_shape_vec(shape, Vec::new())?),
            _ => Self::Int(ArrayD::from_shape_vec(shape, Vec::new())?),
        })
    }

    /// The `index`-th slice along the time axis, keeping that axis with length 1.
    pub fn time_slice(&self, index: usize) -> Self {
        let range = Slice::from(index..index + 1);
        match self {
            Self::Float(a) => Self::Float(a.slice_axis(Axis(0), range).to_owned()),
            Self::Int(a) => Self::Int(a.slice_axis(Axis(0), range).to_owned()),
            Self::Text(a) => Self::Text(a.slice_axis(Axis(0), range).to_owned()),
        }
    }

    /// The `index`-th step along the time axis, with that axis removed.
    pub fn time_step(&self, index: usize) -> Self {
        match self {
            Self::Float(a) => Self::Float(a.index_axis(Axis(0), index).to_owned()),
            Self::Int(a) => Self::Int(a.index_axis(Axis(0), index).to_owned()),
            Self::Text(a) => Self::Text(a.index_axis(Axis(0), index).to_owned()),
        }
    }

    /// Append a single slice (without time axis) at the end of the time axis.
    pub fn push_slice(&mut self, slice: &VarValues) -> Result<()> {
        match (self, slice) {
            (Self::Float(a), Self::Float(s)) => *a = append_along_time(a, s.view())?,
            (Self::Int(a), Self::Int(s)) => *a = append_along_time(a, s.view())?,
            (Self::Text(a), Self::Text(s)) => *a = append_along_time(a, s.view())?,
            _ => {
                return Err(ClimoError::StatisticsError(
                    "slice value type differs from the variable's".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Reorder the time axis.
    pub fn select_slices(&self, order: &[usize]) -> Self {
        match self {
            Self::Float(a) => Self::Float(a.select(Axis(0), order)),
            Self::Int(a) => Self::Int(a.select(Axis(0), order)),
            Self::Text(a) => Self::Text(a.select(Axis(0), order)),
        }
    }
}

fn append_along_time<'a, A: Clone>(series: &'a ArrayD<A>, slice: ArrayViewD<'a, A>) -> Result<ArrayD<A>> {
    let slice = slice.insert_axis(Axis(0));
    Ok(concatenate(Axis(0), &[series.view(), slice])?)
}

/// One variable of the climatology output
#[derive(Debug, Clone)]
pub struct ReducedVariable {
    pub name: String,
    pub dimensions: Vec<String>,
    pub kind: ValueKind,
    pub values: VarValues,
    pub attributes: Attributes,
    pub has_time: bool,
}

impl ReducedVariable {
    /// Length of each dimension, time included.
    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Fill value of a float variable, rounded through its stored type so it
    /// compares equal to the missing cells read from the file.
    pub fn fill_value(&self) -> Option<f64> {
        if !self.kind.is_float() {
            return None;
        }
        let (_, fill) = self.attributes.iter().find(|(n, _)| n == FILL_VALUE_ATTR)?;
        let value = attribute_number(fill)?;
        Some(match self.kind {
            ValueKind::Float32 => f64::from(value as f32),
            _ => value,
        })
    }
}

/// Numeric attribute value widened to `f64`, `None` for text and arrays.
pub fn attribute_number(value: &AttributeValue) -> Option<f64> {
    Some(match value {
        AttributeValue::Double(v) => *v,
        AttributeValue::Float(v) => f64::from(*v),
        AttributeValue::Short(v) => f64::from(*v),
        AttributeValue::Int(v) => f64::from(*v),
        AttributeValue::Longlong(v) => *v as f64,
        AttributeValue::Ushort(v) => f64::from(*v),
        AttributeValue::Uint(v) => f64::from(*v),
        AttributeValue::Uchar(v) => f64::from(*v),
        AttributeValue::Schar(v) => f64::from(*v),
        _ => return None,
    })
}

/// Attributes of the reduced time axis
#[derive(Debug, Clone)]
pub struct TimeAxis {
    pub units: String,
    pub calendar: String,
    pub long_name: String,
    pub bounds_name: String,
    /// Any further attributes copied from the input time variable.
    pub attributes: Attributes,
}

/// Smallest lower and largest upper time bound covered by data, in data units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeExtent {
    pub min: f64,
    pub max: f64,
}

impl TimeExtent {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            min: lower,
            max: upper,
        }
    }

    pub fn include(&mut self, lower: f64, upper: f64) {
        self.min = self.min.min(lower);
        self.max = self.max.max(upper);
    }
}

/// One season's reduced output, held in memory until it is persisted
#[derive(Debug, Clone)]
pub struct OutputContainer {
    season: String,
    state: ContainerState,
    time_axis: TimeAxis,
    bounds_dim: String,
    time: Vec<f64>,
    bounds: Vec<[f64; 2]>,
    weights: Vec<f64>,
    variables: Vec<ReducedVariable>,
    global_attributes: Attributes,
    climo_extent: Option<TimeExtent>,
}

impl OutputContainer {
    /// A fresh container with no time slices.
    pub fn new(season: &str, time_axis: TimeAxis, bounds_dim: &str) -> Self {
        Self {
            season: season.to_string(),
            state: ContainerState::Created,
            time_axis,
            bounds_dim: bounds_dim.to_string(),
            time: Vec::new(),
            bounds: Vec::new(),
            weights: Vec::new(),
            variables: Vec::new(),
            global_attributes: Vec::new(),
            climo_extent: None,
        }
    }

    pub fn season(&self) -> &str {
        &self.season
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    pub fn bounds_dim(&self) -> &str {
        &self.bounds_dim
    }

    pub fn time_values(&self) -> &[f64] {
        &self.time
    }

    pub fn bounds(&self) -> &[[f64; 2]] {
        &self.bounds
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn slice_count(&self) -> usize {
        self.time.len()
    }

    pub fn variables(&self) -> &[ReducedVariable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&ReducedVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn global_attributes(&self) -> &Attributes {
        &self.global_attributes
    }

    pub fn climo_extent(&self) -> Option<TimeExtent> {
        self.climo_extent
    }

    /// Move to the next lifecycle state.
    pub fn advance(&mut self, next: ContainerState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(self.invalid_transition(next));
        }
        self.state = next;
        Ok(())
    }

    fn invalid_transition(&self, next: ContainerState) -> ClimoError {
        ClimoError::InvalidState {
            from: self.state.to_string(),
            to: next.to_string(),
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.state == ContainerState::Finalized {
            return Err(ClimoError::InvalidState {
                from: self.state.to_string(),
                to: "modified".to_string(),
            });
        }
        Ok(())
    }

    pub fn add_variable(&mut self, variable: ReducedVariable) -> Result<()> {
        self.ensure_mutable()?;
        self.variables.push(variable);
        Ok(())
    }

    pub fn variables_mut(&mut self) -> Result<&mut [ReducedVariable]> {
        self.ensure_mutable()?;
        Ok(&mut self.variables)
    }

    /// Append a time slice; returns its index.
    pub fn push_slice(&mut self, time: f64, bounds: [f64; 2], weight: f64) -> Result<usize> {
        self.ensure_mutable()?;
        self.time.push(time);
        self.bounds.push(bounds);
        self.weights.push(weight);
        Ok(self.time.len() - 1)
    }

    /// Overwrite the time value, bounds and weight of an existing slice.
    pub fn set_slice(&mut self, index: usize, time: f64, bounds: [f64; 2], weight: f64) -> Result<()> {
        self.ensure_mutable()?;
        if index >= self.time.len() {
            return Err(ClimoError::StatisticsError(format!(
                "time slice {index} out of range for {} slices",
                self.time.len()
            )));
        }
        self.time[index] = time;
        self.bounds[index] = bounds;
        self.weights[index] = weight;
        Ok(())
    }

    /// Replace all slices and variables at once, as the merger does.
    pub fn replace_contents(
        &mut self,
        time: Vec<f64>,
        bounds: Vec<[f64; 2]>,
        weights: Vec<f64>,
        variables: Vec<ReducedVariable>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        if time.len() != bounds.len() || time.len() != weights.len() {
            return Err(ClimoError::StatisticsError(
                "time, bounds and weights must have the same length".to_string(),
            ));
        }
        self.time = time;
        self.bounds = bounds;
        self.weights = weights;
        self.variables = variables;
        Ok(())
    }

    /// Put the time slices (and every time-varying variable) in the given order.
    pub fn reorder_slices(&mut self, order: &[usize]) -> Result<()> {
        self.ensure_mutable()?;
        self.time = order.iter().map(|&i| self.time[i]).collect();
        self.bounds = order.iter().map(|&i| self.bounds[i]).collect();
        self.weights = order.iter().map(|&i| self.weights[i]).collect();
        for var in self.variables.iter_mut().filter(|v| v.has_time) {
            var.values = var.values.select_slices(order);
        }
        Ok(())
    }

    /// Add `delta` to every time value and bound.
    pub fn shift_time(&mut self, delta: f64) -> Result<()> {
        self.ensure_mutable()?;
        self.time.iter_mut().for_each(|t| *t += delta);
        self.bounds.iter_mut().flatten().for_each(|b| *b += delta);
        Ok(())
    }

    pub fn set_time_units(&mut self, units: &str, long_name: &str) -> Result<()> {
        self.ensure_mutable()?;
        self.time_axis.units = units.to_string();
        self.time_axis.long_name = long_name.to_string();
        Ok(())
    }

    pub fn set_global_attributes(&mut self, attributes: Attributes) -> Result<()> {
        self.ensure_mutable()?;
        self.global_attributes = attributes;
        Ok(())
    }

    pub fn set_climo_extent(&mut self, extent: TimeExtent) -> Result<()> {
        self.ensure_mutable()?;
        self.climo_extent = Some(extent);
        Ok(())
    }
}
