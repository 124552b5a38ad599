//! NetCDF metadata inspection for climatology inputs and outputs
//!
//! This module reads what the reduction needs to know about the input data
//! before any season is processed (time units, calendar, bounds variable,
//! global attributes) and prints a summary of a finished climatology file.

use crate::container::{Attributes, FILL_VALUE_ATTR, TIME_CLIMO_VAR, TIME_DIM, TIME_WEIGHTS_VAR};
use crate::errors::{ClimoError, Result};
use netcdf::{AttributeValue, File, Variable};
use std::path::{Path, PathBuf};

/// The only calendar the reduction supports.
pub const SUPPORTED_CALENDAR: &str = "noleap";

/// Default name of the time bounds variable when the time axis doesn't name one.
pub const DEFAULT_BOUNDS_VAR: &str = "time_bnds";

/// Default name of the bounds dimension.
pub const DEFAULT_BOUNDS_DIM: &str = "nbnd";

/// Attributes of the time axis that the output container sets itself.
const MANAGED_TIME_ATTRIBUTES: [&str; 4] = ["units", "calendar", "long_name", "bounds"];

/// Structured metadata for the time axis of an input file
#[derive(Debug, Clone)]
pub struct TimeAxisInfo {
    pub units: Option<String>,
    pub calendar: Option<String>,
    pub bounds_name: String,
    pub bounds_dim: String,
    /// Public attributes other than units, calendar, long_name and bounds
    pub attributes: Attributes,
}

impl TimeAxisInfo {
    /// Read the `time` coordinate of an open file.
    pub fn read(file: &File) -> Result<Self> {
        let time = file
            .variable(TIME_DIM)
            .ok_or_else(|| ClimoError::VariableNotFound {
                var: TIME_DIM.to_string(),
            })?;

        let attributes = variable_attributes(&time)?;
        let units = string_attribute(&attributes, "units").map(str::to_string);
        let calendar = string_attribute(&attributes, "calendar").map(str::to_string);
        let bounds_name = string_attribute(&attributes, "bounds")
            .unwrap_or(DEFAULT_BOUNDS_VAR)
            .to_string();

        let bounds_dim = file
            .variable(&bounds_name)
            .and_then(|b| b.dimensions().get(1).map(|d| d.name().to_string()))
            .unwrap_or_else(|| DEFAULT_BOUNDS_DIM.to_string());

        let attributes = attributes
            .into_iter()
            .filter(|(name, _)| !MANAGED_TIME_ATTRIBUTES.contains(&name.as_str()))
            .collect();

        Ok(Self {
            units,
            calendar,
            bounds_name,
            bounds_dim,
            attributes,
        })
    }
}

/// What the whole run needs to know about its input data
#[derive(Debug, Clone)]
pub struct InputMetadata {
    pub path: PathBuf,
    pub time: TimeAxisInfo,
    pub global_attributes: Attributes,
}

impl InputMetadata {
    /// Read the metadata of the first input file.
    pub fn read(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            time: TimeAxisInfo::read(&file)?,
            global_attributes: global_attributes(&file)?,
        })
    }

    /// Fails unless the data use the noleap calendar with time in days.
    pub fn check_supported(&self) -> Result<()> {
        let calendar = self.time.calendar.as_deref().unwrap_or("None");
        if calendar != SUPPORTED_CALENDAR {
            return Err(ClimoError::FatalPrecondition {
                message: format!(
                    "climatologies are only implemented for the {SUPPORTED_CALENDAR} calendar, \
                     {} uses {calendar}",
                    self.path.display()
                ),
            });
        }
        let units = self.time.units.as_deref().unwrap_or("");
        if !units.starts_with("days") {
            return Err(ClimoError::FatalPrecondition {
                message: format!(
                    "climatologies are only implemented for time in days, {} uses '{units}'",
                    self.path.display()
                ),
            });
        }
        Ok(())
    }

    /// Time units of the input data.
    pub fn time_units(&self) -> &str {
        self.time.units.as_deref().unwrap_or("")
    }
}

/// Whether an attribute is library bookkeeping rather than data description.
///
/// `_FillValue` is the one underscore attribute that describes the data.
pub fn is_private_attribute(name: &str) -> bool {
    name.starts_with('_') && name != FILL_VALUE_ATTR
}

/// Public attributes of a variable, in file order.
pub fn variable_attributes(var: &Variable) -> Result<Attributes> {
    let mut attributes = Vec::new();
    for attr in var.attributes() {
        let name = attr.name().to_string();
        if is_private_attribute(&name) {
            continue;
        }
        attributes.push((name, attr.value()?));
    }
    Ok(attributes)
}

/// Global attributes of a file, in file order.
pub fn global_attributes(file: &File) -> Result<Attributes> {
    let mut attributes = Vec::new();
    for attr in file.attributes() {
        attributes.push((attr.name().to_string(), attr.value()?));
    }
    Ok(attributes)
}

/// Value of a string attribute, if present and a string.
pub fn string_attribute<'a>(attributes: &'a Attributes, name: &str) -> Option<&'a str> {
    attributes.iter().find(|(n, _)| n == name).and_then(|(_, v)| match v {
        AttributeValue::Str(s) => Some(s.as_str()),
        _ => None,
    })
}

/// Prints a summary of a climatology file: season, time axis and variables.
pub fn print_output_summary(path: &Path) -> Result<()> {
    let file = netcdf::open(path)?;
    let globals = global_attributes(&file)?;

    println!("\n Climatology: {}", path.display());
    println!("={}", "=".repeat(path.display().to_string().len() + 14));

    if let Some(season) = string_attribute(&globals, "season") {
        println!(" Season: {season}");
    }
    if let Some(conventions) = string_attribute(&globals, "Conventions") {
        println!(" Conventions: {conventions}");
    }

    let time = TimeAxisInfo::read(&file)?;
    let values: Vec<f64> = match file.variable(TIME_DIM) {
        Some(var) => var.get_values::<f64, _>(..)?,
        None => Vec::new(),
    };
    println!(
        " Time: {:?} ({})",
        values,
        time.units.as_deref().unwrap_or("no units")
    );
    for name in [time.bounds_name.as_str(), TIME_WEIGHTS_VAR, TIME_CLIMO_VAR] {
        if let Some(var) = file.variable(name) {
            println!("    {name}: {:?}", var.get_values::<f64, _>(..)?);
        }
    }

    let mut variables: Vec<_> = file
        .variables()
        .map(|v| {
            let dims: Vec<String> = v.dimensions().iter().map(|d| d.name().to_string()).collect();
            (v.name().to_string(), dims)
        })
        .collect();
    variables.sort();

    println!("\n Variables ({})", variables.len());
    for (name, dims) in variables {
        if dims.is_empty() {
            println!("    {name}: scalar");
        } else {
            println!("    {name}: [{}]", dims.join(", "));
        }
    }

    Ok(())
}
