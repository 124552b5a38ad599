//! Final fix-ups of a season's container before it is written
//!
//! During reduction the time axis counts days into a climatological year
//! (`days since 0`). CF section 7.4 wants the time of a climatology in the
//! units of the data it came from, with the span of that data alongside, so the
//! axis is moved back here. Global attributes are stamped from a declarative
//! rule list.

use crate::container::{Attributes, ContainerState, OutputContainer, TimeExtent};
use crate::errors::{ClimoError, Result};
use chrono::{DateTime, Utc};
use netcdf::AttributeValue;
use std::path::PathBuf;

/// Conventions tag of every climatology file.
pub const CONVENTIONS: &str = "CF-1.7";

/// Line added to the history attribute.
pub const PROVENANCE: &str = "climatologies computed by climos";

/// Long name of the time axis once it is back in data units.
pub const TIME_LONG_NAME: &str = "time";

/// Moves the time axis from climatological to data units.
///
/// Time values and bounds are shifted so that the first slice starts at
/// `extent.min`, and `extent` is kept as the climatology span.
pub fn normalize_time_axis(
    container: &mut OutputContainer,
    extent: TimeExtent,
    data_units: &str,
) -> Result<()> {
    if container.state() != ContainerState::Normalizing {
        return Err(ClimoError::InvalidState {
            from: container.state().to_string(),
            to: "normalized".to_string(),
        });
    }
    let Some(first) = container.bounds().first().copied() else {
        return Err(ClimoError::UnsupportedSliceCount {
            season: container.season().to_string(),
            count: 0,
        });
    };

    let delta = extent.min - first[0];
    container.shift_time(delta)?;
    container.set_time_units(data_units, TIME_LONG_NAME)?;
    container.set_climo_extent(extent)
}

/// One change to a set of global attributes
#[derive(Debug, Clone)]
pub enum AttributeRule {
    Drop(String),
    /// Append `text` after `separator` to a string attribute, or create it.
    AppendOrCreate {
        name: String,
        text: String,
        separator: String,
    },
    Set {
        name: String,
        value: AttributeValue,
    },
}

/// Applies `rules` in order.
pub fn apply_rules(attributes: &mut Attributes, rules: &[AttributeRule]) {
    for rule in rules {
        match rule {
            AttributeRule::Drop(name) => attributes.retain(|(n, _)| n != name),
            AttributeRule::AppendOrCreate {
                name,
                text,
                separator,
            } => {
                let value = match attributes.iter().find(|(n, _)| n == name) {
                    Some((_, AttributeValue::Str(old))) => format!("{old}{separator}{text}"),
                    _ => text.clone(),
                };
                set_attribute(attributes, name, AttributeValue::Str(value));
            }
            AttributeRule::Set { name, value } => set_attribute(attributes, name, value.clone()),
        }
    }
}

fn set_attribute(attributes: &mut Attributes, name: &str, value: AttributeValue) {
    match attributes.iter_mut().find(|(n, _)| n == name) {
        Some((_, slot)) => *slot = value,
        None => attributes.push((name.to_string(), value)),
    }
}

/// Global attribute rules of a season's climatology.
pub fn climatology_rules(
    sources: &[PathBuf],
    season: &str,
    stamped_at: DateTime<Utc>,
) -> Vec<AttributeRule> {
    let source_list = sources
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        AttributeRule::Drop("Conventions".to_string()),
        AttributeRule::AppendOrCreate {
            name: "history".to_string(),
            text: format!("{}: {PROVENANCE}", stamped_at.to_rfc3339()),
            separator: "\n".to_string(),
        },
        AttributeRule::AppendOrCreate {
            name: "source".to_string(),
            text: format!("[{source_list}]"),
            separator: ", climatologies from ".to_string(),
        },
        AttributeRule::Set {
            name: "Conventions".to_string(),
            value: AttributeValue::Str(CONVENTIONS.to_string()),
        },
        AttributeRule::Set {
            name: "season".to_string(),
            value: AttributeValue::Str(season.to_string()),
        },
    ]
}

/// Replaces the container's global attributes with the input's, stamped for
/// this climatology.
pub fn stamp_global_attributes(
    container: &mut OutputContainer,
    input_globals: &Attributes,
    sources: &[PathBuf],
    season: &str,
) -> Result<()> {
    let mut attributes = input_globals.clone();
    apply_rules(&mut attributes, &climatology_rules(sources, season, Utc::now()));
    container.set_global_attributes(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::TimeAxis;
    use crate::metadata::string_attribute;
    use chrono::TimeZone;

    fn merged_djf() -> OutputContainer {
        let axis = TimeAxis {
            units: "days since 0".to_string(),
            calendar: "noleap".to_string(),
            long_name: "climatological time".to_string(),
            bounds_name: "time_bnds".to_string(),
            attributes: Vec::new(),
        };
        let mut c = OutputContainer::new("DJF", axis, "nbnd");
        c.advance(ContainerState::Accumulating).unwrap();
        c.push_slice(14.0, [-31.0, 59.0], 90.0).unwrap();
        c.advance(ContainerState::Merging).unwrap();
        c
    }

    #[test]
    fn time_moves_back_to_data_units() {
        let mut c = merged_djf();
        c.advance(ContainerState::Normalizing).unwrap();
        let extent = TimeExtent::new(730_334.0, 730_424.0);
        normalize_time_axis(&mut c, extent, "days since 0001-01-01 00:00:00").unwrap();

        assert_eq!(c.time_values(), &[730_379.0]);
        assert_eq!(c.bounds(), &[[730_334.0, 730_424.0]]);
        assert_eq!(c.time_axis().units, "days since 0001-01-01 00:00:00");
        assert_eq!(c.time_axis().long_name, "time");
        assert_eq!(c.climo_extent(), Some(extent));
    }

    #[test]
    fn normalizing_needs_the_normalizing_state() {
        let mut c = merged_djf();
        let err = normalize_time_axis(&mut c, TimeExtent::new(0.0, 1.0), "days since 0001-01-01");
        assert!(matches!(err, Err(ClimoError::InvalidState { .. })));
        assert_eq!(c.time_values(), &[14.0]);
    }

    #[test]
    fn rules_drop_append_and_set() {
        let mut attrs: Attributes = vec![
            ("Conventions".to_string(), AttributeValue::Str("CF-1.0".to_string())),
            ("history".to_string(), AttributeValue::Str("created".to_string())),
            ("case".to_string(), AttributeValue::Str("b40".to_string())),
        ];
        let stamped_at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let sources = vec![PathBuf::from("a.0001-12.nc"), PathBuf::from("a.0002-01.nc")];
        apply_rules(&mut attrs, &climatology_rules(&sources, "DJF", stamped_at));

        assert_eq!(
            string_attribute(&attrs, "history"),
            Some("created\n2026-01-02T03:04:05+00:00: climatologies computed by climos")
        );
        assert_eq!(
            string_attribute(&attrs, "source"),
            Some("[a.0001-12.nc, a.0002-01.nc]")
        );
        assert_eq!(string_attribute(&attrs, "Conventions"), Some("CF-1.7"));
        assert_eq!(string_attribute(&attrs, "season"), Some("DJF"));
        assert_eq!(string_attribute(&attrs, "case"), Some("b40"));
        assert_eq!(attrs.iter().filter(|(n, _)| n == "Conventions").count(), 1);
    }

    #[test]
    fn existing_source_is_extended() {
        let mut attrs: Attributes = vec![(
            "source".to_string(),
            AttributeValue::Str("CAM".to_string()),
        )];
        apply_rules(
            &mut attrs,
            &climatology_rules(&[PathBuf::from("x.0001-07.nc")], "JUL", Utc::now()),
        );
        assert_eq!(
            string_attribute(&attrs, "source"),
            Some("CAM, climatologies from [x.0001-07.nc]")
        );
    }

    #[test]
    fn stamping_finalized_container_fails() {
        let mut c = merged_djf();
        c.advance(ContainerState::Normalizing).unwrap();
        c.advance(ContainerState::Finalized).unwrap();
        assert!(stamp_global_attributes(&mut c, &Vec::new(), &[], "DJF").is_err());
    }
}
