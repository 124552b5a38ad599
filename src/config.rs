//! Run configuration
//!
//! A [`RunConfig`] is built once, from the command line or from a JSON job
//! request, and threaded through the whole run. It holds the input files, the
//! output file template, the seasons, the variable selection and the files to
//! leave out of each season.

use crate::errors::{ClimoError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Token of the output template replaced by the season identifier.
pub const SEASON_PLACEHOLDER: &str = "XXX";

/// Variable name selecting every variable of the input.
pub const ALL_VARIABLES: &str = "ALL";

/// Variable name selecting the [`AMWG_VARIABLES`] preset.
pub const AMWG_PRESET: &str = "AMWG";

/// Legacy preset of variables used by the AMWG diagnostics.
pub const AMWG_VARIABLES: &[&str] = &[
    "ANRAIN", "ANSNOW", "AODDUST1", "AODDUST3", "AODVIS", "AQRAIN", "AQSNOW", "AREI", "AREL",
    "AWNC", "AWNI", "CCN3", "CDNUMC", "CLDHGH", "CLDICE", "CLDLIQ", "CLDLOW", "CLDMED", "CLDTOT",
    "CLOUD", "DCQ", "DTCOND", "DTV", "FICE", "FLDS", "FLNS", "FLNSC", "FLNT", "FLNTC", "FLUT",
    "FLUTC", "FREQI", "FREQL", "FREQR", "FREQS", "FSDS", "FSDSC", "FSNS", "FSNSC", "FSNT",
    "FSNTC", "FSNTOA", "FSNTOAC", "ICEFRAC", "ICIMR", "ICWMR", "IWC", "LANDFRAC", "LHFLX", "LWCF",
    "NUMICE", "NUMLIQ", "OCNFRAC", "OMEGA", "OMEGAT", "PBLH", "PRECC", "PRECL", "PRECSC",
    "PRECSL", "PS", "PSL", "Q", "QFLX", "QRL", "QRS", "RELHUM", "SHFLX", "SNOWHICE", "SNOWHLND",
    "SOLIN", "SWCF", "T", "TAUX", "TAUY", "TGCLDIWP", "TGCLDLWP", "TMQ", "TREFHT", "TS", "U",
    "U10", "UU", "V", "VD01", "VQ", "VT", "VU", "VV", "WSUB", "Z3", "P0", "time_bnds", "area",
    "hyai", "hyam", "hybi", "hybm", "lat", "lon",
];

/// Which variables of the input end up in the climatology
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSelection {
    All,
    Amwg,
    Named(Vec<String>),
}

impl VariableSelection {
    /// An empty list or one containing `ALL` selects everything; exactly `["AMWG"]`
    /// selects the preset.
    pub fn from_names(names: &[String]) -> Self {
        if names.is_empty() || names.iter().any(|n| n == ALL_VARIABLES) {
            Self::All
        } else if names.len() == 1 && names[0] == AMWG_PRESET {
            Self::Amwg
        } else {
            Self::Named(names.to_vec())
        }
    }

    /// The selected names among `available`, in the order of `available`.
    pub fn resolve(&self, available: &[String]) -> Vec<String> {
        match self {
            Self::All => available.to_vec(),
            Self::Amwg => {
                let selected: Vec<String> = available
                    .iter()
                    .filter(|name| AMWG_VARIABLES.contains(&name.as_str()))
                    .cloned()
                    .collect();
                debug!(
                    "AMWG preset matched {} of {} variables",
                    selected.len(),
                    AMWG_VARIABLES.len()
                );
                selected
            }
            Self::Named(names) => {
                for missing in names.iter().filter(|n| !available.contains(n)) {
                    warn!("requested variable '{missing}' is not in the input, skipping it");
                }
                available
                    .iter()
                    .filter(|name| names.contains(name))
                    .cloned()
                    .collect()
            }
        }
    }
}

/// Files to leave out, by season identifier.
pub type OmitMap = BTreeMap<String, Vec<String>>;

/// Everything a run needs to know
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub files: Vec<PathBuf>,
    pub output_template: String,
    pub seasons: Vec<String>,
    pub variables: VariableSelection,
    pub omit: OmitMap,
}

impl RunConfig {
    pub fn new(
        files: Vec<PathBuf>,
        output_template: impl Into<String>,
        seasons: Vec<String>,
        variables: VariableSelection,
    ) -> Result<Self> {
        let output_template = output_template.into();
        if files.is_empty() {
            return Err(ClimoError::ConfigError("no input files".to_string()));
        }
        if seasons.is_empty() {
            return Err(ClimoError::ConfigError("no seasons requested".to_string()));
        }
        if seasons.len() > 1 && !output_template.contains(SEASON_PLACEHOLDER) {
            return Err(ClimoError::ConfigError(format!(
                "output '{output_template}' must contain {SEASON_PLACEHOLDER} \
                 to hold {} seasons",
                seasons.len()
            )));
        }
        Ok(Self {
            files,
            output_template,
            seasons,
            variables,
            omit: OmitMap::new(),
        })
    }

    pub fn with_omissions(mut self, omit: OmitMap) -> Self {
        self.omit = omit;
        self
    }

    /// Output file of a season.
    pub fn output_path(&self, season: &str) -> PathBuf {
        PathBuf::from(self.output_template.replace(SEASON_PLACEHOLDER, season))
    }

    /// Input files minus the ones omitted for `season`, matched on full path or
    /// file name.
    pub fn files_for_season(&self, season: &str) -> Vec<PathBuf> {
        let Some(omitted) = self.omit.get(season) else {
            return self.files.clone();
        };
        self.files
            .iter()
            .filter(|path| {
                let full = path.to_string_lossy();
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy())
                    .unwrap_or_default();
                !omitted.iter().any(|o| *o == full || *o == name)
            })
            .cloned()
            .collect()
    }
}

/// A job request as submitted by the job server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimoRequest {
    pub in_dir: PathBuf,
    pub out_filename: String,
    #[serde(default)]
    pub seasons: Vec<String>,
    #[serde(default)]
    pub variables: Vec<String>,
}

impl ClimoRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Every `*.nc` file of `in_dir` in, `out_filename` next to `in_dir` out.
    pub fn into_config(self) -> Result<RunConfig> {
        let files = list_netcdf_files(&self.in_dir)?;
        let parent = self
            .in_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let output = parent.join(&self.out_filename);
        RunConfig::new(
            files,
            output.to_string_lossy(),
            self.seasons,
            VariableSelection::from_names(&self.variables),
        )
    }
}

/// Sorted `*.nc` files of a directory.
pub fn list_netcdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "nc") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parses `a,b,c` or a JSON list `["a", "b", "c"]`.
pub fn parse_name_list(text: &str) -> Result<Vec<String>> {
    let text = text.trim();
    if text.starts_with('[') {
        return Ok(serde_json::from_str(text)?);
    }
    Ok(text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OmitFile {
    BySeason(OmitMap),
    /// `[[season, file, file, ...], ...]`
    Lists(Vec<Vec<String>>),
}

/// Reads a JSON omit file: an object of season to files, or a list of
/// `[season, files...]` lists.
pub fn read_omit_file(path: &Path) -> Result<OmitMap> {
    parse_omit_json(&fs::read_to_string(path)?)
}

fn parse_omit_json(json: &str) -> Result<OmitMap> {
    Ok(match serde_json::from_str(json)? {
        OmitFile::BySeason(map) => map,
        OmitFile::Lists(lists) => {
            let mut map = OmitMap::new();
            for list in lists {
                let mut items = list.into_iter();
                let Some(season) = items.next() else {
                    continue;
                };
                map.entry(season).or_default().extend(items);
            }
            map
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn selection_sentinels() {
        assert_eq!(VariableSelection::from_names(&[]), VariableSelection::All);
        assert_eq!(
            VariableSelection::from_names(&names(&["TS", "ALL"])),
            VariableSelection::All
        );
        assert_eq!(
            VariableSelection::from_names(&names(&["AMWG"])),
            VariableSelection::Amwg
        );
        assert_eq!(
            VariableSelection::from_names(&names(&["AMWG", "TS"])),
            VariableSelection::Named(names(&["AMWG", "TS"]))
        );
    }

    #[test]
    fn resolve_keeps_input_order_and_skips_missing() {
        let available = names(&["lat", "lon", "TS", "PS", "gw"]);
        let named = VariableSelection::Named(names(&["PS", "NOPE", "TS"]));
        assert_eq!(named.resolve(&available), names(&["TS", "PS"]));
        assert_eq!(
            VariableSelection::Amwg.resolve(&available),
            names(&["lat", "lon", "TS", "PS"])
        );
        assert_eq!(VariableSelection::All.resolve(&available), available);
    }

    #[test]
    fn output_template_needs_placeholder_for_many_seasons() {
        let files = vec![PathBuf::from("a.0001-01.nc")];
        let err = RunConfig::new(
            files.clone(),
            "out.nc",
            names(&["DJF", "JJA"]),
            VariableSelection::All,
        )
        .unwrap_err();
        assert!(matches!(err, ClimoError::ConfigError(_)));

        let single = RunConfig::new(files.clone(), "out.nc", names(&["ANN"]), VariableSelection::All)
            .unwrap();
        assert_eq!(single.output_path("ANN"), PathBuf::from("out.nc"));

        let many =
            RunConfig::new(files, "out_XXX_climo.nc", names(&["DJF", "JJA"]), VariableSelection::All)
                .unwrap();
        assert_eq!(many.output_path("DJF"), PathBuf::from("out_DJF_climo.nc"));
    }

    #[test]
    fn omissions_match_full_path_or_file_name() {
        let files = vec![
            PathBuf::from("/run/a.0001-01.nc"),
            PathBuf::from("/run/a.0001-02.nc"),
            PathBuf::from("/run/a.0001-12.nc"),
        ];
        let mut omit = OmitMap::new();
        omit.insert(
            "DJF".to_string(),
            names(&["a.0001-01.nc", "/run/a.0001-12.nc"]),
        );
        let config = RunConfig::new(files.clone(), "o_XXX.nc", names(&["DJF", "ANN"]), VariableSelection::All)
            .unwrap()
            .with_omissions(omit);

        assert_eq!(
            config.files_for_season("DJF"),
            vec![PathBuf::from("/run/a.0001-02.nc")]
        );
        assert_eq!(config.files_for_season("ANN"), files);
    }

    #[test]
    fn name_lists_accept_commas_or_json() {
        assert_eq!(parse_name_list("DJF, JJA,,ANN").unwrap(), names(&["DJF", "JJA", "ANN"]));
        assert_eq!(parse_name_list(r#"["TS","PS"]"#).unwrap(), names(&["TS", "PS"]));
        assert!(parse_name_list("[TS").is_err());
        assert!(parse_name_list("").unwrap().is_empty());
    }

    #[test]
    fn omit_json_in_both_layouts() {
        let by_season = parse_omit_json(r#"{"DJF": ["x.0001-12.nc"]}"#).unwrap();
        let lists = parse_omit_json(r#"[["DJF", "x.0001-12.nc"], ["JJA"]]"#).unwrap();
        assert_eq!(by_season["DJF"], names(&["x.0001-12.nc"]));
        assert_eq!(lists["DJF"], by_season["DJF"]);
        assert!(lists["JJA"].is_empty());
    }

    #[test]
    fn request_puts_output_next_to_input_dir() -> Result<()> {
        let root = tempdir()?;
        let in_dir = root.path().join("monthly");
        fs::create_dir(&in_dir)?;
        for name in ["m.0001-02.nc", "m.0001-01.nc", "notes.txt"] {
            fs::write(in_dir.join(name), b"")?;
        }

        let json = format!(
            r#"{{"in_dir": {:?}, "out_filename": "m_XXX_climo.nc", "seasons": ["DJF", "MAM"], "variables": ["AMWG"]}}"#,
            in_dir.to_string_lossy()
        );
        let config = ClimoRequest::from_json(&json)?.into_config()?;

        assert_eq!(
            config.files,
            vec![in_dir.join("m.0001-01.nc"), in_dir.join("m.0001-02.nc")]
        );
        assert_eq!(config.output_path("MAM"), root.path().join("m_MAM_climo.nc"));
        assert_eq!(config.variables, VariableSelection::Amwg);
        Ok(())
    }
}
