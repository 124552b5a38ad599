use climos::{
    config::{RunConfig, VariableSelection},
    container::{ContainerState, ValueKind, VarValues},
    errors::ClimoError,
    pipeline::{run_climatologies, RunSummary, SeasonOutcome},
    reduction::{hold_bounds, NetcdfAccumulator, SeasonalAccumulator},
    season::Season,
};
use ndarray::{arr0, Array2};
use netcdf::{create, open, AttributeValue};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const MONTH_STARTS: [f64; 13] = [
    0.0, 31.0, 59.0, 90.0, 120.0, 151.0, 181.0, 212.0, 243.0, 273.0, 304.0, 334.0, 365.0,
];

const FILL: f32 = 1.0e36;

/// Writes one monthly mean file with `TS = [ts, ts + 1]` over two latitudes.
fn write_month(dir: &Path, year: i32, month: usize, ts: f32, calendar: &str) -> PathBuf {
    write_month_values(dir, year, month, [ts, ts + 1.0], calendar)
}

fn write_month_values(
    dir: &Path,
    year: i32,
    month: usize,
    ts: [f32; 2],
    calendar: &str,
) -> PathBuf {
    let path = dir.join(format!("cam.h0.{year:04}-{month:02}.nc"));
    let year_start = f64::from(year - 1) * 365.0;
    let (lower, upper) = (
        year_start + MONTH_STARTS[month - 1],
        year_start + MONTH_STARTS[month],
    );

    let mut file = create(&path).expect("Failed to create NetCDF file");
    file.add_attribute("case", "b40.integration").unwrap();
    file.add_dimension("time", 1).unwrap();
    file.add_dimension("nbnd", 2).unwrap();
    file.add_dimension("lat", 2).unwrap();

    {
        let mut time = file.add_variable::<f64>("time", &["time"]).unwrap();
        time.put_attribute("units", "days since 0001-01-01 00:00:00").unwrap();
        time.put_attribute("calendar", calendar).unwrap();
        time.put_attribute("bounds", "time_bnds").unwrap();
        time.put_values(&[upper], ..).unwrap();
    }
    {
        let mut bnds = file
            .add_variable::<f64>("time_bnds", &["time", "nbnd"])
            .unwrap();
        bnds.put_values(&[lower, upper], ..).unwrap();
    }
    {
        let mut gw = file.add_variable::<f64>("gw", &["lat"]).unwrap();
        gw.put_values(&[0.25, 0.75], ..).unwrap();
    }
    {
        let mut p0 = file.add_variable::<f64>("P0", &[]).unwrap();
        p0.put(arr0(100_000.0).view(), &[] as &[usize]).unwrap();
    }
    {
        let mut var = file.add_variable::<f32>("TS", &["time", "lat"]).unwrap();
        var.put_attribute("_FillValue", FILL).unwrap();
        var.put_attribute("units", "K").unwrap();
        let data = Array2::from_shape_vec((1, 2), ts.to_vec()).unwrap();
        var.put(data.view(), ..).unwrap();
    }
    {
        let mut date = file.add_variable::<i32>("date", &["time"]).unwrap();
        date.put_values(&[year * 10_000 + month as i32 * 100 + 1], ..)
            .unwrap();
    }

    path
}

fn run(files: Vec<PathBuf>, output: &Path, seasons: &[&str]) -> climos::Result<RunSummary> {
    let config = RunConfig::new(
        files,
        output.to_string_lossy(),
        seasons.iter().map(|s| s.to_string()).collect(),
        VariableSelection::All,
    )?;
    run_climatologies(&config, &NetcdfAccumulator::new())
}

fn values(file: &netcdf::File, name: &str) -> Vec<f64> {
    file.variable(name)
        .unwrap_or_else(|| panic!("{name} missing"))
        .get_values::<f64, _>(..)
        .unwrap()
}

#[test]
fn accumulator_leaves_december_apart_from_january_february() {
    let dir = tempdir().expect("Failed to create temp dir");
    let files = vec![
        write_month(dir.path(), 2001, 12, 10.0, "noleap"),
        write_month(dir.path(), 2002, 1, 20.0, "noleap"),
        write_month(dir.path(), 2002, 2, 30.0, "noleap"),
    ];
    let djf = Season::lookup("DJF").unwrap();
    let accumulator = NetcdfAccumulator::new();

    let mut container = accumulator
        .initialize(&files[0], &VariableSelection::All, &djf)
        .unwrap();
    assert_eq!(container.time_axis().units, "days since 0");
    assert!(container.variable("time_bnds").is_none());
    assert_eq!(container.variable("TS").unwrap().kind, ValueKind::Float32);
    assert!(!container.variable("gw").unwrap().has_time);

    container.advance(ContainerState::Accumulating).unwrap();
    let extent = accumulator
        .fold_files(&mut container, &files, hold_bounds)
        .unwrap();

    assert_eq!((extent.min, extent.max), (730_334.0, 730_424.0));
    assert_eq!(container.bounds(), &[[334.0, 365.0], [0.0, 59.0]]);
    assert_eq!(container.weights(), &[31.0, 59.0]);
    assert_eq!(container.time_values()[0], 349.5);
    assert!((container.time_values()[1] - 29.5).abs() < 1e-9);

    let VarValues::Float(ts) = &container.variable("TS").unwrap().values else {
        panic!("TS should be a float series");
    };
    assert_eq!(ts.shape(), &[2, 2]);
    assert_eq!(ts[[0, 0]], 10.0);
    assert!((ts[[1, 0]] - (20.0 * 31.0 + 30.0 * 28.0) / 59.0).abs() < 1e-9);
    assert_eq!(
        container.variable("date").unwrap().values,
        VarValues::Int(ndarray::arr1(&[20_011_201, 20_020_101]).into_dyn())
    );
}

fn two_winters(dir: &Path) -> Vec<PathBuf> {
    vec![
        write_month(dir, 2001, 12, 10.0, "noleap"),
        write_month(dir, 2002, 1, 20.0, "noleap"),
        write_month(dir, 2002, 2, 30.0, "noleap"),
        write_month(dir, 2002, 12, 40.0, "noleap"),
        write_month(dir, 2003, 1, 50.0, "noleap"),
        write_month(dir, 2003, 2, 60.0, "noleap"),
    ]
}

#[test]
fn second_year_folds_into_the_same_slices() {
    let dir = tempdir().expect("Failed to create temp dir");
    let files = two_winters(dir.path());
    let djf = Season::lookup("DJF").unwrap();
    let accumulator = NetcdfAccumulator::new();

    let mut container = accumulator
        .initialize(&files[0], &VariableSelection::All, &djf)
        .unwrap();
    container.advance(ContainerState::Accumulating).unwrap();
    let extent = accumulator
        .fold_files(&mut container, &files, hold_bounds)
        .unwrap();

    assert_eq!((extent.min, extent.max), (730_334.0, 730_789.0));
    assert_eq!(container.bounds(), &[[334.0, 365.0], [0.0, 59.0]]);
    assert_eq!(container.weights(), &[62.0, 118.0]);
    assert_eq!(container.time_values()[0], 349.5);
    assert!((container.time_values()[1] - 29.5).abs() < 1e-9);

    let VarValues::Float(ts) = &container.variable("TS").unwrap().values else {
        panic!("TS should be a float series");
    };
    let jan_feb = (20.0 * 31.0 + 30.0 * 28.0 + 50.0 * 31.0 + 60.0 * 28.0) / 118.0;
    assert!((ts[[0, 0]] - 25.0).abs() < 1e-9);
    assert!((ts[[0, 1]] - 26.0).abs() < 1e-9);
    assert!((ts[[1, 0]] - jan_feb).abs() < 1e-9);
    assert_eq!(
        container.variable("date").unwrap().values,
        VarValues::Int(ndarray::arr1(&[20_011_201, 20_020_101]).into_dyn())
    );
}

#[test]
fn two_winters_merge_into_one_climatology() {
    let dir = tempdir().expect("Failed to create temp dir");
    let files = two_winters(dir.path());
    let output = dir.path().join("djf.nc");

    let summary = run(files, &output, &["DJF"]).unwrap();
    assert!(matches!(summary.outcome("DJF"), Some(SeasonOutcome::Written(_))));

    let file = open(&output).unwrap();
    assert_eq!(values(&file, "time_weights"), vec![180.0]);
    let time = values(&file, "time");
    assert!((time[0] - 730_379.0).abs() < 1e-6, "time = {}", time[0]);
    assert_eq!(values(&file, "time_bnds"), vec![730_334.0, 730_424.0]);
    assert_eq!(values(&file, "time_climo"), vec![730_334.0, 730_789.0]);

    let expected = (25.0 * 62.0 + 20.0 * 31.0 + 30.0 * 28.0 + 50.0 * 31.0 + 60.0 * 28.0) / 180.0;
    let ts = values(&file, "TS");
    assert!((ts[0] - expected).abs() < 1e-4, "TS = {}", ts[0]);
    let date = file.variable("date").unwrap().get_values::<i32, _>(..).unwrap();
    assert_eq!(date, vec![20_011_201]);
}

#[test]
fn missing_cells_stay_missing_in_the_climatology() {
    let dir = tempdir().expect("Failed to create temp dir");
    let files = vec![
        write_month_values(dir.path(), 2001, 12, [10.0, 11.0], "noleap"),
        write_month_values(dir.path(), 2002, 1, [FILL, 21.0], "noleap"),
        write_month_values(dir.path(), 2002, 2, [30.0, 31.0], "noleap"),
    ];
    let output = dir.path().join("djf.nc");

    run(files, &output, &["DJF"]).unwrap();

    let file = open(&output).unwrap();
    let ts = values(&file, "TS");
    assert_eq!(ts[0], f64::from(FILL));
    let expected = (11.0 * 31.0 + 21.0 * 31.0 + 31.0 * 28.0) / 90.0;
    assert!((ts[1] - expected).abs() < 1e-4, "TS = {}", ts[1]);
    match file
        .variable("TS")
        .unwrap()
        .attribute("_FillValue")
        .unwrap()
        .value()
        .unwrap()
    {
        AttributeValue::Float(fill) => assert_eq!(fill, FILL),
        other => panic!("unexpected _FillValue {other:?}"),
    }
}

#[test]
fn djf_climatology_end_to_end() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut files = vec![
        write_month(dir.path(), 2002, 2, 30.0, "noleap"),
        write_month(dir.path(), 2001, 12, 10.0, "noleap"),
        write_month(dir.path(), 2002, 6, 99.0, "noleap"),
        write_month(dir.path(), 2002, 1, 20.0, "noleap"),
    ];
    files.rotate_left(1);
    let output = dir.path().join("climo_XXX.nc");

    let summary = run(files, &output, &["DJF"]).unwrap();
    let djf_path = dir.path().join("climo_DJF.nc");
    assert_eq!(summary.outcome("DJF"), Some(&SeasonOutcome::Written(djf_path.clone())));

    let file = open(&djf_path).unwrap();
    assert_eq!(values(&file, "time"), vec![730_379.0]);
    assert_eq!(values(&file, "time_bnds"), vec![730_334.0, 730_424.0]);
    assert_eq!(values(&file, "time_weights"), vec![90.0]);
    assert_eq!(values(&file, "time_climo"), vec![730_334.0, 730_424.0]);

    let ts = values(&file, "TS");
    let expected = (10.0 * 31.0 + 20.0 * 31.0 + 30.0 * 28.0) / 90.0;
    assert!((ts[0] - expected).abs() < 1e-4, "TS = {}", ts[0]);
    assert!((ts[1] - (expected + 1.0)).abs() < 1e-4);

    assert_eq!(values(&file, "gw"), vec![0.25, 0.75]);
    assert_eq!(values(&file, "P0"), vec![100_000.0]);
    let date = file.variable("date").unwrap().get_values::<i32, _>(..).unwrap();
    assert_eq!(date, vec![20_011_201]);

    let time = file.variable("time").unwrap();
    match time.attribute("units").unwrap().value().unwrap() {
        AttributeValue::Str(units) => assert_eq!(units, "days since 0001-01-01 00:00:00"),
        other => panic!("unexpected units {other:?}"),
    }
    match file.attribute("season").unwrap().value().unwrap() {
        AttributeValue::Str(season) => assert_eq!(season, "DJF"),
        other => panic!("unexpected season {other:?}"),
    }

    // The pre-merge output is kept aside with both slices.
    let backup = open(dir.path().join("climo_DJF.old.nc")).unwrap();
    assert_eq!(backup.dimension("time").unwrap().len(), 2);
}

#[test]
fn annual_mean_of_one_year_is_one_slice() {
    let dir = tempdir().expect("Failed to create temp dir");
    let files: Vec<PathBuf> = (1..=12)
        .map(|m| write_month(dir.path(), 1, m, m as f32, "noleap"))
        .collect();
    let output = dir.path().join("ann.nc");

    let summary = run(files, &output, &["ANN"]).unwrap();
    assert!(matches!(summary.outcome("ANN"), Some(SeasonOutcome::Written(_))));

    let file = open(&output).unwrap();
    let time = values(&file, "time");
    assert_eq!(time.len(), 1);
    assert!((time[0] - 182.5).abs() < 1e-6);
    assert_eq!(values(&file, "time_bnds"), vec![0.0, 365.0]);
    assert_eq!(values(&file, "time_weights"), vec![365.0]);
    assert!(!dir.path().join("ann.old.nc").exists());

    let expected: f64 = (1..=12)
        .map(|m| f64::from(m) * (MONTH_STARTS[m as usize] - MONTH_STARTS[m as usize - 1]))
        .sum::<f64>()
        / 365.0;
    assert!((values(&file, "TS")[0] - expected).abs() < 1e-4);
}

#[test]
fn other_calendars_produce_no_output() {
    let dir = tempdir().expect("Failed to create temp dir");
    let files = vec![
        write_month(dir.path(), 1, 12, 1.0, "360_day"),
        write_month(dir.path(), 2, 1, 2.0, "360_day"),
    ];
    let output = dir.path().join("out_XXX.nc");

    let err = run(files, &output, &["DJF", "ANN"]).unwrap_err();
    assert!(matches!(err, ClimoError::FatalPrecondition { .. }));
    assert!(!dir.path().join("out_DJF.nc").exists());
    assert!(!dir.path().join("out_ANN.nc").exists());
}

#[test]
fn requested_variables_only() {
    let dir = tempdir().expect("Failed to create temp dir");
    let files = vec![write_month(dir.path(), 3, 7, 5.0, "noleap")];
    let output = dir.path().join("jul.nc");
    let config = RunConfig::new(
        files,
        output.to_string_lossy(),
        vec!["JUL".to_string()],
        VariableSelection::Named(vec!["TS".to_string(), "NOT_THERE".to_string()]),
    )
    .unwrap();

    run_climatologies(&config, &NetcdfAccumulator::new()).unwrap();

    let file = open(&output).unwrap();
    assert!(file.variable("TS").is_some());
    assert!(file.variable("gw").is_none());
    assert!(file.variable("NOT_THERE").is_none());
    assert_eq!(values(&file, "time_bnds"), vec![2.0 * 365.0 + 181.0, 2.0 * 365.0 + 212.0]);
}
