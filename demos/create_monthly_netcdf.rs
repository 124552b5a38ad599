//! Creates a set of monthly NetCDF files for trying out climos.
//!
//! Writes two years of noleap monthly means, `monthly_data/demo.cam.h0.YYYY-MM.nc`,
//! with a surface temperature following a seasonal cycle, an integer date and
//! a few time-independent fields.

use ndarray::{arr0, Array2};
use netcdf::create;
use std::path::Path;

const MONTH_STARTS: [f64; 13] = [
    0.0, 31.0, 59.0, 90.0, 120.0, 151.0, 181.0, 212.0, 243.0, 273.0, 304.0, 334.0, 365.0,
];
const N_LAT: usize = 6;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = Path::new("monthly_data");
    std::fs::create_dir_all(out_dir)?;

    println!("🔨 Creating monthly NetCDF files in {}", out_dir.display());

    let mut count = 0;
    for year in 1..=2 {
        for month in 1..=12usize {
            let path = out_dir.join(format!("demo.cam.h0.{year:04}-{month:02}.nc"));
            write_month(&path, year, month)?;
            count += 1;
        }
    }

    println!("✅ Successfully created {count} monthly files with:");
    println!("   📏 Dimensions: time(1), nbnd(2), lat({N_LAT})");
    println!("   📈 Variables: time, time_bnds, lat, gw, P0, TS, date");
    println!("\n🧪 Compute DJF and JJA climatologies with:");
    println!("   cargo run -- --input-dir monthly_data -o demo_XXX_climo.nc --seasons DJF,JJA");

    Ok(())
}

fn write_month(path: &Path, year: usize, month: usize) -> Result<(), Box<dyn std::error::Error>> {
    // Days since 0001-01-01 in the noleap calendar.
    let year_start = (year - 1) as f64 * 365.0;
    let lower = year_start + MONTH_STARTS[month - 1];
    let upper = year_start + MONTH_STARTS[month];

    let mut file = create(path)?;
    file.add_attribute("title", "climos demo monthly mean")?;
    file.add_attribute("source", "CAM")?;
    file.add_attribute("Conventions", "CF-1.0")?;

    file.add_dimension("time", 1)?;
    file.add_dimension("nbnd", 2)?;
    file.add_dimension("lat", N_LAT)?;

    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "days since 0001-01-01 00:00:00")?;
        time.put_attribute("calendar", "noleap")?;
        time.put_attribute("long_name", "time")?;
        time.put_attribute("bounds", "time_bnds")?;
        time.put_values(&[upper], ..)?;
    }

    {
        let mut bnds = file.add_variable::<f64>("time_bnds", &["time", "nbnd"])?;
        bnds.put_attribute("long_name", "time interval endpoints")?;
        bnds.put_values(&[lower, upper], ..)?;
    }

    let lats: Vec<f32> = (0..N_LAT).map(|i| -75.0 + 30.0 * i as f32).collect();
    {
        let mut lat = file.add_variable::<f32>("lat", &["lat"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put_attribute("long_name", "latitude")?;
        lat.put_values(&lats, ..)?;
    }

    {
        let weights: Vec<f64> = lats.iter().map(|l| f64::from(l.to_radians().cos())).collect();
        let mut gw = file.add_variable::<f64>("gw", &["lat"])?;
        gw.put_attribute("long_name", "gauss weights")?;
        gw.put_values(&weights, ..)?;
    }

    {
        let mut p0 = file.add_variable::<f64>("P0", &[])?;
        p0.put_attribute("units", "Pa")?;
        p0.put(arr0(100_000.0).view(), &[] as &[usize])?;
    }

    {
        let mut ts = file.add_variable::<f32>("TS", &["time", "lat"])?;
        ts.put_attribute("_FillValue", 1.0e36f32)?;
        ts.put_attribute("units", "K")?;
        ts.put_attribute("long_name", "Surface temperature (radiative)")?;

        let phase = 2.0 * std::f32::consts::PI * (month as f32 - 1.0) / 12.0;
        let data = Array2::from_shape_fn((1, N_LAT), |(_, j)| {
            let hemisphere = lats[j].signum();
            288.0 - 0.4 * lats[j].abs() - 8.0 * hemisphere * phase.cos()
        });
        ts.put(data.view(), ..)?;
    }

    {
        let mut date = file.add_variable::<i32>("date", &["time"])?;
        date.put_attribute("long_name", "current date (YYYYMMDD)")?;
        date.put_values(&[(year * 10_000 + month * 100 + 1) as i32], ..)?;
    }

    Ok(())
}
