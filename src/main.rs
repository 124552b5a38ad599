//! Entry point for the climos application.
//! Handles CLI parsing and logging setup, then runs every requested season.

use clap::Parser;
use climos::cli::Args;
use climos::metadata::print_output_summary;
use climos::pipeline::{run_climatologies, RunSummary, SeasonOutcome};
use climos::reduction::NetcdfAccumulator;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    println!(
        r#"
------------------------------------------------------------------
                      _ _
                  ___| (_)_ __ ___   ___  ___
                 / __| | | '_ ` _ \ / _ \/ __|
                | (__| | | | | | | | (_) \__ \
                 \___|_|_|_| |_| |_|\___/|___/
              seasonal climatologies from NetCDF
------------------------------------------------------------------
"#
    );

    let describe = args.describe;
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "📂 {} input files, seasons: {}",
        config.files.len(),
        config.seasons.join(", ")
    );

    match run_climatologies(&config, &NetcdfAccumulator::new()) {
        Ok(summary) => {
            print_summary(&summary);
            if describe {
                for path in summary.outputs() {
                    if let Err(e) = print_output_summary(path) {
                        eprintln!("⚠ Could not describe {}: {e}", path.display());
                    }
                }
            }
            if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("❌ Run aborted: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        match &report.outcome {
            SeasonOutcome::Written(path) => {
                println!("✅ {}: saved climatology to {}", report.season, path.display())
            }
            SeasonOutcome::Unmerged(path) => println!(
                "⚠ {}: saved to {} with two unmerged time slices",
                report.season,
                path.display()
            ),
            SeasonOutcome::Skipped(reason) => println!("⏭ {}: skipped, {reason}", report.season),
            SeasonOutcome::Failed(error) => println!("❌ {}: {error}", report.season),
        }
    }
}
