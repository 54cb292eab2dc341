#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crime risk toolchain.

mod config;
mod export;

use std::time::Instant;

use clap::{Parser, Subcommand};
use crime_risk_cli_utils::IndicatifProgress;
use crime_risk_hex::H3Resolver;
use crime_risk_ingest::load_csv;

use crate::config::NearRepeatArgs;

#[derive(Parser)]
#[command(name = "crime_risk", about = "Spatial risk signals from geotagged incidents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Knox near-repeat test with a recent-window hex coverage surface
    NearRepeat(NearRepeatArgs),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_risk_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::NearRepeat(args) => near_repeat(&args, &multi),
    }
}

fn near_repeat(
    args: &NearRepeatArgs,
    multi: &crime_risk_cli_utils::MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = args.base_config()?;
    base.validate()?;

    let report = load_csv(&args.csv, &args.ingest_options())?;
    if let Some((start, end)) = report.data_window() {
        log::info!(
            "Data window: {} -> {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
    }

    let resolver = H3Resolver::new(base.resolution)?;

    let runs = args.plan(&base);
    config::require_offence_column(&runs, &report.columns)?;

    for planned in runs {
        let started = Instant::now();
        let label = planned
            .config
            .offence_filter
            .as_deref()
            .unwrap_or("all offences");
        log::info!(
            "Near-repeat run ({label}): distance <= {} m, time <= {} days, R = {}",
            planned.config.distance_threshold_m,
            planned.config.time_threshold_days,
            planned.config.permutations
        );

        let progress = IndicatifProgress::trials_bar(multi, &format!("Permuting ({label})"));
        let run = crime_risk_knox::run(&report.incidents, &planned.config, &resolver, &progress)?;

        export::write_geojson(&planned.out, &run.collection)?;
        if let Some(path) = &planned.summary {
            export::write_summary(path, &run.summary)?;
        }

        let result = &run.summary.result;
        log::info!(
            "Done ({label}) in {:.1}s: observed {}, p = {:.5}, z = {}, seed {}",
            started.elapsed().as_secs_f64(),
            result.observed_count,
            result.p_value,
            result.z_score,
            result.seed
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use crime_risk_knox_models::PairStrategy;

    use super::*;

    #[test]
    fn near_repeat_subcommand_parses_strategy() {
        let cli = Cli::try_parse_from([
            "crime_risk",
            "near-repeat",
            "--csv",
            "data/toronto.csv",
            "--strategy",
            "rtree",
        ])
        .unwrap();
        let Commands::NearRepeat(args) = cli.command;
        assert_eq!(args.strategy, Some(PairStrategy::RTree));
        assert_eq!(args.base_config().unwrap().strategy, PairStrategy::RTree);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let parsed = Cli::try_parse_from([
            "crime_risk",
            "near-repeat",
            "--csv",
            "data/toronto.csv",
            "--strategy",
            "kd_tree",
        ]);
        assert!(parsed.is_err());
    }
}
