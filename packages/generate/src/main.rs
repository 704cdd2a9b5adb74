#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the connectivity map generator.
//!
//! Loads a path connectivity vector file, builds category heatmaps and
//! per-year overlays, and writes a standalone interactive HTML map.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use connectivity_map_cli_utils::IndicatifProgress;
use connectivity_map_generate::{GenerateArgs, GenerateError, run};
use connectivity_map_models::config::MapConfig;

#[derive(Parser)]
#[command(name = "connectivity_map_generate", about = "Interactive connectivity map generator")]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input vector file (`.shp`, `.geojson` or `.json`)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Output HTML file
    #[arg(long)]
    output: Option<PathBuf>,
    /// Comma-separated heatmap categories (e.g., "1,2")
    #[arg(long)]
    categories: Option<String>,
    /// Source CRS, as `EPSG:<code>` or a PROJ.4 string (overrides detection)
    #[arg(long)]
    source_crs: Option<String>,
}

fn main() -> ExitCode {
    let multi = connectivity_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let progress = IndicatifProgress::records_bar(&multi, "Reading features");

    match run(&config, &progress) {
        Ok(summary) => {
            log::info!(
                "Done: {} heatmap layers, {} yearly layers",
                summary.heatmaps.len(),
                summary.years.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: Cli) -> Result<MapConfig, GenerateError> {
    let config = match &cli.config {
        Some(path) => {
            log::info!("Using config {}", path.display());
            MapConfig::load(path)?
        }
        None => MapConfig::default(),
    };

    GenerateArgs {
        input: cli.input,
        output: cli.output,
        categories: cli.categories,
        source_crs: cli.source_crs,
    }
    .apply(config)
}
