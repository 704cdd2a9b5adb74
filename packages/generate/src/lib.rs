#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for rendering path connectivity data into an interactive map.
//!
//! The pipeline is linear and runs once:
//!
//! 1. load the vector file and reproject it to WGS84
//!    (`connectivity_map_ingest`),
//! 2. compose a [`MapDocument`] with category heatmaps and per-year
//!    overlays ([`compose`]),
//! 3. write it as a standalone Leaflet page ([`html`]).

pub mod compose;
pub mod html;

use std::path::PathBuf;
use std::sync::Arc;

use connectivity_map_ingest::progress::ProgressCallback;
use connectivity_map_ingest::{IngestError, load_dataset};
use connectivity_map_models::config::{ConfigError, MapConfig};
use connectivity_map_models::{MapDocument, MapSummary};

/// Errors that can occur while generating a map.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The input could not be loaded.
    #[error("Error loading input: {0}")]
    Ingest(#[from] IngestError),

    /// The config file could not be loaded.
    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    /// A config value is invalid.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// The map document could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The HTML page could not be written.
    #[error("Error saving map to {path}: {source}")]
    Save {
        /// Output path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Command-line overrides applied on top of a [`MapConfig`].
#[derive(Debug, Default)]
pub struct GenerateArgs {
    /// Input vector file.
    pub input: Option<PathBuf>,
    /// Output HTML path.
    pub output: Option<PathBuf>,
    /// Comma-separated heatmap categories (e.g. "1,2").
    pub categories: Option<String>,
    /// Source CRS (`EPSG:<code>` or a PROJ.4 string).
    pub source_crs: Option<String>,
}

impl GenerateArgs {
    /// Applies the overrides that are set.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Config`] if `categories` is not a
    /// comma-separated list of integers.
    pub fn apply(self, mut config: MapConfig) -> Result<MapConfig, GenerateError> {
        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(categories) = self.categories {
            config.heatmap_categories = parse_categories(&categories)?;
        }
        if let Some(source_crs) = self.source_crs {
            config.source_crs = Some(source_crs);
        }
        Ok(config)
    }
}

/// Parses a comma-separated list of category codes.
///
/// # Errors
///
/// Returns [`GenerateError::Config`] if any entry is not an integer.
pub fn parse_categories(list: &str) -> Result<Vec<i32>, GenerateError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>().map_err(|e| GenerateError::Config {
                message: format!("Invalid category '{s}': {e}"),
            })
        })
        .collect()
}

/// Loads the input and composes the map without writing anything.
///
/// # Errors
///
/// Returns [`GenerateError`] if loading or composition fails.
pub fn build_map(
    config: &MapConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<MapDocument, GenerateError> {
    let dataset = load_dataset(
        &config.input,
        &config.columns,
        config.source_crs.as_deref(),
        progress,
    )?;

    compose::compose_map(&dataset, config)
}

/// Runs the full pipeline: load, compose, and save.
///
/// Nothing is written unless loading and composition both succeed.
///
/// # Errors
///
/// Returns [`GenerateError`] if any step fails.
pub fn run(
    config: &MapConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<MapSummary, GenerateError> {
    let document = build_map(config, progress)?;
    html::write_html(&document, &config.output)?;

    Ok(document.summary())
}
