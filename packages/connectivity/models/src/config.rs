//! TOML configuration for a map generation run.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock connectivity map: the all-years path connectivity shapefile
//! rendered to `interactive_map.html` with heatmaps for categories 1 and 2.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::OverlayStyle;

/// Errors that can occur while loading a [`MapConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`MapConfig`].
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Attribute column names in the source dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnConfig {
    /// Integer delivery year column.
    pub year: String,
    /// Integer category code column.
    pub category: String,
    /// Location label column, shown in tooltips.
    pub location: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            year: "Deliv_Year".to_string(),
            category: "category".to_string(),
            location: "location".to_string(),
        }
    }
}

/// Base map options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaseMapConfig {
    /// HTML page title.
    pub title: String,
    /// Initial zoom level.
    pub zoom_start: u8,
    /// Tile provider name (e.g. "CartoDB positron") or a Leaflet URL
    /// template containing `{z}`.
    pub tiles: String,
    /// Attribution for a custom URL template. Ignored for named providers.
    pub tile_attribution: Option<String>,
}

impl Default for BaseMapConfig {
    fn default() -> Self {
        Self {
            title: "Path Connectivity Map".to_string(),
            zoom_start: 10,
            tiles: "CartoDB positron".to_string(),
            tile_attribution: None,
        }
    }
}

/// Top-level configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// Input vector file (`.shp`, `.geojson` or `.json`).
    pub input: PathBuf,
    /// Output HTML path.
    pub output: PathBuf,
    /// Source CRS override: a PROJ.4 string or an `EPSG:<code>` label.
    /// When unset the CRS is detected from the input.
    pub source_crs: Option<String>,
    /// Attribute column names.
    pub columns: ColumnConfig,
    /// Category codes that get a heatmap layer, in layer order.
    pub heatmap_categories: Vec<i32>,
    /// Base map options.
    pub map: BaseMapConfig,
    /// Style for the yearly overlays.
    pub style: OverlayStyle,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(
                "data/Data_for_interactiveMap/Path_conectivity_data_all_years.shp",
            ),
            output: PathBuf::from("interactive_map.html"),
            source_crs: None,
            columns: ColumnConfig::default(),
            heatmap_categories: vec![1, 2],
            map: BaseMapConfig::default(),
            style: OverlayStyle::default(),
        }
    }
}

impl MapConfig {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a TOML config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on syntax errors, type mismatches or
    /// unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
