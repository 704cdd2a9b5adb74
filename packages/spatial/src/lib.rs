#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial helpers for the connectivity map.
//!
//! - [`points`]: reduces a geometry to the `(lat, lng)` points fed into a
//!   heatmap (line vertices, polygon centroids, points).
//! - [`center`]: picks the initial map center from the whole dataset.
//! - [`reproject`]: resolves the source CRS and transforms geometry into
//!   WGS84 via `proj4rs`.
//!
//! Everything here is synchronous and free of I/O.

pub mod center;
pub mod points;
pub mod reproject;

pub use center::{CenterSource, MapCenter, map_center};
pub use points::{ExtractedPoints, extract_all, representative_points};
pub use reproject::{CrsDefinition, Reprojector};

/// Errors that can occur while resolving or applying a CRS.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The CRS label is neither a PROJ.4 string nor a known EPSG code.
    #[error("Unknown CRS: {label}")]
    UnknownCrs {
        /// The label that could not be resolved.
        label: String,
    },

    /// `proj4rs` rejected a definition or failed to transform a point.
    #[error("Projection error: {message}")]
    Proj {
        /// Description of what went wrong.
        message: String,
    },
}
