#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Connectivity data loading.
//!
//! Reads a vector file (ESRI Shapefile or `GeoJSON` `FeatureCollection`)
//! into a [`ConnectivityDataset`], decoding the year/category/location
//! columns and reprojecting every geometry into WGS84 so the point
//! extractor always sees longitude/latitude degrees.

pub mod attributes;
pub mod json;
pub mod progress;
pub mod shp;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use connectivity_map_models::config::ColumnConfig;
use connectivity_map_models::{ConnectivityDataset, ConnectivityFeature, WGS84};
use connectivity_map_spatial::{CrsDefinition, Reprojector, SpatialError};
use geo::Geometry;

use crate::progress::ProgressCallback;

/// Errors that can occur while loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The input (or its `.prj` sidecar) could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The shapefile reader failed.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// The `GeoJSON` document is malformed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The file extension is not a supported vector format.
    #[error("Unsupported geometry format: {path}")]
    UnsupportedFormat {
        /// Offending path.
        path: PathBuf,
    },

    /// A configured attribute column does not exist in the input.
    #[error("Column '{column}' not found in {path}")]
    MissingColumn {
        /// Configured column name.
        column: String,
        /// Input path.
        path: PathBuf,
    },

    /// The input is projected but its CRS could not be identified.
    #[error("Unrecognized CRS for {path}; set source_crs explicitly")]
    UnknownCrs {
        /// Input path.
        path: PathBuf,
    },

    /// CRS resolution or reprojection failed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// A geometry or document could not be converted.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// What the input says about its own CRS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedCrs {
    /// The input declares a CRS we can resolve.
    Known(CrsDefinition),
    /// The input declares nothing; WGS84 is assumed.
    Unspecified,
    /// The input declares a CRS we cannot resolve (raw declaration).
    Unrecognized(String),
}

/// Features as read from disk, before reprojection.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataset {
    /// Decoded features in source coordinates.
    pub features: Vec<ConnectivityFeature>,
    /// CRS declared by the input.
    pub detected_crs: DetectedCrs,
}

/// Loads a dataset from `path` and reprojects it into WGS84.
///
/// The format is chosen by extension: `.shp` for shapefiles, `.geojson`
/// or `.json` for `GeoJSON`. `source_crs` overrides whatever CRS the input
/// declares.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or decoded, a
/// configured column is missing, the CRS cannot be determined, or any
/// coordinate fails to reproject.
pub fn load_dataset(
    path: &Path,
    columns: &ColumnConfig,
    source_crs: Option<&str>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ConnectivityDataset, IngestError> {
    log::info!("Loading features from {}", path.display());

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let raw = match extension.as_deref() {
        Some("shp") => shp::read_shapefile(path, columns, progress)?,
        Some("geojson" | "json") => json::read_geojson(path, columns, progress)?,
        _ => {
            return Err(IngestError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };

    log::info!("Loaded {} features", raw.features.len());

    let crs = resolve_crs(path, raw.detected_crs, source_crs)?;
    reproject(raw.features, &crs)
}

/// Picks the CRS to reproject from: the override if given, else the
/// detected one, else WGS84.
///
/// # Errors
///
/// Returns [`IngestError::Spatial`] if the override cannot be parsed and
/// [`IngestError::UnknownCrs`] if the input declares an unrecognized CRS
/// and no override is given.
pub fn resolve_crs(
    path: &Path,
    detected: DetectedCrs,
    source_crs: Option<&str>,
) -> Result<CrsDefinition, IngestError> {
    if let Some(label) = source_crs {
        return Ok(CrsDefinition::parse(label)?);
    }

    match detected {
        DetectedCrs::Known(crs) => Ok(crs),
        DetectedCrs::Unspecified => {
            log::warn!(
                "{} declares no CRS, assuming {WGS84}",
                path.display()
            );
            Ok(CrsDefinition::wgs84())
        }
        DetectedCrs::Unrecognized(declaration) => {
            log::error!("Unrecognized CRS declaration: {declaration}");
            Err(IngestError::UnknownCrs {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Transforms every feature geometry from `crs` into WGS84.
///
/// # Errors
///
/// Returns [`IngestError::Spatial`] on the first coordinate that fails.
pub fn reproject(
    features: Vec<ConnectivityFeature>,
    crs: &CrsDefinition,
) -> Result<ConnectivityDataset, IngestError> {
    log::info!("Source CRS: {}", crs.label());

    if crs.is_wgs84() {
        return Ok(ConnectivityDataset::wgs84(features));
    }

    log::info!("Reprojecting to {WGS84}...");
    let reprojector = Reprojector::to_wgs84(crs)?;

    let features = features
        .into_iter()
        .map(|feature| {
            Ok(ConnectivityFeature {
                geometry: reprojector.transform(&feature.geometry)?,
                ..feature
            })
        })
        .collect::<Result<Vec<_>, IngestError>>()?;

    log::info!("Reprojection complete. New CRS: {WGS84}");
    Ok(ConnectivityDataset::wgs84(features))
}

/// Unwraps single-part multi-geometries into their single-part kind.
///
/// Shapefiles store every line as a multi-part polyline and every polygon
/// as a multi-ring shape; one-part values are plain lines and polygons.
#[must_use]
pub fn unwrap_single_part(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::MultiLineString(mut multi) if multi.0.len() == 1 => {
            Geometry::LineString(multi.0.remove(0))
        }
        Geometry::MultiPolygon(mut multi) if multi.0.len() == 1 => {
            Geometry::Polygon(multi.0.remove(0))
        }
        Geometry::MultiPoint(mut multi) if multi.0.len() == 1 => Geometry::Point(multi.0.remove(0)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiLineString, MultiPolygon, Point, polygon};

    use super::*;
    use crate::progress::null_progress;

    fn feature(geometry: Geometry<f64>) -> ConnectivityFeature {
        ConnectivityFeature {
            geometry,
            delivery_year: Some(2020),
            category: Some(1),
            location: Some("Here".to_string()),
        }
    }

    #[test]
    fn single_part_lines_and_polygons_are_unwrapped() {
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let unwrapped = unwrap_single_part(MultiLineString::new(vec![line.clone()]).into());
        assert_eq!(unwrapped, Geometry::LineString(line));

        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let unwrapped = unwrap_single_part(MultiPolygon::new(vec![square.clone()]).into());
        assert_eq!(unwrapped, Geometry::Polygon(square));
    }

    #[test]
    fn multi_part_geometries_are_kept() {
        let multi = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
            LineString::from(vec![(2.0, 2.0), (3.0, 3.0)]),
        ]);
        let kept = unwrap_single_part(multi.clone().into());
        assert_eq!(kept, Geometry::MultiLineString(multi));
    }

    #[test]
    fn override_beats_detection() {
        let crs = resolve_crs(
            Path::new("in.shp"),
            DetectedCrs::Unrecognized("PROJCS[\"x\"]".to_string()),
            Some("EPSG:3857"),
        )
        .unwrap();
        assert_eq!(crs.label(), "EPSG:3857");
    }

    #[test]
    fn unspecified_crs_assumes_wgs84() {
        let crs = resolve_crs(Path::new("in.shp"), DetectedCrs::Unspecified, None).unwrap();
        assert!(crs.is_wgs84());
    }

    #[test]
    fn unrecognized_crs_without_override_fails() {
        let err = resolve_crs(
            Path::new("in.shp"),
            DetectedCrs::Unrecognized("PROJCS[\"x\"]".to_string()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::UnknownCrs { .. }));
    }

    #[test]
    fn reproject_keeps_attributes() {
        let crs = CrsDefinition::from_epsg(3857).unwrap();
        let dataset = reproject(
            vec![feature(Point::new(111_319.490_793_273_6, 0.0).into())],
            &crs,
        )
        .unwrap();

        assert!(dataset.is_wgs84());
        let Geometry::Point(p) = &dataset.features[0].geometry else {
            panic!("expected a point");
        };
        assert!((p.x() - 1.0).abs() < 1e-6);
        assert_eq!(dataset.features[0].delivery_year, Some(2020));
        assert_eq!(dataset.features[0].location.as_deref(), Some("Here"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_dataset(
            Path::new("data/connectivity.kml"),
            &ColumnConfig::default(),
            None,
            &null_progress(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    }
}
