//! `GeoJSON` `FeatureCollection` reader.

use std::path::Path;
use std::sync::Arc;

use connectivity_map_models::ConnectivityFeature;
use connectivity_map_models::config::ColumnConfig;
use connectivity_map_spatial::CrsDefinition;
use geojson::{Feature, GeoJson};

use crate::attributes::{json_as_i32, json_as_string};
use crate::progress::ProgressCallback;
use crate::{DetectedCrs, IngestError, RawDataset};

/// Reads a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or is not a valid
/// `FeatureCollection`.
pub fn read_geojson(
    path: &Path,
    columns: &ColumnConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<RawDataset, IngestError> {
    let content = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    progress.set_message(format!("Reading {}", path.display()));
    parse_geojson(&content, columns, progress)
}

/// Parses a `GeoJSON` `FeatureCollection` document.
///
/// Features with a null geometry are skipped. Properties that are absent
/// decode to `None`. A legacy `crs` member, if present, is honored;
/// otherwise the document is WGS84 per RFC 7946.
///
/// # Errors
///
/// Returns [`IngestError::GeoJson`] if the document is malformed and
/// [`IngestError::Conversion`] if it is not a `FeatureCollection` or a
/// geometry cannot be converted.
pub fn parse_geojson(
    content: &str,
    columns: &ColumnConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<RawDataset, IngestError> {
    let GeoJson::FeatureCollection(collection) = content.parse::<GeoJson>()? else {
        return Err(IngestError::Conversion {
            message: "GeoJSON must be a FeatureCollection".to_string(),
        });
    };

    let detected_crs = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .map_or_else(|| DetectedCrs::Known(CrsDefinition::wgs84()), detect_named_crs);

    progress.set_total(collection.features.len() as u64);

    let mut features = Vec::with_capacity(collection.features.len());

    for feature in &collection.features {
        progress.inc(1);
        if let Some(decoded) = decode_feature(feature, columns)? {
            features.push(decoded);
        }
    }

    progress.finish(format!("Read {} features", features.len()));

    Ok(RawDataset {
        features,
        detected_crs,
    })
}

fn decode_feature(
    feature: &Feature,
    columns: &ColumnConfig,
) -> Result<Option<ConnectivityFeature>, IngestError> {
    let Some(geometry) = &feature.geometry else {
        log::debug!("Skipping feature without geometry");
        return Ok(None);
    };

    let geometry: geo::Geometry<f64> =
        geometry
            .value
            .clone()
            .try_into()
            .map_err(|e: geojson::Error| IngestError::Conversion {
                message: format!("Failed to convert GeoJSON geometry: {e}"),
            })?;

    let property = |name: &str| feature.properties.as_ref().and_then(|p| p.get(name));

    Ok(Some(ConnectivityFeature {
        geometry,
        delivery_year: property(&columns.year).and_then(json_as_i32),
        category: property(&columns.category).and_then(json_as_i32),
        location: property(&columns.location).and_then(json_as_string),
    }))
}

/// Interprets a legacy named-CRS member
/// (`{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}}`).
fn detect_named_crs(member: &serde_json::Value) -> DetectedCrs {
    let Some(name) = member
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(serde_json::Value::as_str)
    else {
        return DetectedCrs::Unrecognized(member.to_string());
    };

    if name.ends_with("CRS84") {
        return DetectedCrs::Known(CrsDefinition::wgs84());
    }

    name.rsplit(':')
        .next()
        .and_then(|code| code.parse::<u32>().ok())
        .and_then(CrsDefinition::from_epsg)
        .map_or_else(|| DetectedCrs::Unrecognized(name.to_string()), DetectedCrs::Known)
}
