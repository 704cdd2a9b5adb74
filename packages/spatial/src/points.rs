//! Representative points for heatmap layers.

use std::collections::BTreeMap;

use connectivity_map_models::{GeometryKind, LatLng};
use geo::{Centroid, Geometry};

/// Reduces one WGS84 geometry to its representative `(lat, lng)` points.
///
/// - Line: every vertex, in order, duplicates kept.
/// - Polygon: its centroid.
/// - Point: itself.
/// - Anything else: nothing.
///
/// Coordinates that are not valid WGS84 positions are dropped.
#[must_use]
pub fn representative_points(geometry: &Geometry<f64>) -> Vec<LatLng> {
    match geometry {
        Geometry::LineString(line) => line
            .coords()
            .filter_map(|coord| LatLng::from_coord(*coord).ok())
            .collect(),
        Geometry::Polygon(polygon) => polygon
            .centroid()
            .and_then(|centroid| LatLng::from_coord(centroid.0).ok())
            .into_iter()
            .collect(),
        Geometry::Point(point) => LatLng::from_coord(point.0).ok().into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Points gathered from many geometries, plus a tally of the geometry
/// kinds that yield none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPoints {
    /// Representative points in input order.
    pub points: Vec<LatLng>,
    /// Count of unsupported geometries per kind.
    pub unsupported: BTreeMap<GeometryKind, usize>,
}

impl ExtractedPoints {
    /// Total number of geometries that had no representative point rule.
    #[must_use]
    pub fn unsupported_count(&self) -> usize {
        self.unsupported.values().sum()
    }
}

/// Applies [`representative_points`] to every geometry and concatenates
/// the results.
pub fn extract_all<'a, I>(geometries: I) -> ExtractedPoints
where
    I: IntoIterator<Item = &'a Geometry<f64>>,
{
    let mut extracted = ExtractedPoints::default();

    for geometry in geometries {
        match GeometryKind::of(geometry) {
            GeometryKind::Line | GeometryKind::Polygon | GeometryKind::Point => {
                extracted.points.extend(representative_points(geometry));
            }
            other => *extracted.unsupported.entry(other).or_default() += 1,
        }
    }

    extracted
}
