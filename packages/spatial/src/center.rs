//! Initial map center for a dataset.

use connectivity_map_models::LatLng;
use geo::{Centroid, Geometry, GeometryCollection};

/// Which rule produced a [`MapCenter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenterSource {
    /// Centroid of all geometries combined.
    Union,
    /// Centroid of the first geometry.
    FirstGeometry,
    /// No geometry had a usable centroid; [`LatLng::ORIGIN`].
    Default,
}

/// A map center and how it was derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapCenter {
    /// Center position.
    pub position: LatLng,
    /// Rule that produced [`Self::position`].
    pub source: CenterSource,
}

/// Computes the map center for a set of WGS84 geometries.
///
/// Uses the centroid of the combined geometry. If that is missing or not a
/// valid position, falls back to the first geometry's centroid, then to
/// `(0, 0)`.
///
/// The geometries are combined as a collection, not dissolved: where
/// polygons overlap or lines share segments, the shared part is weighted
/// once per geometry. The centroid only uses the highest dimension present,
/// so points do not move it when lines or polygons exist.
pub fn map_center<'a, I>(geometries: I) -> MapCenter
where
    I: IntoIterator<Item = &'a Geometry<f64>>,
{
    let geometries: Vec<Geometry<f64>> = geometries.into_iter().cloned().collect();

    let first = geometries.first().cloned();
    let union = GeometryCollection::new_from(geometries);

    if let Some(position) = centroid_of(&Geometry::GeometryCollection(union)) {
        return MapCenter {
            position,
            source: CenterSource::Union,
        };
    }

    log::warn!("Could not compute centroid of all geometries, trying first geometry");

    if let Some(position) = first.as_ref().and_then(centroid_of) {
        return MapCenter {
            position,
            source: CenterSource::FirstGeometry,
        };
    }

    log::warn!("No valid geometries to determine center, defaulting to (0, 0)");

    MapCenter {
        position: LatLng::ORIGIN,
        source: CenterSource::Default,
    }
}

fn centroid_of(geometry: &Geometry<f64>) -> Option<LatLng> {
    geometry
        .centroid()
        .and_then(|point| LatLng::from_coord(point.0).ok())
}
