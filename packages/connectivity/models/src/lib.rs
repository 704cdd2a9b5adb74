#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Connectivity feature records and interactive map document types.
//!
//! A [`ConnectivityDataset`] holds the rows of the source vector file (one
//! geometry plus delivery year, category and location per row). The map
//! composer turns it into a [`MapDocument`]: a base map, one heatmap layer
//! per allow-listed category, and a group of per-year overlays. The
//! document is plain data so it can be inspected in tests and serialized
//! into the HTML page as JSON.

pub mod config;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// CRS label for WGS84 longitude/latitude in degrees.
pub const WGS84: &str = "EPSG:4326";

/// Error returned when a coordinate is not a finite WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Invalid coordinate: lat={lat}, lng={lng}")]
pub struct InvalidLatLngError {
    /// Rejected latitude.
    pub lat: f64,
    /// Rejected longitude.
    pub lng: f64,
}

/// A WGS84 position in (latitude, longitude) order.
///
/// Serializes as a `[lat, lng]` pair, which is what Leaflet and
/// `leaflet.heat` consume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 2]", try_from = "[f64; 2]")]
pub struct LatLng {
    lat: f64,
    lng: f64,
}

impl LatLng {
    /// The fallback map center used when no geometry has a centroid.
    pub const ORIGIN: Self = Self { lat: 0.0, lng: 0.0 };

    /// Creates a position, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLatLngError`] if either value is NaN or infinite,
    /// the latitude is outside `[-90, 90]`, or the longitude is outside
    /// `[-180, 180]`.
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidLatLngError> {
        if lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng)
        {
            Ok(Self { lat, lng })
        } else {
            Err(InvalidLatLngError { lat, lng })
        }
    }

    /// Creates a position from a `geo` coordinate (`x` = longitude,
    /// `y` = latitude).
    ///
    /// # Errors
    ///
    /// See [`LatLng::new`].
    pub fn from_coord(coord: geo::Coord<f64>) -> Result<Self, InvalidLatLngError> {
        Self::new(coord.y, coord.x)
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(value: LatLng) -> Self {
        [value.lat, value.lng]
    }
}

impl TryFrom<[f64; 2]> for LatLng {
    type Error = InvalidLatLngError;

    fn try_from([lat, lng]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lat, lng)
    }
}

/// Coarse classification of a geometry, used for dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum GeometryKind {
    /// A single point.
    Point,
    /// A single line string.
    Line,
    /// A single polygon.
    Polygon,
    /// Several points.
    MultiPoint,
    /// Several line strings.
    MultiLine,
    /// Several polygons.
    MultiPolygon,
    /// A heterogeneous geometry collection.
    Collection,
    /// Lines, rectangles, triangles.
    Other,
}

impl GeometryKind {
    /// Classifies a geometry.
    #[must_use]
    pub const fn of(geometry: &geo::Geometry<f64>) -> Self {
        match geometry {
            geo::Geometry::Point(_) => Self::Point,
            geo::Geometry::LineString(_) => Self::Line,
            geo::Geometry::Polygon(_) => Self::Polygon,
            geo::Geometry::MultiPoint(_) => Self::MultiPoint,
            geo::Geometry::MultiLineString(_) => Self::MultiLine,
            geo::Geometry::MultiPolygon(_) => Self::MultiPolygon,
            geo::Geometry::GeometryCollection(_) => Self::Collection,
            geo::Geometry::Line(_) | geo::Geometry::Rect(_) | geo::Geometry::Triangle(_) => {
                Self::Other
            }
        }
    }
}

/// One row of the source dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityFeature {
    /// Geometry in the dataset's CRS.
    pub geometry: geo::Geometry<f64>,
    /// Delivery year, if present in the source row.
    pub delivery_year: Option<i32>,
    /// Category code, if present in the source row.
    pub category: Option<i32>,
    /// Human-readable location label, if present.
    pub location: Option<String>,
}

impl ConnectivityFeature {
    /// Returns the geometry kind of this feature.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        GeometryKind::of(&self.geometry)
    }
}

/// All feature records of one input file, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityDataset {
    /// CRS label of every geometry in [`Self::features`].
    pub crs: String,
    /// Feature records in source order.
    pub features: Vec<ConnectivityFeature>,
}

impl ConnectivityDataset {
    /// Creates a dataset whose geometries are already in WGS84.
    #[must_use]
    pub fn wgs84(features: Vec<ConnectivityFeature>) -> Self {
        Self {
            crs: WGS84.to_string(),
            features,
        }
    }

    /// Returns `true` if the geometries are WGS84 longitude/latitude.
    #[must_use]
    pub fn is_wgs84(&self) -> bool {
        self.crs == WGS84
    }

    /// Number of feature records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns `true` if there are no feature records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates over the geometries in source order.
    pub fn geometries(&self) -> impl Iterator<Item = &geo::Geometry<f64>> {
        self.features.iter().map(|f| &f.geometry)
    }
}

/// A raster tile provider for the base map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayer {
    /// Display name (e.g. "CartoDB positron").
    pub name: String,
    /// Leaflet URL template.
    pub url: String,
    /// Attribution HTML shown in the map corner.
    pub attribution: String,
}

/// Base map placement and tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseMap {
    /// Initial map center.
    pub center: LatLng,
    /// Initial zoom level.
    pub zoom_start: u8,
    /// Tile provider.
    pub tiles: TileLayer,
}

/// A point-density layer for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapLayer {
    /// Layer name shown in the layer control.
    pub name: String,
    /// Category code the points were drawn from.
    pub category: i32,
    /// Representative points of every matching feature.
    pub points: Vec<LatLng>,
}

/// Uniform vector style applied to every yearly overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct OverlayStyle {
    /// Stroke color (CSS color).
    pub color: String,
    /// Stroke width in pixels.
    pub weight: f64,
    /// Stroke opacity in `[0, 1]`.
    pub opacity: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: "blue".to_string(),
            weight: 2.0,
            opacity: 0.7,
        }
    }
}

/// Hover tooltip definition: which feature properties to show and the
/// label printed before each one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tooltip {
    /// Property keys, in display order.
    pub fields: Vec<String>,
    /// Labels for [`Self::fields`], same length.
    pub aliases: Vec<String>,
}

/// The raw geometries of one delivery year.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOverlay {
    /// Layer name shown in the layer control (e.g. "Year: 2021").
    pub name: String,
    /// Delivery year.
    pub year: i32,
    /// Whether the overlay is visible on load.
    pub show: bool,
    /// Features with location/category/year properties.
    pub data: geojson::FeatureCollection,
    /// Vector style.
    pub style: OverlayStyle,
    /// Hover tooltip.
    pub tooltip: Tooltip,
}

impl YearOverlay {
    /// Number of features in this overlay.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.data.features.len()
    }
}

/// Parent toggle group holding every [`YearOverlay`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearGroup {
    /// Group name shown in the layer control.
    pub name: String,
    /// Whether the group is visible on load.
    pub show: bool,
    /// One overlay per distinct delivery year, ascending.
    pub overlays: Vec<YearOverlay>,
}

/// Layer-selection control options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerControl {
    /// Whether the control starts collapsed into an icon.
    pub collapsed: bool,
}

/// The fully composed interactive map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDocument {
    /// HTML page title.
    pub title: String,
    /// Base map.
    pub base: BaseMap,
    /// Heatmap layers in allow-list order.
    pub heatmaps: Vec<HeatmapLayer>,
    /// Yearly overlays.
    pub yearly: YearGroup,
    /// Layer-selection control.
    pub layer_control: LayerControl,
}

impl MapDocument {
    /// Summarizes layer names and sizes, independent of geometry detail.
    #[must_use]
    pub fn summary(&self) -> MapSummary {
        MapSummary {
            heatmaps: self
                .heatmaps
                .iter()
                .map(|h| (h.category, h.points.len()))
                .collect(),
            years: self
                .yearly
                .overlays
                .iter()
                .map(|o| (o.year, o.feature_count()))
                .collect(),
        }
    }
}

/// Layer inventory of a [`MapDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSummary {
    /// `(category, point count)` per heatmap layer.
    pub heatmaps: Vec<(i32, usize)>,
    /// `(year, feature count)` per yearly overlay.
    pub years: Vec<(i32, usize)>,
}
