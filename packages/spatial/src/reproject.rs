//! Source CRS resolution and reprojection into WGS84.
//!
//! A CRS is either given explicitly (a PROJ.4 string or an `EPSG:<code>`
//! label from [`EPSG_DEFINITIONS`]) or detected from a shapefile's `.prj`
//! WKT. The transformation itself is delegated to `proj4rs`.

use connectivity_map_models::WGS84;
use geo::{Coord, Geometry, MapCoords};
use proj4rs::proj::Proj;

use crate::SpatialError;

const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Built-in EPSG definitions, as PROJ.4 strings.
const EPSG_DEFINITIONS: &[(u32, &str)] = &[
    (4326, WGS84_PROJ4),
    (
        3857,
        "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs",
    ),
    (
        2157,
        "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=0.99982 +x_0=600000 +y_0=750000 +ellps=GRS80 \
         +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
    ),
    (
        29902,
        "+proj=tmerc +lat_0=53.5 +lon_0=-8 +k=1.000035 +x_0=200000 +y_0=250000 +ellps=mod_airy \
         +towgs84=482.5,-130.6,564.6,-1.042,-0.214,-0.631,8.15 +units=m +no_defs",
    ),
    (
        27700,
        "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 +x_0=400000 +y_0=-100000 +ellps=airy \
         +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 +units=m +no_defs",
    ),
    (32629, "+proj=utm +zone=29 +datum=WGS84 +units=m +no_defs"),
    (32630, "+proj=utm +zone=30 +datum=WGS84 +units=m +no_defs"),
];

/// WKT `PROJCS` names recognized when a `.prj` carries no EPSG authority.
const WKT_NAMES: &[(&str, u32)] = &[
    ("Pseudo_Mercator", 3857),
    ("Pseudo-Mercator", 3857),
    ("Web_Mercator", 3857),
    ("Irish_Transverse_Mercator", 2157),
    ("Irish_Grid", 29902),
    ("British_National_Grid", 27700),
    ("UTM_Zone_29N", 32629),
    ("UTM zone 29N", 32629),
    ("UTM_Zone_30N", 32630),
    ("UTM zone 30N", 32630),
];

/// A resolved coordinate reference system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsDefinition {
    label: String,
    proj4: String,
}

impl CrsDefinition {
    /// WGS84 longitude/latitude.
    #[must_use]
    pub fn wgs84() -> Self {
        Self {
            label: WGS84.to_string(),
            proj4: WGS84_PROJ4.to_string(),
        }
    }

    /// Resolves a built-in EPSG code.
    #[must_use]
    pub fn from_epsg(code: u32) -> Option<Self> {
        EPSG_DEFINITIONS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(c, proj4)| Self {
                label: format!("EPSG:{c}"),
                proj4: (*proj4).to_string(),
            })
    }

    /// Parses a user-supplied CRS: `EPSG:<code>` or a PROJ.4 string.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnknownCrs`] if the label is an unknown EPSG
    /// code or not PROJ.4 syntax.
    pub fn parse(label: &str) -> Result<Self, SpatialError> {
        let trimmed = label.trim();

        if trimmed.starts_with('+') {
            return Ok(Self {
                label: trimmed.to_string(),
                proj4: trimmed.to_string(),
            });
        }

        trimmed
            .split_once(':')
            .filter(|(authority, _)| authority.eq_ignore_ascii_case("EPSG"))
            .and_then(|(_, code)| code.trim().parse::<u32>().ok())
            .and_then(Self::from_epsg)
            .ok_or_else(|| SpatialError::UnknownCrs {
                label: label.to_string(),
            })
    }

    /// Detects the CRS described by a `.prj` WKT document.
    ///
    /// Checks, in order: the `AUTHORITY["EPSG","<code>"]` of the outermost
    /// CRS, a known `PROJCS` name, and a bare WGS84 `GEOGCS`. Authorities of
    /// nested elements never decide the result, so a `PROJCS` whose only
    /// authority sits on its `GEOGCS` is not mistaken for that `GEOGCS`.
    #[must_use]
    pub fn from_wkt(wkt: &str) -> Option<Self> {
        if let Some(crs) = outer_epsg_authority(wkt).and_then(Self::from_epsg) {
            return Some(crs);
        }

        let is_projected = wkt.trim_start().starts_with("PROJCS");

        if is_projected {
            return WKT_NAMES
                .iter()
                .find(|(name, _)| wkt.contains(name))
                .and_then(|(_, code)| Self::from_epsg(*code));
        }

        let is_wgs84 = ["WGS_1984", "WGS 84", "WGS84"]
            .iter()
            .any(|name| wkt.contains(name));

        (wkt.trim_start().starts_with("GEOGCS") && is_wgs84).then(Self::wgs84)
    }

    /// Label, e.g. `EPSG:2157` or the raw PROJ.4 string.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// PROJ.4 definition.
    #[must_use]
    pub fn proj4(&self) -> &str {
        &self.proj4
    }

    /// Returns `true` if this CRS is WGS84 longitude/latitude.
    #[must_use]
    pub fn is_wgs84(&self) -> bool {
        self.label == WGS84 || self.proj4 == WGS84_PROJ4
    }
}

/// Extracts the EPSG code of the `AUTHORITY` clause sitting directly
/// inside the outermost WKT element.
fn outer_epsg_authority(wkt: &str) -> Option<u32> {
    const MARKER: &str = "AUTHORITY[";

    let mut depth = 0_usize;
    let mut in_quotes = false;

    for (i, c) in wkt.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' | '(' if !in_quotes => depth += 1,
            ']' | ')' if !in_quotes => depth = depth.saturating_sub(1),
            _ if !in_quotes && depth == 1 && wkt[i..].starts_with(MARKER) => {
                if let Some(code) = parse_epsg_authority(&wkt[i + MARKER.len()..]) {
                    return Some(code);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parses `"EPSG","<code>"]` (the body of an `AUTHORITY` clause).
fn parse_epsg_authority(body: &str) -> Option<u32> {
    let end = body.find(']')?;
    let (authority, code) = body[..end].split_once(',')?;

    authority
        .trim()
        .trim_matches('"')
        .eq_ignore_ascii_case("EPSG")
        .then(|| code.trim().trim_matches('"').parse().ok())
        .flatten()
}

/// Transforms geometry from a source CRS into WGS84.
pub struct Reprojector {
    source: Proj,
    target: Proj,
}

impl Reprojector {
    /// Builds a transformer from `source` into WGS84.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Proj`] if `proj4rs` rejects either
    /// definition.
    pub fn to_wgs84(source: &CrsDefinition) -> Result<Self, SpatialError> {
        Ok(Self {
            source: parse_proj(source.proj4())?,
            target: parse_proj(WGS84_PROJ4)?,
        })
    }

    /// Transforms one coordinate. Geographic coordinates are in degrees on
    /// both sides.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Proj`] if the transformation fails.
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, SpatialError> {
        let mut point = if self.source.is_latlong() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        proj4rs::transform::transform(&self.source, &self.target, &mut point).map_err(|e| {
            SpatialError::Proj {
                message: format!("({}, {}): {e}", coord.x, coord.y),
            }
        })?;

        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }

    /// Transforms every coordinate of a geometry.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Proj`] on the first coordinate that fails.
    pub fn transform(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, SpatialError> {
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }
}

fn parse_proj(definition: &str) -> Result<Proj, SpatialError> {
    Proj::from_proj_string(definition).map_err(|e| SpatialError::Proj {
        message: format!("{definition}: {e}"),
    })
}
