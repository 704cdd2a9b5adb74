//! Map composition: base map, category heatmaps, and per-year overlays.

use std::collections::BTreeMap;

use connectivity_map_models::config::{BaseMapConfig, ColumnConfig, MapConfig};
use connectivity_map_models::{
    BaseMap, ConnectivityDataset, ConnectivityFeature, HeatmapLayer, LayerControl, MapDocument,
    OverlayStyle, TileLayer, Tooltip, YearGroup, YearOverlay,
};
use connectivity_map_spatial::{CenterSource, extract_all, map_center};
use geojson::{Feature, FeatureCollection, JsonObject};

use crate::GenerateError;

/// Name of the parent toggle group that holds every yearly overlay.
pub const YEARLY_GROUP_NAME: &str = "Yearly Connectivity Data";

const CARTODB_ATTRIBUTION: &str = "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>";
const OSM_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";

/// Builds the complete map document for a WGS84 dataset.
///
/// # Errors
///
/// Returns [`GenerateError::Config`] if the configured tile provider is
/// unknown.
pub fn compose_map(
    dataset: &ConnectivityDataset,
    config: &MapConfig,
) -> Result<MapDocument, GenerateError> {
    if dataset.is_empty() {
        log::warn!("Dataset is empty; the map will have no data layers");
    }

    let center = map_center(dataset.geometries());
    if center.source != CenterSource::Union {
        log::info!("Map center fell back to {:?}", center.source);
    }
    log::info!(
        "Calculated map center: [{}, {}]",
        center.position.lat(),
        center.position.lng()
    );

    let base = BaseMap {
        center: center.position,
        zoom_start: config.map.zoom_start,
        tiles: resolve_tiles(&config.map)?,
    };

    log::info!("Generating heatmaps...");
    let heatmaps = heatmap_layers(dataset, &config.heatmap_categories);

    log::info!("Generating layers per {}...", config.columns.year);
    let overlays = year_overlays(dataset, &config.columns, &config.style);

    log::info!("Adding Layer Control...");
    Ok(MapDocument {
        title: config.map.title.clone(),
        base,
        heatmaps,
        yearly: YearGroup {
            name: YEARLY_GROUP_NAME.to_string(),
            show: false,
            overlays,
        },
        layer_control: LayerControl { collapsed: false },
    })
}

/// Builds one heatmap layer per allow-listed category that has points.
///
/// Categories are processed in allow-list order; repeated entries are
/// ignored.
#[must_use]
pub fn heatmap_layers(dataset: &ConnectivityDataset, categories: &[i32]) -> Vec<HeatmapLayer> {
    let mut layers: Vec<HeatmapLayer> = Vec::new();

    for &category in categories {
        if layers.iter().any(|layer| layer.category == category) {
            continue;
        }

        let matching: Vec<&ConnectivityFeature> = dataset
            .features
            .iter()
            .filter(|f| f.category == Some(category))
            .collect();

        if matching.is_empty() {
            log::info!("No data found for Category {category}.");
            continue;
        }

        log::info!(
            "Processing Category {category} for heatmap ({} features)...",
            matching.len()
        );

        let extracted = extract_all(matching.iter().map(|f| &f.geometry));

        for (kind, count) in &extracted.unsupported {
            log::warn!(
                "Category {category}: skipped {count} {kind} geometries with no representative point"
            );
        }

        if extracted.points.is_empty() {
            log::info!("No points found for Category {category} heatmap.");
            continue;
        }

        log::info!(
            "Added Heatmap for Category {category} with {} points.",
            extracted.points.len()
        );

        layers.push(HeatmapLayer {
            name: format!("Heatmap - Category {category}"),
            category,
            points: extracted.points,
        });
    }

    layers
}

/// Builds one overlay per distinct delivery year, ascending.
///
/// Rows without a delivery year are not placed in any overlay.
#[must_use]
pub fn year_overlays(
    dataset: &ConnectivityDataset,
    columns: &ColumnConfig,
    style: &OverlayStyle,
) -> Vec<YearOverlay> {
    let mut by_year: BTreeMap<i32, Vec<&ConnectivityFeature>> = BTreeMap::new();
    let mut without_year = 0usize;

    for feature in &dataset.features {
        match feature.delivery_year {
            Some(year) => by_year.entry(year).or_default().push(feature),
            None => without_year += 1,
        }
    }

    if without_year > 0 {
        log::warn!(
            "{without_year} features have no {} and are left out of the yearly layers",
            columns.year
        );
    }

    log::info!(
        "Unique Delivery Years: {:?}",
        by_year.keys().collect::<Vec<_>>()
    );

    let tooltip = Tooltip {
        fields: vec![
            columns.location.clone(),
            columns.category.clone(),
            columns.year.clone(),
        ],
        aliases: vec![
            "Location:".to_string(),
            "Category:".to_string(),
            "Year:".to_string(),
        ],
    };

    by_year
        .into_iter()
        .map(|(year, features)| {
            log::info!(
                "Processing {} {year} ({} features)...",
                columns.year,
                features.len()
            );

            let data = FeatureCollection {
                bbox: None,
                features: features
                    .into_iter()
                    .map(|f| to_geojson_feature(f, columns))
                    .collect(),
                foreign_members: None,
            };

            log::info!("Added GeoJSON layer for {year}.");

            YearOverlay {
                name: format!("Year: {year}"),
                year,
                show: false,
                data,
                style: style.clone(),
                tooltip: tooltip.clone(),
            }
        })
        .collect()
}

/// Converts a feature to `GeoJSON`, keyed by the configured column names so
/// the tooltip fields resolve.
fn to_geojson_feature(feature: &ConnectivityFeature, columns: &ColumnConfig) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert(
        columns.location.clone(),
        feature
            .location
            .clone()
            .map_or(serde_json::Value::Null, serde_json::Value::String),
    );
    properties.insert(
        columns.category.clone(),
        feature
            .category
            .map_or(serde_json::Value::Null, serde_json::Value::from),
    );
    properties.insert(
        columns.year.clone(),
        feature
            .delivery_year
            .map_or(serde_json::Value::Null, serde_json::Value::from),
    );

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(
            &feature.geometry,
        ))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Resolves the configured tile provider.
///
/// # Errors
///
/// Returns [`GenerateError::Config`] if `tiles` is neither a known
/// provider name nor a URL template.
pub fn resolve_tiles(config: &BaseMapConfig) -> Result<TileLayer, GenerateError> {
    let normalized = config.tiles.to_ascii_lowercase().replace([' ', '_'], "");

    let (url, attribution) = match normalized.as_str() {
        "cartodbpositron" => (
            "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png",
            CARTODB_ATTRIBUTION,
        ),
        "cartodbdarkmatter" => (
            "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
            CARTODB_ATTRIBUTION,
        ),
        "openstreetmap" => ("https://tile.openstreetmap.org/{z}/{x}/{y}.png", OSM_ATTRIBUTION),
        _ if config.tiles.contains("{z}") => {
            return Ok(TileLayer {
                name: "Base map".to_string(),
                url: config.tiles.clone(),
                attribution: config.tile_attribution.clone().unwrap_or_default(),
            });
        }
        _ => {
            return Err(GenerateError::Config {
                message: format!("Unknown tile provider: {}", config.tiles),
            });
        }
    };

    Ok(TileLayer {
        name: config.tiles.clone(),
        url: url.to_string(),
        attribution: attribution.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use connectivity_map_models::LatLng;
    use geo::{Geometry, LineString, MultiLineString, Point, polygon};

    use super::*;

    fn feature(geometry: Geometry<f64>, year: Option<i32>, category: Option<i32>) -> ConnectivityFeature {
        ConnectivityFeature {
            geometry,
            delivery_year: year,
            category,
            location: Some(format!("site-{year:?}-{category:?}")),
        }
    }

    fn sample_dataset() -> ConnectivityDataset {
        ConnectivityDataset::wgs84(vec![
            feature(
                LineString::from(vec![(-6.2, 53.3), (-6.25, 53.35), (-6.3, 53.4)]).into(),
                Some(2020),
                Some(1),
            ),
            feature(
                polygon![
                    (x: -6.0, y: 53.0),
                    (x: -5.8, y: 53.0),
                    (x: -5.8, y: 53.2),
                    (x: -6.0, y: 53.2),
                    (x: -6.0, y: 53.0),
                ]
                .into(),
                Some(2021),
                Some(2),
            ),
            feature(Point::new(-6.1, 53.1).into(), Some(2021), Some(1)),
        ])
    }

    #[test]
    fn two_years_two_categories() {
        let document = compose_map(&sample_dataset(), &MapConfig::default()).unwrap();
        let summary = document.summary();

        assert_eq!(summary.heatmaps, vec![(1, 4), (2, 1)]);
        assert_eq!(summary.years, vec![(2020, 1), (2021, 2)]);

        let names: Vec<&str> = document.heatmaps.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Heatmap - Category 1", "Heatmap - Category 2"]);

        let overlay_2021 = &document.yearly.overlays[1];
        assert_eq!(overlay_2021.name, "Year: 2021");
        for f in &overlay_2021.data.features {
            let year = f.properties.as_ref().unwrap().get("Deliv_Year").unwrap();
            assert_eq!(year, &serde_json::json!(2021));
        }
    }

    #[test]
    fn empty_dataset_has_default_center_and_no_layers() {
        let document =
            compose_map(&ConnectivityDataset::wgs84(vec![]), &MapConfig::default()).unwrap();

        assert_eq!(document.base.center, LatLng::ORIGIN);
        assert!(document.heatmaps.is_empty());
        assert!(document.yearly.overlays.is_empty());
        assert_eq!(document.yearly.name, YEARLY_GROUP_NAME);
        assert!(!document.yearly.show);
        assert!(!document.layer_control.collapsed);
    }

    #[test]
    fn composition_is_deterministic() {
        let config = MapConfig::default();
        let first = compose_map(&sample_dataset(), &config).unwrap();
        let second = compose_map(&sample_dataset(), &config).unwrap();

        assert_eq!(first.summary(), second.summary());
        assert_eq!(first, second);
    }

    #[test]
    fn categories_outside_allow_list_are_ignored() {
        let layers = heatmap_layers(&sample_dataset(), &[2, 7, 2]);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].category, 2);
    }

    #[test]
    fn category_with_only_unsupported_geometry_has_no_layer() {
        let dataset = ConnectivityDataset::wgs84(vec![feature(
            MultiLineString::new(vec![
                LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
                LineString::from(vec![(2.0, 2.0), (3.0, 3.0)]),
            ])
            .into(),
            Some(2020),
            Some(1),
        )]);

        assert!(heatmap_layers(&dataset, &[1]).is_empty());
        assert_eq!(
            year_overlays(&dataset, &ColumnConfig::default(), &OverlayStyle::default()).len(),
            1
        );
    }

    #[test]
    fn rows_without_year_are_left_out_of_overlays() {
        let dataset = ConnectivityDataset::wgs84(vec![
            feature(Point::new(0.0, 0.0).into(), None, Some(1)),
            feature(Point::new(1.0, 1.0).into(), Some(2022), Some(1)),
        ]);

        let overlays = year_overlays(&dataset, &ColumnConfig::default(), &OverlayStyle::default());
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].year, 2022);
        assert_eq!(heatmap_layers(&dataset, &[1])[0].points.len(), 2);
    }

    #[test]
    fn overlays_carry_style_and_tooltip() {
        let overlays = year_overlays(
            &sample_dataset(),
            &ColumnConfig::default(),
            &OverlayStyle::default(),
        );
        let overlay = &overlays[0];

        assert!(!overlay.show);
        assert_eq!(overlay.style.color, "blue");
        assert_eq!(overlay.tooltip.fields, vec!["location", "category", "Deliv_Year"]);
        assert_eq!(overlay.tooltip.aliases, vec!["Location:", "Category:", "Year:"]);

        let props = overlay.data.features[0].properties.as_ref().unwrap();
        assert_eq!(props.get("location").unwrap(), "site-Some(2020)-Some(1)");
        assert!(overlay.data.features[0].geometry.is_some());
    }

    #[test]
    fn tile_providers() {
        let positron = resolve_tiles(&BaseMapConfig::default()).unwrap();
        assert!(positron.url.contains("light_all"));
        assert!(positron.attribution.contains("CARTO"));

        let custom = resolve_tiles(&BaseMapConfig {
            tiles: "https://tiles.example.com/{z}/{x}/{y}.png".to_string(),
            tile_attribution: Some("Example".to_string()),
            ..BaseMapConfig::default()
        })
        .unwrap();
        assert_eq!(custom.attribution, "Example");

        let unknown = resolve_tiles(&BaseMapConfig {
            tiles: "Stamen Toner".to_string(),
            ..BaseMapConfig::default()
        });
        assert!(matches!(unknown, Err(GenerateError::Config { .. })));
    }
}
