//! Standalone HTML rendering of a [`MapDocument`].
//!
//! The page loads Leaflet and `leaflet.heat` from a CDN and embeds the
//! document as a single JSON object; a short inline script turns it into
//! tile, heat, and `GeoJSON` layers plus a layer control.

use std::path::Path;

use connectivity_map_models::MapDocument;

use crate::GenerateError;

const TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"
    integrity="sha256-p4NxAoJBhIIN+hmNHrzRCf9tD/miZyoHS5obTRR9BMY=" crossorigin="" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"
    integrity="sha256-20nQCchB9co0qIjJZRGuk2/Z9VM+kNiyxNV1lvTlZBo=" crossorigin=""></script>
  <script src="https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js"></script>
  <script src="https://unpkg.com/leaflet.featuregroup.subgroup@1.0.2/dist/leaflet.featuregroup.subgroup.js"></script>
  <style>
    html, body { height: 100%; margin: 0; }
    #map { position: absolute; inset: 0; }
    .leaflet-tooltip table th { text-align: left; padding-right: 6px; }
  </style>
</head>
<body>
  <div id="map"></div>
  <script>
    const data = {{MAP_DATA}};

    function escapeHtml(value) {
      return String(value ?? '').replace(/[&<>"']/g, (c) => ({
        '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;',
      }[c]));
    }

    function tooltipHtml(properties, tooltip) {
      const rows = tooltip.fields.map((field, i) =>
        `<tr><th>${escapeHtml(tooltip.aliases[i])}</th><td>${escapeHtml(properties[field])}</td></tr>`);
      return `<table>${rows.join('')}</table>`;
    }

    function yearLayer(overlay) {
      return L.geoJSON(overlay.data, {
        style: () => overlay.style,
        onEachFeature: (feature, layer) => {
          layer.bindTooltip(tooltipHtml(feature.properties || {}, overlay.tooltip), { sticky: true });
        },
      });
    }

    const map = L.map('map').setView(data.base.center, data.base.zoomStart);

    const tiles = L.tileLayer(data.base.tiles.url, {
      attribution: data.base.tiles.attribution,
      subdomains: 'abcd',
      maxZoom: 20,
    }).addTo(map);

    const overlays = {};

    for (const heat of data.heatmaps) {
      overlays[heat.name] = L.heatLayer(heat.points).addTo(map);
    }

    const yearly = L.featureGroup();
    overlays[data.yearly.name] = yearly;
    if (data.yearly.show) {
      yearly.addTo(map);
    }

    for (const overlay of data.yearly.overlays) {
      const layer = L.featureGroup.subGroup(yearly, [yearLayer(overlay)]);
      overlays[overlay.name] = layer;
      if (overlay.show) {
        layer.addTo(map);
      }
    }

    const baseLayers = {};
    baseLayers[data.base.tiles.name] = tiles;

    L.control.layers(baseLayers, overlays, { collapsed: data.layerControl.collapsed }).addTo(map);
  </script>
</body>
</html>
"#;

/// Renders the document into a standalone HTML page.
///
/// # Errors
///
/// Returns [`GenerateError::Json`] if the document cannot be serialized.
pub fn render_html(document: &MapDocument) -> Result<String, GenerateError> {
    let json = serde_json::to_string(document)?;

    Ok(TEMPLATE
        .replace("{{TITLE}}", &escape_html(&document.title))
        .replace("{{MAP_DATA}}", &escape_script(&json)))
}

/// Renders the document and writes it to `path`, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`GenerateError::Save`] if the file cannot be written.
pub fn write_html(document: &MapDocument, path: &Path) -> Result<(), GenerateError> {
    let html = render_html(document)?;

    let save_error = |source| GenerateError::Save {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(save_error)?;
    }

    std::fs::write(path, html).map_err(save_error)?;
    log::info!("Interactive map saved to: {}", path.display());
    Ok(())
}

/// Keeps embedded JSON from closing the surrounding `<script>` element.
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
