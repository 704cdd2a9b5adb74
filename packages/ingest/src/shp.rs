//! ESRI Shapefile reader.

use std::path::Path;
use std::sync::Arc;

use connectivity_map_models::ConnectivityFeature;
use connectivity_map_models::config::ColumnConfig;
use connectivity_map_spatial::CrsDefinition;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{Reader, Shape};

use crate::attributes::{field_as_i32, field_as_string};
use crate::progress::ProgressCallback;
use crate::{DetectedCrs, IngestError, RawDataset, unwrap_single_part};

/// Reads every shape and its dBase record.
///
/// Null shapes are skipped. The CRS comes from the `.prj` sidecar next to
/// the `.shp`, if one exists.
///
/// # Errors
///
/// Returns [`IngestError`] if the shapefile or its `.prj` cannot be read,
/// a configured column is absent, or a shape cannot be converted.
pub fn read_shapefile(
    path: &Path,
    columns: &ColumnConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<RawDataset, IngestError> {
    let detected_crs = detect_prj(path)?;

    let mut reader = Reader::from_path(path)?;
    progress.set_message(format!("Reading {}", path.display()));

    // The count comes from the `.shx` index; without one the bar stays a
    // spinner.
    match reader.shape_count() {
        Ok(total) => progress.set_total(total as u64),
        Err(e) => log::debug!("Shape count unavailable: {e}"),
    }

    let mut features = Vec::new();
    let mut null_shapes = 0u64;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        progress.inc(1);

        if matches!(shape, Shape::NullShape) {
            null_shapes += 1;
            continue;
        }

        let geometry: geo::Geometry<f64> =
            shape.try_into().map_err(|e| IngestError::Conversion {
                message: format!("Failed to convert shape: {e:?}"),
            })?;

        features.push(ConnectivityFeature {
            geometry: unwrap_single_part(geometry),
            delivery_year: field_as_i32(column(&record, &columns.year, path)?),
            category: field_as_i32(column(&record, &columns.category, path)?),
            location: field_as_string(column(&record, &columns.location, path)?),
        });
    }

    if null_shapes > 0 {
        log::debug!("Skipped {null_shapes} null shapes");
    }

    progress.finish(format!("Read {} features", features.len()));

    Ok(RawDataset {
        features,
        detected_crs,
    })
}

fn column<'a>(record: &'a Record, name: &str, path: &Path) -> Result<&'a FieldValue, IngestError> {
    record.get(name).ok_or_else(|| IngestError::MissingColumn {
        column: name.to_string(),
        path: path.to_path_buf(),
    })
}

/// Reads the `.prj` sidecar and identifies the CRS it declares.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the sidecar exists but cannot be read.
pub fn detect_prj(shp_path: &Path) -> Result<DetectedCrs, IngestError> {
    let prj_path = shp_path.with_extension("prj");

    if !prj_path.exists() {
        return Ok(DetectedCrs::Unspecified);
    }

    let wkt = std::fs::read_to_string(&prj_path).map_err(|source| IngestError::Io {
        path: prj_path.clone(),
        source,
    })?;

    Ok(detect_wkt(&wkt))
}

/// Identifies the CRS declared by a WKT document.
#[must_use]
pub fn detect_wkt(wkt: &str) -> DetectedCrs {
    if wkt.trim().is_empty() {
        return DetectedCrs::Unspecified;
    }

    CrsDefinition::from_wkt(wkt).map_or_else(
        || DetectedCrs::Unrecognized(wkt.trim().to_string()),
        DetectedCrs::Known,
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use geo::Geometry;

    use super::*;

    const POLYLINE: i32 = 3;
    const POLYGON: i32 = 5;

    type Field = (&'static str, u8, u8);

    const FIELDS: &[Field] = &[
        ("Deliv_Year", b'N', 6),
        ("category", b'N', 4),
        ("location", b'C', 20),
    ];

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "connectivity_map_shp_{name}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn extent(points: &[(f64, f64)]) -> [f64; 4] {
        points.iter().fold(
            [f64::MAX, f64::MAX, f64::MIN, f64::MIN],
            |b, &(x, y)| [b[0].min(x), b[1].min(y), b[2].max(x), b[3].max(y)],
        )
    }

    fn file_header(shape_type: i32, file_len: usize, bbox: [f64; 4]) -> Vec<u8> {
        let mut out = Vec::with_capacity(100);
        out.extend(9994_i32.to_be_bytes());
        out.extend([0_u8; 20]);
        out.extend(i32::try_from(file_len / 2).unwrap().to_be_bytes());
        out.extend(1000_i32.to_le_bytes());
        out.extend(shape_type.to_le_bytes());
        for v in bbox {
            out.extend(v.to_le_bytes());
        }
        out.extend([0_u8; 32]);
        out
    }

    /// Record body of a single-part polyline or polygon.
    fn poly_record(shape_type: i32, points: &[(f64, f64)]) -> Vec<u8> {
        let mut out = shape_type.to_le_bytes().to_vec();
        for v in extent(points) {
            out.extend(v.to_le_bytes());
        }
        out.extend(1_i32.to_le_bytes());
        out.extend(i32::try_from(points.len()).unwrap().to_le_bytes());
        out.extend(0_i32.to_le_bytes());
        for (x, y) in points {
            out.extend(x.to_le_bytes());
            out.extend(y.to_le_bytes());
        }
        out
    }

    /// dBase III table with one row per record.
    fn dbf(fields: &[Field], rows: &[&[&str]]) -> Vec<u8> {
        let header_len = 32 + 32 * fields.len() + 1;
        let record_len = 1 + fields.iter().map(|f| usize::from(f.2)).sum::<usize>();

        let mut out = vec![0x03, 124, 1, 1];
        out.extend(u32::try_from(rows.len()).unwrap().to_le_bytes());
        out.extend(u16::try_from(header_len).unwrap().to_le_bytes());
        out.extend(u16::try_from(record_len).unwrap().to_le_bytes());
        out.extend([0_u8; 20]);

        for (name, kind, len) in fields {
            let mut descriptor = [0_u8; 32];
            descriptor[..name.len()].copy_from_slice(name.as_bytes());
            descriptor[11] = *kind;
            descriptor[16] = *len;
            out.extend(descriptor);
        }
        out.push(0x0D);

        for row in rows {
            out.push(b' ');
            for ((_, kind, len), value) in fields.iter().zip(row.iter()) {
                let width = usize::from(*len);
                let cell = if *kind == b'N' {
                    format!("{value:>width$}")
                } else {
                    format!("{value:<width$}")
                };
                out.extend(cell.as_bytes());
            }
        }
        out.push(0x1A);
        out
    }

    /// Writes `.shp`, `.shx` and `.dbf` files; `None` shapes become null
    /// records.
    fn write_fixture(
        shp: &Path,
        shape_type: i32,
        shapes: &[Option<Vec<(f64, f64)>>],
        fields: &[Field],
        rows: &[&[&str]],
    ) {
        let records: Vec<Vec<u8>> = shapes
            .iter()
            .map(|shape| {
                shape.as_ref().map_or_else(
                    || 0_i32.to_le_bytes().to_vec(),
                    |points| poly_record(shape_type, points),
                )
            })
            .collect();

        let points: Vec<(f64, f64)> = shapes.iter().flatten().flatten().copied().collect();
        let bbox = extent(&points);

        let shp_len = 100 + records.iter().map(|r| 8 + r.len()).sum::<usize>();
        let mut shp_bytes = file_header(shape_type, shp_len, bbox);
        let mut shx_bytes = file_header(shape_type, 100 + 8 * records.len(), bbox);

        for (i, record) in records.iter().enumerate() {
            let offset = i32::try_from(shp_bytes.len() / 2).unwrap();
            let words = i32::try_from(record.len() / 2).unwrap();

            shx_bytes.extend(offset.to_be_bytes());
            shx_bytes.extend(words.to_be_bytes());

            shp_bytes.extend(i32::try_from(i + 1).unwrap().to_be_bytes());
            shp_bytes.extend(words.to_be_bytes());
            shp_bytes.extend(record);
        }

        std::fs::write(shp, shp_bytes).unwrap();
        std::fs::write(shp.with_extension("shx"), shx_bytes).unwrap();
        std::fs::write(shp.with_extension("dbf"), dbf(fields, rows)).unwrap();
    }

    #[derive(Default)]
    struct RecordingProgress {
        total: Mutex<Option<u64>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn set_total(&self, total: u64) {
            *self.total.lock().unwrap() = Some(total);
        }
        fn inc(&self, _delta: u64) {}
        fn set_message(&self, _msg: String) {}
        fn finish(&self, _msg: String) {}
    }

    #[test]
    fn reads_polylines_and_skips_null_shapes() {
        let dir = scratch_dir("lines");
        let path = dir.join("paths.shp");
        write_fixture(
            &path,
            POLYLINE,
            &[
                Some(vec![(-6.2, 53.3), (-6.25, 53.35), (-6.3, 53.4)]),
                None,
            ],
            FIELDS,
            &[&["2020", "1", "Dublin"], &["2021", "2", "Nowhere"]],
        );

        let recording = Arc::new(RecordingProgress::default());
        let progress: Arc<dyn ProgressCallback> = recording.clone();
        let raw = read_shapefile(&path, &ColumnConfig::default(), &progress).unwrap();

        assert_eq!(*recording.total.lock().unwrap(), Some(2));
        assert_eq!(raw.detected_crs, DetectedCrs::Unspecified);
        assert_eq!(raw.features.len(), 1, "null shape should be skipped");

        let feature = &raw.features[0];
        let Geometry::LineString(line) = &feature.geometry else {
            panic!("expected a single-part line, got {:?}", feature.geometry);
        };
        assert_eq!(line.0.len(), 3);
        assert!((line.0[2].x - -6.3).abs() < 1e-12);
        assert_eq!(feature.delivery_year, Some(2020));
        assert_eq!(feature.category, Some(1));
        assert_eq!(feature.location.as_deref(), Some("Dublin"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reads_polygons_with_blank_attributes() {
        let dir = scratch_dir("polygons");
        let path = dir.join("areas.shp");
        // Clockwise outer ring.
        write_fixture(
            &path,
            POLYGON,
            &[Some(vec![
                (-8.5, 51.8),
                (-8.5, 51.9),
                (-8.4, 51.9),
                (-8.4, 51.8),
                (-8.5, 51.8),
            ])],
            FIELDS,
            &[&["", "2", "Cork"]],
        );

        let raw = read_shapefile(
            &path,
            &ColumnConfig::default(),
            &crate::progress::null_progress(),
        )
        .unwrap();

        assert_eq!(raw.features.len(), 1);
        let feature = &raw.features[0];
        assert!(
            matches!(feature.geometry, Geometry::Polygon(_)),
            "expected a single polygon, got {:?}",
            feature.geometry
        );
        assert_eq!(feature.delivery_year, None);
        assert_eq!(feature.category, Some(2));
        assert_eq!(feature.location.as_deref(), Some("Cork"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_year_column_is_an_error() {
        let dir = scratch_dir("no_year");
        let path = dir.join("paths.shp");
        write_fixture(
            &path,
            POLYLINE,
            &[Some(vec![(-6.2, 53.3), (-6.3, 53.4)])],
            &[("category", b'N', 4), ("location", b'C', 20)],
            &[&["1", "Dublin"]],
        );

        let err = read_shapefile(
            &path,
            &ColumnConfig::default(),
            &crate::progress::null_progress(),
        )
        .unwrap_err();

        assert!(
            matches!(&err, IngestError::MissingColumn { column, .. } if column == "Deliv_Year"),
            "got {err:?}"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn blank_prj_is_unspecified() {
        assert_eq!(detect_wkt("  \n"), DetectedCrs::Unspecified);
    }

    #[test]
    fn irish_transverse_mercator_prj_is_known() {
        let wkt = r#"PROJCS["IRENET95_Irish_Transverse_Mercator",GEOGCS["GCS_IRENET95"],PROJECTION["Transverse_Mercator"]]"#;
        let DetectedCrs::Known(crs) = detect_wkt(wkt) else {
            panic!("expected a known CRS");
        };
        assert_eq!(crs.label(), "EPSG:2157");
    }

    #[test]
    fn unknown_prj_is_unrecognized() {
        let wkt = r#"PROJCS["Local_Grid",GEOGCS["GCS_Local"]]"#;
        assert!(matches!(detect_wkt(wkt), DetectedCrs::Unrecognized(_)));
    }

    #[test]
    fn missing_prj_is_unspecified() {
        let path = std::env::temp_dir().join("connectivity_map_no_sidecar.shp");
        assert_eq!(detect_prj(&path).unwrap(), DetectedCrs::Unspecified);
    }

    #[test]
    fn missing_shapefile_is_an_error() {
        let path = std::env::temp_dir().join("connectivity_map_missing_input.shp");
        let result = read_shapefile(
            &path,
            &ColumnConfig::default(),
            &crate::progress::null_progress(),
        );
        assert!(result.is_err());
    }
}
