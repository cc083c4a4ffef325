//! GeoParquet reading
//!
//! One row per region. The `geometry` column holds WKB; every other column becomes a
//! property, so the `level` column is mandatory just like the GeoJSON `level` property.
//! Coordinates are taken as OGC:CRS84, the GeoParquet default.

use crate::region::{Level, Region};
use crate::store::{Reprojector, build_region, parse_level};
use crate::{DataError, Result};

use geo::{Geometry, MultiPolygon};
use geojson::JsonObject;
use geozero::ToGeo;
use geozero::wkb::Wkb;
use polars::prelude::*;
use std::fs::File;

/// Primary geometry column name used by GeoParquet writers
const GEOMETRY_COLUMN: &str = "geometry";

/// Read every row of a GeoParquet file into regions, in row order
pub(crate) fn read_regions(file: File) -> Result<Vec<Region>> {
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(e.to_string()))?;
    tracing::debug!(rows = df.height(), columns = df.width(), "GeoParquet read");

    let geometry = df
        .column(GEOMETRY_COLUMN)
        .map_err(|_| DataError::Parquet(format!("missing `{GEOMETRY_COLUMN}` column")))?;

    let mut regions = Vec::with_capacity(df.height());
    for index in 0..df.height() {
        let mut properties = JsonObject::new();
        for column in df.get_columns() {
            let name = column.name().to_string();
            if name == GEOMETRY_COLUMN {
                continue;
            }
            let value = column
                .get(index)
                .map_err(|e| DataError::Parquet(e.to_string()))?;
            properties.insert(name, json_from_any(value));
        }
        let level: Level = parse_level(index, properties.get("level"))?;

        let wkb = geometry
            .get(index)
            .map_err(|e| DataError::Parquet(e.to_string()))?;
        let geometry = match wkb {
            AnyValue::Null => None,
            AnyValue::Binary(bytes) => Some(multipolygon_from_wkb(index, bytes)?),
            AnyValue::BinaryOwned(bytes) => Some(multipolygon_from_wkb(index, &bytes)?),
            other => {
                return Err(DataError::Parquet(format!(
                    "row {index}: `{GEOMETRY_COLUMN}` is {} instead of WKB",
                    other.dtype()
                )));
            }
        };

        if let Some(region) =
            build_region(index, level, &properties, geometry, &Reprojector::Identity)?
        {
            regions.push(region);
        }
    }

    Ok(regions)
}

fn multipolygon_from_wkb(index: usize, bytes: &[u8]) -> Result<MultiPolygon<f64>> {
    let geometry = Wkb(bytes.to_vec())
        .to_geo()
        .map_err(|e| DataError::Parquet(format!("row {index}: invalid WKB ({e})")))?;
    multipolygon_from_geometry(index, geometry)
}

fn multipolygon_from_geometry(index: usize, geometry: Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        Geometry::GeometryCollection(collection) => {
            let mut polygons = Vec::new();
            for geometry in collection {
                polygons.extend(multipolygon_from_geometry(index, geometry)?.0);
            }
            Ok(MultiPolygon::new(polygons))
        }
        other => Err(DataError::UnsupportedGeometry {
            index,
            kind: geometry_kind(&other).to_string(),
        }),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Cell value as JSON, so columns share the GeoJSON property coercions
fn json_from_any(value: AnyValue<'_>) -> serde_json::Value {
    match value {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(v) => v.into(),
        AnyValue::Int8(v) => v.into(),
        AnyValue::Int16(v) => v.into(),
        AnyValue::Int32(v) => v.into(),
        AnyValue::Int64(v) => v.into(),
        AnyValue::UInt8(v) => v.into(),
        AnyValue::UInt16(v) => v.into(),
        AnyValue::UInt32(v) => v.into(),
        AnyValue::UInt64(v) => v.into(),
        AnyValue::Float32(v) => f64::from(v).into(),
        AnyValue::Float64(v) => v.into(),
        AnyValue::String(v) => v.into(),
        AnyValue::StringOwned(v) => v.as_str().into(),
        other => other.to_string().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PropertyValue, RegionStore};
    use approx::assert_relative_eq;

    /// Little-endian WKB polygon with a single ring
    fn wkb_polygon(ring: &[(f64, f64)]) -> Vec<u8> {
        let mut bytes = vec![1u8];
        bytes.extend(3u32.to_le_bytes());
        bytes.extend(1u32.to_le_bytes());
        bytes.extend((ring.len() as u32).to_le_bytes());
        for (x, y) in ring {
            bytes.extend(x.to_le_bytes());
            bytes.extend(y.to_le_bytes());
        }
        bytes
    }

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<u8> {
        wkb_polygon(&[
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ])
    }

    fn write_parquet(path: &std::path::Path, mut df: DataFrame) {
        let mut file = File::create(path).unwrap();
        ParquetWriter::new(&mut file).finish(&mut df).unwrap();
    }

    fn geometry_series(cells: &[&[u8]]) -> Series {
        BinaryChunked::from_slice(GEOMETRY_COLUMN.into(), cells).into_series()
    }

    #[test]
    fn test_geoparquet_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.parquet");
        let a = square(10.0, -5.0, 20.0, 5.0);
        let b = square(14.0, -1.0, 16.0, 1.0);
        let mut df = df![
            "level" => &[5i64, 7],
            "name" => &["rough", "high"],
        ]
        .unwrap();
        df.with_column(geometry_series(&[a.as_slice(), b.as_slice()]))
            .unwrap();
        write_parquet(&path, df);

        let store = RegionStore::load(&path).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.levels(), &[5, 7]);
        assert_eq!(
            store.get_region(1).unwrap().properties().get("name"),
            Some(&PropertyValue::Text("high".to_string()))
        );
        let bbox = store.bounding_box().unwrap();
        assert_relative_eq!(bbox.min().x, 10.0);
        assert_relative_eq!(bbox.max().y, 5.0);
    }

    #[test]
    fn test_geoparquet_missing_level_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.geoparquet");
        let a = square(0.0, 0.0, 1.0, 1.0);
        let mut df = df!["name" => &["no level"]].unwrap();
        df.with_column(geometry_series(&[a.as_slice()])).unwrap();
        write_parquet(&path, df);

        assert!(matches!(
            RegionStore::load(&path),
            Err(DataError::MissingLevel { index: 0 })
        ));
    }

    #[test]
    fn test_geoparquet_without_geometry_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.parquet");
        write_parquet(&path, df!["level" => &[1i64]].unwrap());

        assert!(matches!(RegionStore::load(&path), Err(DataError::Parquet(_))));
    }

    #[test]
    fn test_non_polygon_wkb_is_unsupported() {
        // WKB point (1, 2)
        let mut point = vec![1u8];
        point.extend(1u32.to_le_bytes());
        point.extend(1.0f64.to_le_bytes());
        point.extend(2.0f64.to_le_bytes());

        match multipolygon_from_wkb(4, &point) {
            Err(DataError::UnsupportedGeometry { index, kind }) => {
                assert_eq!(index, 4);
                assert_eq!(kind, "Point");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_cells_become_json() {
        assert_eq!(json_from_any(AnyValue::Int32(3)), serde_json::json!(3));
        assert_eq!(json_from_any(AnyValue::Float64(3.0)), serde_json::json!(3.0));
        assert_eq!(json_from_any(AnyValue::String("x")), serde_json::json!("x"));
        assert!(json_from_any(AnyValue::Null).is_null());
    }
}
