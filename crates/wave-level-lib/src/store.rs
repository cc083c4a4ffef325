//! RegionStore - Loaded, repaired regions plus their spatial index
//!
//! This module parses GeoJSON sources into [`Region`]s, reprojects them to WGS84, repairs
//! every geometry and builds the [`Quadtree`] prefilter. A store is read-only after
//! construction: the region sequence and the index never change.

use crate::region::{Level, Properties, PropertyValue, Region};
use crate::{DataError, Quadtree, Result, utils};

use geo::{BoundingRect, Coord, Intersects, LineString, MapCoords, MultiPolygon, Polygon, Rect};
use geojson::{Feature, GeoJson, JsonObject, Value};
use proj4rs::Proj;
use proj4rs::transform::transform;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Information about a region store
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StoreInfo {
    /// Number of regions loaded
    pub region_count: usize,
    /// Number of distinct levels
    pub level_count: usize,
    /// Total number of polygon vertices
    pub vertex_count: usize,
}

/// Coordinate reference systems a source may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceCrs {
    Wgs84,
    WebMercator,
    /// Any other EPSG code, reprojected through proj4rs
    Epsg(u16),
}

impl SourceCrs {
    /// Read the legacy `crs` member; an absent member means WGS84
    fn from_foreign_members(members: Option<&JsonObject>) -> Result<Self> {
        let crs = match members.and_then(|m| m.get("crs")) {
            None | Some(serde_json::Value::Null) => return Ok(SourceCrs::Wgs84),
            Some(crs) => crs,
        };

        let name = crs
            .pointer("/properties/name")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| DataError::UnsupportedCrs(crs.to_string()))?;
        Self::from_name(name)
    }

    /// Accepts `EPSG:xxxx`, `urn:ogc:def:crs:EPSG::xxxx` and `.../EPSG/0/xxxx` spellings
    fn from_name(name: &str) -> Result<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(SourceCrs::Wgs84);
        }
        if !upper.contains("EPSG") {
            return Err(DataError::UnsupportedCrs(name.to_string()));
        }

        let code = upper
            .rsplit([':', '/'])
            .next()
            .and_then(|code| code.parse::<u32>().ok())
            .ok_or_else(|| DataError::UnsupportedCrs(name.to_string()))?;
        match code {
            4326 => Ok(SourceCrs::Wgs84),
            3857 | 900913 => Ok(SourceCrs::WebMercator),
            code => u16::try_from(code)
                .map(SourceCrs::Epsg)
                .map_err(|_| DataError::UnsupportedCrs(name.to_string())),
        }
    }
}

/// Converts source coordinates to WGS84 degrees
pub(crate) enum Reprojector {
    Identity,
    WebMercator,
    Proj { source: Proj, target: Proj },
}

impl Reprojector {
    /// Fails with `UnsupportedCrs` when proj4rs has no definition for the code
    fn new(crs: SourceCrs) -> Result<Self> {
        match crs {
            SourceCrs::Wgs84 => Ok(Reprojector::Identity),
            SourceCrs::WebMercator => Ok(Reprojector::WebMercator),
            SourceCrs::Epsg(code) => {
                let unsupported = |e: proj4rs::errors::Error| {
                    DataError::UnsupportedCrs(format!("EPSG:{code} ({e})"))
                };
                let source = Proj::from_epsg_code(code).map_err(unsupported)?;
                let target = Proj::from_proj_string(WGS84_PROJ_STRING).map_err(unsupported)?;
                tracing::debug!("Reprojecting source from EPSG:{code}");
                Ok(Reprojector::Proj { source, target })
            }
        }
    }

    pub(crate) fn to_wgs84(&self, geometry: MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        match self {
            Reprojector::Identity => Ok(geometry),
            Reprojector::WebMercator => Ok(geometry.map_coords(|coord| {
                let (lat, lon) = utils::mercator_to_wgs84(coord.x, coord.y);
                Coord { x: lon, y: lat }
            })),
            Reprojector::Proj { source, target } => {
                geometry.try_map_coords(|coord| reproject(source, target, coord))
            }
        }
    }
}

const WGS84_PROJ_STRING: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// proj4rs works in radians on geographic systems
fn reproject(source: &Proj, target: &Proj, coord: Coord<f64>) -> Result<Coord<f64>> {
    let mut point = if source.is_latlong() {
        (coord.x.to_radians(), coord.y.to_radians(), 0.0)
    } else {
        (coord.x, coord.y, 0.0)
    };
    transform(source, target, &mut point).map_err(|e| {
        DataError::InvalidCoordinate(format!("cannot reproject ({}, {}): {e}", coord.x, coord.y))
    })?;

    let reprojected = Coord {
        x: point.0.to_degrees(),
        y: point.1.to_degrees(),
    };
    if !reprojected.x.is_finite() || !reprojected.y.is_finite() {
        return Err(DataError::InvalidCoordinate(format!(
            "reprojecting ({}, {}) gave a non-finite position",
            coord.x, coord.y
        )));
    }
    Ok(reprojected)
}

/// Immutable set of severity regions with a bounding-box index
#[derive(Debug, Clone)]
pub struct RegionStore {
    /// All regions, in source order
    regions: Vec<Region>,
    /// Spatial prefilter over the (post-repair) region bounding boxes
    index: Quadtree,
    /// Distinct levels, ascending
    levels: Vec<Level>,
    /// Combined bounding box in degrees (None if empty)
    bounding_box: Option<Rect<f64>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RegionStore {
    /// Build a store from regions: repairs every geometry, then indexes the result
    pub fn new(regions: Vec<Region>) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("store::new");

        // Repair in parallel; collect keeps source order
        let regions: Vec<Region> = regions.into_par_iter().map(Region::repaired).collect();

        let index = Quadtree::build(
            regions
                .iter()
                .enumerate()
                .map(|(i, region)| (i, region.bounding_box())),
        );

        let levels: Vec<Level> = regions
            .iter()
            .map(Region::level)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let bounding_box = regions
            .iter()
            .map(Region::bounding_box)
            .reduce(|acc, bbox| {
                Rect::new(
                    Coord {
                        x: acc.min().x.min(bbox.min().x),
                        y: acc.min().y.min(bbox.min().y),
                    },
                    Coord {
                        x: acc.max().x.max(bbox.max().x),
                        y: acc.max().y.max(bbox.max().y),
                    },
                )
            });

        tracing::debug!(
            regions = regions.len(),
            levels = levels.len(),
            index_depth = index.depth(),
            "Region store built"
        );

        Self {
            regions,
            index,
            levels,
            bounding_box,
        }
    }

    /// Load a region file: GeoParquet for `.parquet`/`.geoparquet`, GeoJSON otherwise
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("store::load");

        let path = path.as_ref();
        tracing::debug!("Loading regions from {}", path.display());

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        if matches!(extension.as_deref(), Some("parquet" | "geoparquet")) {
            return Self::load_geoparquet(path);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let geojson = GeoJson::from_reader(reader)?;
        Self::from_geojson(geojson)
    }

    #[cfg(feature = "geoparquet")]
    fn load_geoparquet(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let regions = crate::parquet::read_regions(file)?;
        Ok(Self::new(regions))
    }

    #[cfg(not(feature = "geoparquet"))]
    fn load_geoparquet(path: &Path) -> Result<Self> {
        Err(DataError::UnsupportedFormat(format!(
            "{} is GeoParquet; rebuild with the `geoparquet` feature",
            path.display()
        )))
    }

    /// Parse a GeoJSON document held in memory
    pub fn from_geojson_str(source: &str) -> Result<Self> {
        let geojson: GeoJson = source.parse()?;
        Self::from_geojson(geojson)
    }

    /// Build a store from a parsed GeoJSON document
    ///
    /// Every feature must carry an integral `level` property; the first feature without
    /// one fails the whole load.
    pub fn from_geojson(geojson: GeoJson) -> Result<Self> {
        let (features, crs) = match geojson {
            GeoJson::FeatureCollection(collection) => {
                let crs = SourceCrs::from_foreign_members(collection.foreign_members.as_ref())?;
                (collection.features, crs)
            }
            GeoJson::Feature(feature) => {
                let crs = SourceCrs::from_foreign_members(feature.foreign_members.as_ref())?;
                (vec![feature], crs)
            }
            GeoJson::Geometry(_) => return Err(DataError::EmptySource),
        };

        let reprojector = Reprojector::new(crs)?;
        let mut regions = Vec::with_capacity(features.len());
        for (index, feature) in features.into_iter().enumerate() {
            if let Some(region) = parse_feature(index, feature, &reprojector)? {
                regions.push(region);
            }
        }

        Ok(Self::new(regions))
    }

    /// Indices of regions whose bounding box intersects `area`, in source order
    #[inline]
    pub fn query_bbox(&self, area: Rect<f64>) -> Vec<usize> {
        self.index.query(area)
    }

    /// Indices of regions whose geometry intersects `area`, in source order
    ///
    /// Bounding-box prefilter first, exact polygon test second.
    pub fn query_intersecting(&self, area: Rect<f64>) -> Vec<usize> {
        self.index
            .query(area)
            .into_iter()
            .filter(|&i| self.regions[i].geometry().intersects(&area))
            .collect()
    }

    /// Distinct levels present in the store, ascending
    #[inline]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Get all regions
    #[inline]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Get a reference to a specific region by index
    #[inline]
    pub fn get_region(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    /// Get total number of regions
    #[inline]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Check if the store is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Combined bounding box of all regions in degrees
    #[inline]
    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.bounding_box
    }

    /// Get store information
    pub fn info(&self) -> StoreInfo {
        StoreInfo {
            region_count: self.regions.len(),
            level_count: self.levels.len(),
            vertex_count: self.regions.iter().map(Region::vertex_count).sum(),
        }
    }
}

/// Turn one feature into a region; `Ok(None)` for features with a null or empty geometry
fn parse_feature(
    index: usize,
    feature: Feature,
    reprojector: &Reprojector,
) -> Result<Option<Region>> {
    let properties = feature.properties.unwrap_or_default();
    let level = parse_level(index, properties.get("level"))?;

    let geometry = match feature.geometry {
        Some(geometry) => Some(multipolygon_from_value(index, geometry.value)?),
        None => None,
    };
    build_region(index, level, &properties, geometry, reprojector)
}

/// Shared tail of every source format: skip missing or empty geometry, reproject, wrap up
pub(crate) fn build_region(
    index: usize,
    level: Level,
    properties: &JsonObject,
    geometry: Option<MultiPolygon<f64>>,
    reprojector: &Reprojector,
) -> Result<Option<Region>> {
    let Some(geometry) = geometry else {
        tracing::warn!("Skipping feature {index} (level {level}) without geometry");
        return Ok(None);
    };
    if geometry.bounding_rect().is_none() {
        tracing::warn!("Skipping feature {index} (level {level}) with empty geometry");
        return Ok(None);
    }
    let geometry = reprojector.to_wgs84(geometry)?;

    let properties: Properties = properties
        .iter()
        .map(|(key, value)| (key.clone(), PropertyValue::from(value)))
        .collect();

    match Region::new(geometry, level, properties) {
        Ok(region) => Ok(Some(region)),
        Err(DataError::EmptyGeometry { .. }) => {
            tracing::warn!("Skipping feature {index} (level {level}) with empty geometry");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Read the mandatory `level` property; integral floats such as `3.0` are accepted
pub(crate) fn parse_level(index: usize, value: Option<&serde_json::Value>) -> Result<Level> {
    let value = match value {
        None | Some(serde_json::Value::Null) => return Err(DataError::MissingLevel { index }),
        Some(value) => value,
    };

    if let Some(level) = value.as_i64() {
        return Ok(level);
    }

    match value.as_f64() {
        Some(level) if level.is_finite() && level.fract() == 0.0 && level.abs() < i64::MAX as f64 => {
            Ok(level as Level)
        }
        _ => Err(DataError::InvalidLevel {
            index,
            value: value.to_string(),
        }),
    }
}

/// Convert a GeoJSON geometry into a multipolygon
fn multipolygon_from_value(index: usize, value: Value) -> Result<MultiPolygon<f64>> {
    match value {
        Value::Polygon(rings) => Ok(MultiPolygon::new(vec![polygon_from_rings(index, &rings)?])),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .map(|rings| polygon_from_rings(index, rings))
            .collect::<Result<Vec<_>>>()
            .map(MultiPolygon::new),
        Value::GeometryCollection(geometries) => {
            let mut polygons = Vec::new();
            for geometry in geometries {
                polygons.extend(multipolygon_from_value(index, geometry.value)?.0);
            }
            Ok(MultiPolygon::new(polygons))
        }
        other => Err(DataError::UnsupportedGeometry {
            index,
            kind: geometry_kind(&other).to_string(),
        }),
    }
}

fn polygon_from_rings(index: usize, rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| ring_from_positions(index, ring));
    let exterior = match rings.next() {
        Some(exterior) => exterior?,
        None => LineString::new(Vec::new()),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_from_positions(index: usize, positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(DataError::InvalidCoordinate(format!(
                "feature {index} has malformed position {position:?}"
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn geometry_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
