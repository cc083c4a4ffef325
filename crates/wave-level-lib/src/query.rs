//! Combined point query: classification plus per-level distances

use crate::classify::{Classification, DEFAULT_DISTANCE_THRESHOLD_M, classify};
use crate::distance::{DistanceOptions, LevelDistance, resolve};
use crate::{DataError, RegionStore, Result, utils};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Default number of digits kept in reported distances
pub const DEFAULT_DECIMAL_PLACES: u32 = 3;

/// A validated query location
///
/// Longitude is normalized into [0, 360); latitude is within [-90, 90].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct QueryPoint {
    pub lon: f64,
    pub lat: f64,
}

impl QueryPoint {
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(DataError::InvalidCoordinate(format!(
                "({lon}, {lat}) is not a finite coordinate"
            )));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(DataError::InvalidCoordinate(format!(
                "latitude {lat} is outside [-90, 90]"
            )));
        }

        Ok(Self {
            lon: utils::normalize_longitude(lon),
            lat,
        })
    }
}

/// Query parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryOptions {
    /// Optional search radius in kilometers
    pub radius_km: Option<f64>,
    /// Boundary tolerance in meters
    pub distance_threshold_m: f64,
    /// Digits kept after the decimal point
    pub decimal_places: u32,
    /// Report the bearing to each level
    pub with_bearing: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            radius_km: None,
            distance_threshold_m: DEFAULT_DISTANCE_THRESHOLD_M,
            decimal_places: DEFAULT_DECIMAL_PLACES,
            with_bearing: false,
        }
    }
}

impl QueryOptions {
    fn distance_options(&self) -> DistanceOptions {
        DistanceOptions {
            radius_km: self.radius_km,
            decimal_places: self.decimal_places,
            with_bearing: self.with_bearing,
        }
    }
}

/// Everything known about one query point
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct QueryResult {
    pub query_point: QueryPoint,
    pub current_level: Classification,
    /// Ascending by level, one entry per level
    pub level_distances: Vec<LevelDistance>,
}

/// Classify `(lon, lat)` and measure its distance to every level of `store`
///
/// Fails only on invalid coordinates or options. Levels whose projection fails are
/// left out of `level_distances`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn query(store: &RegionStore, lon: f64, lat: f64, options: &QueryOptions) -> Result<QueryResult> {
    let query_point = QueryPoint::new(lon, lat)?;
    if let Some(radius_km) = options.radius_km {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(DataError::InvalidCoordinate(format!(
                "search radius {radius_km} km must be a non-negative number"
            )));
        }
    }

    let current_level = classify(&query_point, store, options.distance_threshold_m);
    let report = resolve(&query_point, store, &options.distance_options());

    let skipped = report.skipped().count();
    if skipped > 0 {
        tracing::debug!("{skipped} level(s) skipped for ({}, {})", query_point.lon, query_point.lat);
    }
    let level_distances = report.into_distances();

    tracing::debug!(
        lon = query_point.lon,
        lat = query_point.lat,
        level = ?current_level.level,
        levels_measured = level_distances.len(),
        "Query complete"
    );

    Ok(QueryResult {
        query_point,
        current_level,
        level_distances,
    })
}
