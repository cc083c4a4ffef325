//! Per-level nearest distance
//!
//! For every distinct level, the regions of that level are projected into a plane centered
//! on the query point, merged, and measured from the origin. Levels are independent: a
//! projection failure only removes the affected level from the report.

use crate::query::{DEFAULT_DECIMAL_PLACES, QueryPoint};
use crate::region::Level;
use crate::{LocalProjection, ProjectionError, RegionStore, utils};
use geo::{Closest, ClosestPoint, Distance, Euclidean, MultiPolygon, Point, Polygon, unary_union};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Nearest distance from the query point to one level's combined area
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LevelDistance {
    pub level: Level,
    /// Geodesic distance in kilometers, rounded
    pub distance_km: f64,
    /// Direction to the nearest point, degrees clockwise from north; absent inside the area
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub bearing_deg: Option<f64>,
}

/// What happened to a single level during resolution
#[derive(Clone, Debug, PartialEq)]
pub enum LevelOutcome {
    /// Distance computed and within the radius (if any)
    Measured(LevelDistance),
    /// Distance computed but beyond the search radius
    OutOfRange { level: Level, distance_km: f64 },
    /// Projection failed for this level
    Skipped { level: Level, error: ProjectionError },
}

impl LevelOutcome {
    pub fn level(&self) -> Level {
        match self {
            LevelOutcome::Measured(distance) => distance.level,
            LevelOutcome::OutOfRange { level, .. } | LevelOutcome::Skipped { level, .. } => *level,
        }
    }
}

/// Outcomes of every level that had candidate regions, ascending by level
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistanceReport {
    pub outcomes: Vec<LevelOutcome>,
}

impl DistanceReport {
    /// Measured distances, ascending by level
    pub fn distances(&self) -> impl Iterator<Item = &LevelDistance> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            LevelOutcome::Measured(distance) => Some(distance),
            _ => None,
        })
    }

    /// Consume the report, keeping only the measured distances
    pub fn into_distances(self) -> Vec<LevelDistance> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                LevelOutcome::Measured(distance) => Some(distance),
                _ => None,
            })
            .collect()
    }

    /// Levels whose projection failed, with the reason
    pub fn skipped(&self) -> impl Iterator<Item = (Level, &ProjectionError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            LevelOutcome::Skipped { level, error } => Some((*level, error)),
            _ => None,
        })
    }
}

/// Parameters for [`resolve`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceOptions {
    /// Search radius in kilometers; levels farther away are dropped
    pub radius_km: Option<f64>,
    /// Digits kept after the decimal point in `distance_km`
    pub decimal_places: u32,
    /// Also compute the bearing to the nearest point
    pub with_bearing: bool,
}

impl Default for DistanceOptions {
    fn default() -> Self {
        Self {
            radius_km: None,
            decimal_places: DEFAULT_DECIMAL_PLACES,
            with_bearing: false,
        }
    }
}

/// Compute the nearest distance from `point` to each level of `store`
///
/// With a radius, candidate regions are first narrowed with an oversized degree box and the
/// exact cutoff is applied to the measured distance. Levels left without candidates do not
/// appear in the report at all.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn resolve(point: &QueryPoint, store: &RegionStore, options: &DistanceOptions) -> DistanceReport {
    let candidates: Vec<usize> = match options.radius_km {
        Some(radius_km) => {
            store.query_intersecting(utils::radius_prefilter_box(point.lon, point.lat, radius_km))
        }
        None => (0..store.len()).collect(),
    };

    // Group candidates by level; BTreeMap keeps levels ascending
    let mut by_level: BTreeMap<Level, Vec<usize>> = BTreeMap::new();
    for index in candidates {
        if let Some(region) = store.get_region(index) {
            by_level.entry(region.level()).or_default().push(index);
        }
    }

    let outcomes = by_level
        .into_iter()
        .map(|(level, indices)| {
            let outcome = resolve_level(point, store, level, &indices, options);
            if let LevelOutcome::Skipped { error, .. } = &outcome {
                tracing::warn!("Failed to measure level {level}: {error}");
            }
            outcome
        })
        .collect();

    DistanceReport { outcomes }
}

fn resolve_level(
    point: &QueryPoint,
    store: &RegionStore,
    level: Level,
    indices: &[usize],
    options: &DistanceOptions,
) -> LevelOutcome {
    #[cfg(feature = "profiling")]
    profiling::scope!("distance::resolve_level");

    let measured = LocalProjection::new(point.lon, point.lat).and_then(|projection| {
        let mut parts: Vec<Polygon<f64>> = Vec::new();
        for region in indices.iter().filter_map(|&i| store.get_region(i)) {
            parts.extend(projection.project_repaired(region.geometry())?.0);
        }
        let merged: MultiPolygon<f64> = unary_union(parts.iter());
        if merged.0.is_empty() {
            return Err(ProjectionError::EmptyGeometry);
        }

        let origin = projection.project_point(projection.center())?;
        let bearing = if options.with_bearing {
            bearing_to(&origin, &merged)
        } else {
            None
        };
        Ok((Euclidean.distance(&origin, &merged), bearing))
    });

    let (distance_m, bearing_deg) = match measured {
        Ok(measured) => measured,
        Err(error) => return LevelOutcome::Skipped { level, error },
    };

    let distance_km = utils::round_to(distance_m / 1000.0, options.decimal_places);
    if let Some(radius_km) = options.radius_km {
        if distance_m > radius_km * 1000.0 {
            return LevelOutcome::OutOfRange { level, distance_km };
        }
    }

    LevelOutcome::Measured(LevelDistance {
        level,
        distance_km,
        bearing_deg: bearing_deg.map(|bearing| round_bearing(bearing, options.decimal_places)),
    })
}

/// Round a bearing and keep it in [0, 360): 359.9996 at three places is 0.0, not 360.0
fn round_bearing(bearing: f64, decimal_places: u32) -> f64 {
    utils::round_to(bearing, decimal_places).rem_euclid(360.0)
}

/// Bearing from `origin` to the nearest point of `area`, in [0, 360)
fn bearing_to(origin: &Point<f64>, area: &MultiPolygon<f64>) -> Option<f64> {
    match area.closest_point(origin) {
        Closest::SinglePoint(nearest) if nearest != *origin => {
            let delta = nearest - *origin;
            // atan2(east, north) is clockwise from north
            let bearing = delta.x().atan2(delta.y()).to_degrees();
            Some(bearing.rem_euclid(360.0))
        }
        _ => None,
    }
}
