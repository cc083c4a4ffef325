//! Point classification against severity regions
//!
//! A point is first tested directly against the region polygons (slightly buffered, so
//! points exactly on a shared edge are not lost to rounding). Only when nothing matches,
//! the candidates near the point are projected into a local metric plane and any region
//! closer than the boundary threshold counts as a match. Among several matches the most
//! severe level wins.

use crate::query::QueryPoint;
use crate::region::{Level, Properties, Region};
use crate::{LocalProjection, RegionStore, utils};
use geo::{Distance, Euclidean, Point};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Default boundary tolerance in meters
pub const DEFAULT_DISTANCE_THRESHOLD_M: f64 = 1.0;

/// Half-width in degrees of the box standing in for the query point
const POINT_BUFFER_DEG: f64 = 1e-9;

/// Meters per degree used to size the boundary-match prefilter
const METERS_PER_DEGREE: f64 = utils::KM_PER_DEGREE * 1000.0;

/// The region that decided a classification
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MatchedRegion {
    pub level: Level,
    pub properties: Properties,
}

/// Outcome of classifying one point
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Classification {
    #[cfg_attr(feature = "serde", serde(rename = "in_polygon"))]
    pub in_region: bool,
    pub level: Option<Level>,
    #[cfg_attr(feature = "serde", serde(rename = "matched_info"))]
    pub matched: Option<MatchedRegion>,
}

impl Classification {
    fn not_found() -> Self {
        Self::default()
    }

    fn from_region(region: &Region) -> Self {
        Self {
            in_region: true,
            level: Some(region.level()),
            matched: Some(MatchedRegion {
                level: region.level(),
                properties: region.properties().clone(),
            }),
        }
    }
}

/// Classify `point` against the regions of `store`
///
/// `threshold_m` is the boundary tolerance used when the point is not inside any region.
/// Never fails: projection problems during the boundary check are logged and the point is
/// reported as outside every region.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn classify(point: &QueryPoint, store: &RegionStore, threshold_m: f64) -> Classification {
    let probe = utils::degree_box(point.lon, point.lat, POINT_BUFFER_DEG, POINT_BUFFER_DEG);
    let mut matches = store.query_intersecting(probe);

    if matches.is_empty() {
        matches = boundary_matches(point, store, threshold_m);
    }

    let winner = matches
        .into_iter()
        .filter_map(|i| store.get_region(i))
        .fold(None::<&Region>, |best, region| match best {
            Some(best) if best.level() >= region.level() => Some(best),
            _ => Some(region),
        });

    match winner {
        Some(region) => Classification::from_region(region),
        None => Classification::not_found(),
    }
}

/// Regions lying within `threshold_m` of the point, measured in a local metric plane
fn boundary_matches(point: &QueryPoint, store: &RegionStore, threshold_m: f64) -> Vec<usize> {
    #[cfg(feature = "profiling")]
    profiling::scope!("classify::boundary_matches");

    if threshold_m.is_nan() || threshold_m <= 0.0 {
        return Vec::new();
    }

    // Conservative degree box: longitude degrees shrink towards the poles
    let half_lat = threshold_m * utils::PREFILTER_SAFETY_FACTOR / METERS_PER_DEGREE;
    let half_lon = half_lat / point.lat.to_radians().cos().max(1e-6);
    let candidates = store.query_bbox(utils::degree_box(point.lon, point.lat, half_lon, half_lat));
    if candidates.is_empty() {
        return candidates;
    }

    let projection = match LocalProjection::new(point.lon, point.lat) {
        Ok(projection) => projection,
        Err(err) => {
            tracing::warn!(
                "Boundary check skipped for ({}, {}): {err}",
                point.lon,
                point.lat
            );
            return Vec::new();
        }
    };
    let origin = Point::new(0.0, 0.0);

    candidates
        .into_iter()
        .filter(|&i| {
            let Some(region) = store.get_region(i) else {
                return false;
            };
            match projection.project_repaired(region.geometry()) {
                Ok(projected) => Euclidean.distance(&origin, &projected) < threshold_m,
                Err(err) => {
                    tracing::debug!("Region {i} skipped in boundary check: {err}");
                    false
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::PropertyValue;
    use geo::polygon;

    fn square_region(min_x: f64, min_y: f64, max_x: f64, max_y: f64, level: Level) -> Region {
        let mut properties = Properties::new();
        properties.insert("level".to_string(), PropertyValue::Int(level));
        Region::new(
            polygon![
                (x: min_x, y: min_y),
                (x: max_x, y: min_y),
                (x: max_x, y: max_y),
                (x: min_x, y: max_y),
                (x: min_x, y: min_y),
            ],
            level,
            properties,
        )
        .unwrap()
    }

    fn point(lon: f64, lat: f64) -> QueryPoint {
        QueryPoint::new(lon, lat).unwrap()
    }

    #[test]
    fn test_point_inside_region() {
        let store = RegionStore::new(vec![square_region(10.0, -5.0, 20.0, 5.0, 5)]);
        let result = classify(&point(15.0, 0.0), &store, DEFAULT_DISTANCE_THRESHOLD_M);

        assert!(result.in_region);
        assert_eq!(result.level, Some(5));
        let matched = result.matched.unwrap();
        assert_eq!(matched.level, 5);
        assert_eq!(matched.properties.get("level"), Some(&PropertyValue::Int(5)));
    }

    #[test]
    fn test_point_outside_region() {
        let store = RegionStore::new(vec![square_region(10.0, -5.0, 20.0, 5.0, 5)]);
        let result = classify(&point(25.0, 0.0), &store, DEFAULT_DISTANCE_THRESHOLD_M);

        assert_eq!(result, Classification::not_found());
        assert!(!result.in_region);
        assert!(result.level.is_none());
        assert!(result.matched.is_none());
    }

    #[test]
    fn test_point_on_boundary_matches() {
        let store = RegionStore::new(vec![square_region(10.0, -5.0, 20.0, 5.0, 5)]);
        let result = classify(&point(20.0, 0.0), &store, DEFAULT_DISTANCE_THRESHOLD_M);
        assert_eq!(result.level, Some(5));
    }

    #[test]
    fn test_highest_level_wins() {
        let store = RegionStore::new(vec![
            square_region(10.0, -5.0, 20.0, 5.0, 5),
            square_region(14.0, -1.0, 16.0, 1.0, 7),
        ]);
        let result = classify(&point(15.0, 0.0), &store, DEFAULT_DISTANCE_THRESHOLD_M);
        assert_eq!(result.level, Some(7));
    }

    #[test]
    fn test_highest_of_three_overlapping_levels() {
        let store = RegionStore::new(vec![
            square_region(13.0, -2.0, 17.0, 2.0, 9),
            square_region(10.0, -5.0, 20.0, 5.0, 5),
            square_region(14.0, -1.0, 16.0, 1.0, 7),
        ]);
        let result = classify(&point(15.0, 0.0), &store, DEFAULT_DISTANCE_THRESHOLD_M);
        assert_eq!(result.level, Some(9));
    }

    #[test]
    fn test_equal_levels_pick_first_region() {
        let mut first = Properties::new();
        first.insert("name".to_string(), PropertyValue::Text("first".to_string()));
        let mut second = Properties::new();
        second.insert("name".to_string(), PropertyValue::Text("second".to_string()));

        let store = RegionStore::new(vec![
            Region::new(square_region(10.0, -5.0, 20.0, 5.0, 4).geometry().clone(), 4, first).unwrap(),
            Region::new(square_region(12.0, -3.0, 18.0, 3.0, 4).geometry().clone(), 4, second).unwrap(),
        ]);

        let result = classify(&point(15.0, 0.0), &store, DEFAULT_DISTANCE_THRESHOLD_M);
        let matched = result.matched.unwrap();
        assert_eq!(
            matched.properties.get("name"),
            Some(&PropertyValue::Text("first".to_string()))
        );
    }

    #[test]
    fn test_near_boundary_within_threshold() {
        let store = RegionStore::new(vec![square_region(10.0, -5.0, 20.0, 5.0, 5)]);
        // About 0.11 m east of the edge
        let near = point(20.000_001, 0.0);

        assert_eq!(classify(&near, &store, 1.0).level, Some(5));
        assert_eq!(classify(&near, &store, 0.01).level, None);
    }

    #[test]
    fn test_zero_threshold_disables_boundary_check() {
        let store = RegionStore::new(vec![square_region(10.0, -5.0, 20.0, 5.0, 5)]);
        assert_eq!(classify(&point(20.000_001, 0.0), &store, 0.0).level, None);
    }

    #[test]
    fn test_empty_store() {
        let store = RegionStore::new(Vec::new());
        assert_eq!(
            classify(&point(15.0, 0.0), &store, DEFAULT_DISTANCE_THRESHOLD_M),
            Classification::not_found()
        );
    }
}
