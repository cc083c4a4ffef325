//! Local azimuthal-equidistant projection
//!
//! A [`LocalProjection`] is a plane centered exactly on a query point. Every coordinate is
//! placed at its geodesic (WGS84) distance from the center, along its geodesic azimuth, so
//! the planar distance from the origin to any projected point is the true geodesic
//! distance. Distances between two non-origin points are only approximate, which is fine
//! because every measurement taken in this plane starts at the origin.

use crate::repair::repair;
use crate::utils;
use geo::{
    Bearing, Coord, Distance, Geodesic, Intersects, LinesIter, MapCoords, MultiPolygon, Point,
};

/// Latitudes closer than this to a pole are treated as a degenerate center
const POLE_EPSILON_DEG: f64 = 1e-9;

/// Longest planar edge that can come from a real polygon edge: the geodesic distance from
/// the center to its antipode (half a WGS84 meridian). Longer edges wrap around the antipode.
const MAX_PROJECTED_EDGE_M: f64 = 20_003_931.46;

/// Half-width of the box around the antipode that a geometry must stay clear of
const ANTIPODE_MARGIN_DEG: f64 = 0.01;

/// Failure to build or apply a local projection
///
/// These never abort a whole query: callers skip the affected level or fallback stage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("projection center ({lon}, {lat}) is degenerate")]
    DegenerateCenter { lon: f64, lat: f64 },

    #[error("non-finite coordinate produced while projecting ({lon}, {lat})")]
    NonFinite { lon: f64, lat: f64 },

    #[error("projected edge of {length_m:.0} m wraps around the antipode of the center")]
    AntipodalTear { length_m: f64 },

    #[error("geometry covers the antipode ({lon}, {lat}) of the center")]
    CoversAntipode { lon: f64, lat: f64 },

    #[error("geometry is empty after projection")]
    EmptyGeometry,
}

/// Azimuthal-equidistant plane centered on a geographic point (units: meters)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    center: Point<f64>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl LocalProjection {
    /// Build a projection centered at `(center_lon, center_lat)` in degrees
    ///
    /// Fails at the poles, where the azimuth of the center is undefined, and for
    /// non-finite or out-of-range input.
    pub fn new(center_lon: f64, center_lat: f64) -> Result<Self, ProjectionError> {
        let degenerate = !center_lon.is_finite()
            || !center_lat.is_finite()
            || 90.0 - center_lat.abs() < POLE_EPSILON_DEG;
        if degenerate {
            return Err(ProjectionError::DegenerateCenter {
                lon: center_lon,
                lat: center_lat,
            });
        }

        Ok(Self {
            center: Point::new(center_lon, center_lat),
        })
    }

    /// The projection center in degrees
    #[inline]
    pub fn center(&self) -> Point<f64> {
        self.center
    }

    /// Project a single geographic point
    pub fn project_point(&self, point: Point<f64>) -> Result<Point<f64>, ProjectionError> {
        self.project_coord(point.0).map(Point::from)
    }

    /// Project a polygonal geometry vertex by vertex
    ///
    /// Fails when a vertex cannot be projected, when the geometry reaches the antipode of
    /// the center, or when an edge wraps around it (the typical antimeridian/antipode
    /// artifact). The antipode maps onto the whole rim of the plane, so a geometry around it
    /// turns into a ring enclosing the origin.
    pub fn project(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, ProjectionError> {
        if let Some(antipode) = self.antipode_within(geometry) {
            return Err(ProjectionError::CoversAntipode {
                lon: antipode.x(),
                lat: antipode.y(),
            });
        }

        let projected = geometry.try_map_coords(|coord| self.project_coord(coord))?;

        let longest_edge = projected
            .lines_iter()
            .map(|line| line.dx().hypot(line.dy()))
            .fold(0.0_f64, f64::max);
        if longest_edge > MAX_PROJECTED_EDGE_M {
            return Err(ProjectionError::AntipodalTear {
                length_m: longest_edge,
            });
        }

        Ok(projected)
    }

    /// Project a geometry and repair it again, since validity does not survive reprojection
    pub fn project_repaired(
        &self,
        geometry: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, ProjectionError> {
        let repaired = repair(self.project(geometry)?);
        if repaired.0.is_empty() {
            return Err(ProjectionError::EmptyGeometry);
        }
        Ok(repaired)
    }

    /// The antipode of the center, in whichever longitude domain `geometry` reaches it
    fn antipode_within(&self, geometry: &MultiPolygon<f64>) -> Option<Point<f64>> {
        let lat = -self.center.y();
        let lon = utils::normalize_longitude(self.center.x() + 180.0);
        [lon, lon - 360.0]
            .into_iter()
            .map(|lon| Point::new(lon, lat))
            .find(|antipode| {
                let margin = utils::degree_box(
                    antipode.x(),
                    antipode.y(),
                    ANTIPODE_MARGIN_DEG,
                    ANTIPODE_MARGIN_DEG,
                );
                geometry.intersects(&margin)
            })
    }

    fn project_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        let target = Point::from(coord);
        let distance = Geodesic.distance(self.center, target);
        if !distance.is_finite() {
            return Err(ProjectionError::NonFinite {
                lon: coord.x,
                lat: coord.y,
            });
        }
        if distance == 0.0 {
            return Ok(Coord { x: 0.0, y: 0.0 });
        }

        // Azimuth is clockwise from north: x grows eastwards, y northwards
        let azimuth = Geodesic.bearing(self.center, target).to_radians();
        let projected = Coord {
            x: distance * azimuth.sin(),
            y: distance * azimuth.cos(),
        };
        if !projected.x.is_finite() || !projected.y.is_finite() {
            return Err(ProjectionError::NonFinite {
                lon: coord.x,
                lat: coord.y,
            });
        }

        Ok(projected)
    }
}
