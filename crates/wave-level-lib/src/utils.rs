//! Utility functions for coordinate conversions and numeric helpers

use geo::{Coord, Rect};

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;

/// Fixed kilometers-per-degree approximation used for coarse radius prefilters
pub const KM_PER_DEGREE: f64 = 111.0;

/// Oversizing factor applied to radius prefilter boxes
pub const PREFILTER_SAFETY_FACTOR: f64 = 1.5;

/// Precomputed constant: 180.0 / EARTH_MERCATOR_MAX
const X_TO_LON_FACTOR: f64 = 180.0 / EARTH_MERCATOR_MAX;

/// Precomputed constant: PI / EARTH_MERCATOR_MAX
const Y_TO_LAT_FACTOR: f64 = std::f64::consts::PI / EARTH_MERCATOR_MAX;

/// Map any finite longitude into the [0, 360) domain.
///
/// Accepts both the -180..180 and the 0..360 conventions. Idempotent: a value that is
/// already in [0, 360) is returned unchanged.
#[inline]
pub fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = lon.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped + 0.0 }
}

/// Convert Web Mercator (x, y) in meters to WGS84 (lat, lon)
///
/// # Arguments
/// * `x` - Easting in meters
/// * `y` - Northing in meters
///
/// # Returns
/// A tuple of (latitude, longitude) in degrees
#[inline(always)]
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x * X_TO_LON_FACTOR;
    let lat =
        (std::f64::consts::PI / 2.0 - 2.0 * ((-y * Y_TO_LAT_FACTOR).exp()).atan()).to_degrees();
    (lat, lon)
}

/// Round `value` to `decimal_places` digits after the decimal point.
#[inline]
pub fn round_to(value: f64, decimal_places: u32) -> f64 {
    let factor = 10f64.powi(decimal_places.min(15) as i32);
    (value * factor).round() / factor
}

/// Square box in degrees around `(lon, lat)` that covers `radius_km`, oversized by
/// [`PREFILTER_SAFETY_FACTOR`] and using [`KM_PER_DEGREE`] on both axes.
pub fn radius_prefilter_box(lon: f64, lat: f64, radius_km: f64) -> Rect<f64> {
    let buffer_deg = (radius_km * PREFILTER_SAFETY_FACTOR) / KM_PER_DEGREE;
    degree_box(lon, lat, buffer_deg, buffer_deg)
}

/// Box around `(lon, lat)` extended by the given half-widths in degrees.
#[inline]
pub fn degree_box(lon: f64, lat: f64, half_width_lon: f64, half_width_lat: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: lon - half_width_lon,
            y: lat - half_width_lat,
        },
        Coord {
            x: lon + half_width_lon,
            y: lat + half_width_lat,
        },
    )
}
