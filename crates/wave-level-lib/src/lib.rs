//! Wave Level Library - Severity Region Queries
//!
//! This library classifies a geographic point against a set of labeled severity regions
//! (one integer "level" per region, e.g. wave-height categories) and measures, per distinct
//! level, the geodesic distance from the point to that level's combined area.
//!
//! # Architecture
//!
//! - **[`repair`]**: Normalizes self-intersecting or degenerate polygons into valid ones
//! - **[`RegionStore`]**: Immutable region set with a [`Quadtree`] bounding-box index, loaded
//!   from GeoJSON or (with the `geoparquet` feature) GeoParquet
//! - **[`LocalProjection`]**: Azimuthal-equidistant plane centered on the query point
//! - **[`classify()`]**: Point-in-region test with boundary tolerance and highest-level tie-break
//! - **[`resolve()`]**: Per-level nearest distance with optional radius cutoff
//! - **[`QueryCache`]**: Memoizes loaded stores by source path
//!
//! # Example
//!
//! ```no_run
//! use wave_level_lib::{QueryCache, QueryOptions};
//!
//! # fn main() -> wave_level_lib::Result<()> {
//! let cache = QueryCache::new();
//! let result = cache.query("wind_level_18z.geojson", -160.526, -4.0147, &QueryOptions::default())?;
//! println!("level here: {:?}", result.current_level.level);
//! for entry in &result.level_distances {
//!     println!("level {} is {} km away", entry.level, entry.distance_km);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod classify;
mod distance;
#[cfg(feature = "geoparquet")]
mod parquet;
mod projection;
mod quadtree;
mod query;
mod region;
pub mod repair;
mod store;
pub mod utils;

// Public API exports
pub use cache::QueryCache;
pub use classify::{Classification, DEFAULT_DISTANCE_THRESHOLD_M, MatchedRegion, classify};
pub use distance::{DistanceOptions, DistanceReport, LevelDistance, LevelOutcome, resolve};
pub use projection::{LocalProjection, ProjectionError};
pub use quadtree::Quadtree;
pub use query::{DEFAULT_DECIMAL_PLACES, QueryOptions, QueryPoint, QueryResult, query};
pub use region::{Level, Properties, PropertyValue, Region};
pub use store::{RegionStore, StoreInfo};

/// Error types for loading regions and validating queries
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON parsing error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feature {index} has no `level` property")]
    MissingLevel { index: usize },

    #[error("Feature {index} has a non-integer `level` value: {value}")]
    InvalidLevel { index: usize, value: String },

    #[error("Feature {index} has unsupported geometry type {kind}")]
    UnsupportedGeometry { index: usize, kind: String },

    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    #[error("Feature {index} has an empty geometry")]
    EmptyGeometry { index: usize },

    #[error("Source contains no features")]
    EmptySource,

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("GeoParquet error: {0}")]
    Parquet(String),
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that all public types are accessible
        let _: fn() -> QueryCache = QueryCache::new;
        let _: fn() -> QueryOptions = QueryOptions::default;
        let _: fn(f64, f64) -> Result<QueryPoint> = QueryPoint::new;
    }

    #[test]
    fn test_error_messages_name_the_feature() {
        let err = DataError::MissingLevel { index: 3 };
        assert_eq!(err.to_string(), "Feature 3 has no `level` property");

        let err = DataError::InvalidLevel {
            index: 0,
            value: "\"high\"".to_string(),
        };
        assert!(err.to_string().contains("\"high\""));
    }
}
