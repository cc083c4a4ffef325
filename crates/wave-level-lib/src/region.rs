//! Region storage module
//!
//! This module provides the `Region` struct: one severity area with its level, the
//! auxiliary feature properties, and a precomputed bounding box.

use crate::repair::repair;
use crate::{DataError, Result};
use geo::{BoundingRect, CoordsIter, MultiPolygon, Rect};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Integer severity classification (higher = more severe)
pub type Level = i64;

/// Auxiliary feature properties, ordered by key
pub type Properties = BTreeMap<String, PropertyValue>;

/// A scalar property value carried through from the source verbatim
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&serde_json::Value> for PropertyValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Int(i),
                // u64 beyond i64::MAX and all fractional numbers
                None => PropertyValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PropertyValue::Text(s.clone()),
            // Nested values are kept as their compact JSON text
            Value::Array(_) | Value::Object(_) => PropertyValue::Text(value.to_string()),
        }
    }
}

/// A single severity region
///
/// Immutable once built: the store hands out shared references only.
#[derive(Clone, Debug)]
pub struct Region {
    /// Polygonal area (single polygons are stored as one-element multipolygons)
    geometry: MultiPolygon<f64>,
    /// Severity level
    level: Level,
    /// All source properties, including `level`
    properties: Properties,
    /// Precomputed bounding box in degrees
    bounding_box: Rect<f64>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Region {
    /// Create a new region
    ///
    /// # Returns
    /// The region, or [`DataError::EmptyGeometry`] if the geometry has no coordinates
    pub fn new(
        geometry: impl Into<MultiPolygon<f64>>,
        level: Level,
        properties: Properties,
    ) -> Result<Self> {
        let geometry = geometry.into();
        let bounding_box = geometry
            .bounding_rect()
            .ok_or(DataError::EmptyGeometry { index: 0 })?;

        Ok(Region {
            geometry,
            level,
            properties,
            bounding_box,
        })
    }

    /// Repair the geometry in place, keeping level and properties
    pub(crate) fn repaired(self) -> Self {
        let Region {
            geometry,
            level,
            properties,
            bounding_box,
        } = self;

        let geometry = repair(geometry);
        let bounding_box = geometry.bounding_rect().unwrap_or(bounding_box);
        Region {
            geometry,
            level,
            properties,
            bounding_box,
        }
    }

    #[inline]
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    #[inline]
    pub fn level(&self) -> Level {
        self.level
    }

    #[inline]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Get the bounding box in degrees
    #[inline]
    pub fn bounding_box(&self) -> Rect<f64> {
        self.bounding_box
    }

    /// Total number of vertices over all rings
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.geometry.coords_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use serde_json::json;

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> geo::Polygon<f64> {
        polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
            (x: min_x, y: min_y),
        ]
    }

    #[test]
    fn test_region_creation() {
        let region = Region::new(square(10.0, -5.0, 20.0, 5.0), 5, Properties::new()).unwrap();

        assert_eq!(region.level(), 5);
        assert_eq!(region.geometry().0.len(), 1);
        assert_eq!(region.vertex_count(), 5);
    }

    #[test]
    fn test_bounding_box() {
        let region = Region::new(square(10.0, -5.0, 20.0, 5.0), 5, Properties::new()).unwrap();

        let bbox = region.bounding_box();
        assert_eq!(bbox.min().x, 10.0);
        assert_eq!(bbox.max().y, 5.0);
        assert_eq!(bbox.width(), 10.0);
    }

    #[test]
    fn test_empty_geometry_fails() {
        let result = Region::new(MultiPolygon::<f64>::new(vec![]), 1, Properties::new());
        assert!(matches!(result, Err(DataError::EmptyGeometry { .. })));
    }

    #[test]
    fn test_repaired_keeps_level_and_properties() {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), PropertyValue::Text("calm".to_string()));

        // Self-intersecting ring
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ];
        let region = Region::new(bowtie, 2, properties.clone()).unwrap().repaired();

        use geo::Validation;
        assert!(region.geometry().is_valid());
        assert_eq!(region.level(), 2);
        assert_eq!(region.properties(), &properties);
        assert_eq!(region.bounding_box().max().x, 2.0);
    }

    #[test]
    fn test_property_value_coercion() {
        assert_eq!(PropertyValue::from(&json!(null)), PropertyValue::Null);
        assert_eq!(PropertyValue::from(&json!(true)), PropertyValue::Bool(true));
        assert_eq!(PropertyValue::from(&json!(7)), PropertyValue::Int(7));
        assert_eq!(PropertyValue::from(&json!(2.5)), PropertyValue::Float(2.5));
        assert_eq!(
            PropertyValue::from(&json!("rough")),
            PropertyValue::Text("rough".to_string())
        );
        assert_eq!(
            PropertyValue::from(&json!([1, 2])),
            PropertyValue::Text("[1,2]".to_string())
        );
    }
}
