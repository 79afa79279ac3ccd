//! World outline loading.
//!
//! Flattens a GeoJSON file into plain lon/lat polylines, used both for
//! stroking a reference outline behind the data and for fit-to-features
//! calibration.

use std::path::Path;

use geojson::{GeoJson, Value};
use tracing::info;

use crate::error::{DotmapError, Result};

/// Outline geometry flattened to polylines of (lon, lat) vertices.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    pub polylines: Vec<Vec<(f64, f64)>>,
}

impl Outline {
    /// Load and flatten a GeoJSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let outline = Self::from_geojson_str(&raw)?;
        info!(
            file = %path.display(),
            polylines = outline.polylines.len(),
            "Loaded outline features"
        );
        Ok(outline)
    }

    /// Flatten a GeoJSON document held in memory.
    pub fn from_geojson_str(raw: &str) -> Result<Self> {
        let geojson: GeoJson = raw.parse().map_err(|e| DotmapError::GeoJson {
            message: format!("{}", e),
        })?;

        let mut polylines = Vec::new();
        match &geojson {
            GeoJson::FeatureCollection(collection) => {
                for feature in &collection.features {
                    if let Some(geometry) = &feature.geometry {
                        flatten(&geometry.value, &mut polylines);
                    }
                }
            }
            GeoJson::Feature(feature) => {
                if let Some(geometry) = &feature.geometry {
                    flatten(&geometry.value, &mut polylines);
                }
            }
            GeoJson::Geometry(geometry) => flatten(&geometry.value, &mut polylines),
        }

        Ok(Self { polylines })
    }

    /// Every vertex of every polyline, for bounding-box calibration.
    pub fn coordinates(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.polylines.iter().flatten().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.polylines.is_empty()
    }
}

fn flatten(value: &Value, polylines: &mut Vec<Vec<(f64, f64)>>) {
    match value {
        Value::Point(point) => polylines.push(vec![as_pair(point)]),
        Value::MultiPoint(points) | Value::LineString(points) => {
            polylines.push(points.iter().map(|p| as_pair(p)).collect());
        }
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for line in lines {
                polylines.push(line.iter().map(|p| as_pair(p)).collect());
            }
        }
        Value::MultiPolygon(polygons) => {
            for polygon in polygons {
                for ring in polygon {
                    polylines.push(ring.iter().map(|p| as_pair(p)).collect());
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                flatten(&geometry.value, polylines);
            }
        }
    }
}

fn as_pair(position: &[f64]) -> (f64, f64) {
    (position[0], position[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "box"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]
                }
            },
            {
                "type": "Feature",
                "properties": null,
                "geometry": {
                    "type": "MultiLineString",
                    "coordinates": [[[20,20],[30,30]],[[40,40],[50,50]]]
                }
            }
        ]
    }"#;

    #[test]
    fn test_flatten_feature_collection() {
        let outline = Outline::from_geojson_str(COLLECTION).unwrap();
        assert_eq!(outline.polylines.len(), 3);
        assert_eq!(outline.polylines[0].len(), 5);
        assert_eq!(outline.polylines[1], vec![(20.0, 20.0), (30.0, 30.0)]);
        assert_eq!(outline.coordinates().count(), 9);
    }

    #[test]
    fn test_flatten_bare_geometry() {
        let outline =
            Outline::from_geojson_str(r#"{"type":"LineString","coordinates":[[1,2],[3,4]]}"#)
                .unwrap();
        assert_eq!(outline.polylines, vec![vec![(1.0, 2.0), (3.0, 4.0)]]);
    }

    #[test]
    fn test_invalid_geojson() {
        assert!(Outline::from_geojson_str("{not json").is_err());
        let outline = Outline::from_geojson_str(r#"{"type":"FeatureCollection","features":[]}"#)
            .unwrap();
        assert!(outline.is_empty());
    }
}
