//! Spherical Mercator projection and scale/translate calibration.
//!
//! The projection is calibrated exactly once per run: both corners of the
//! target geography are projected at unit scale, and a single scalar scale
//! plus a pixel translation are derived so the projected box fits the canvas
//! with a margin, centered. A single scalar scale is a design invariant -
//! independent x/y scales would distort geography.

use std::f64::consts::FRAC_PI_4;

use serde::{Deserialize, Serialize};

use crate::error::{DotmapError, Result};

/// Fraction of the canvas the fitted geography occupies (leaving a 10% margin).
pub const DEFAULT_MARGIN: f64 = 0.9;

/// A geographic bounding rectangle, stored as `[[west, south], [east, north]]`
/// in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 2]; 2]", into = "[[f64; 2]; 2]")]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl From<[[f64; 2]; 2]> for Extent {
    fn from(corners: [[f64; 2]; 2]) -> Self {
        Self {
            west: corners[0][0],
            south: corners[0][1],
            east: corners[1][0],
            north: corners[1][1],
        }
    }
}

impl From<Extent> for [[f64; 2]; 2] {
    fn from(extent: Extent) -> Self {
        [[extent.west, extent.south], [extent.east, extent.north]]
    }
}

impl Extent {
    /// The default world extent, clipped to Mercator-friendly latitudes.
    pub fn world() -> Self {
        Self {
            west: -180.0,
            south: -85.0,
            east: 180.0,
            north: 85.0,
        }
    }

    /// Parse an extent from a "west,south,east,north" string.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(DotmapError::InvalidParameter {
                param: "extent".to_string(),
                message: "Extent must be in format 'west,south,east,north'".to_string(),
            });
        }

        let mut values = [0.0f64; 4];
        for (i, part) in parts.iter().enumerate() {
            values[i] = part
                .trim()
                .parse::<f64>()
                .map_err(|_| DotmapError::InvalidParameter {
                    param: "extent".to_string(),
                    message: format!("Invalid extent component: {}", part),
                })?;
        }

        Ok(Self {
            west: values[0],
            south: values[1],
            east: values[2],
            north: values[3],
        })
    }

    /// Check the ordering invariants: west < east and south < north.
    pub fn validate(&self) -> Result<()> {
        if !self.west.is_finite()
            || !self.south.is_finite()
            || !self.east.is_finite()
            || !self.north.is_finite()
        {
            return Err(DotmapError::InvalidParameter {
                param: "extent".to_string(),
                message: "Extent corners must be finite numbers".to_string(),
            });
        }
        if self.west >= self.east {
            return Err(DotmapError::InvalidParameter {
                param: "extent".to_string(),
                message: format!("west ({}) must be < east ({})", self.west, self.east),
            });
        }
        if self.south >= self.north {
            return Err(DotmapError::InvalidParameter {
                param: "extent".to_string(),
                message: format!("south ({}) must be < north ({})", self.south, self.north),
            });
        }
        Ok(())
    }

    /// Strict containment test for a box record. A box touching the boundary
    /// still counts as contained; any side outside rejects the whole box.
    pub fn contains_box(&self, west: f64, south: f64, east: f64, north: f64) -> bool {
        west >= self.west && south >= self.south && east <= self.east && north <= self.north
    }
}

/// Unit-scale spherical Mercator forward projection, y flipped to screen
/// orientation (north up means decreasing y).
pub fn mercator_raw(lon: f64, lat: f64) -> (f64, f64) {
    let lambda = lon.to_radians();
    let phi = lat.to_radians();
    (lambda, -(FRAC_PI_4 + phi / 2.0).tan().ln())
}

/// Calibrated projection state: a single scalar scale and a pixel translation.
/// Immutable after calibration; shared by every subsequent projection call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    scale: f64,
    translate: (f64, f64),
}

impl Projection {
    /// Calibrate so the projected extent fits a width x height canvas,
    /// centered, occupying `margin` of the limiting dimension.
    pub fn fit_extent(extent: &Extent, width: u32, height: u32, margin: f64) -> Result<Self> {
        extent.validate()?;
        let sw = mercator_raw(extent.west, extent.south);
        let ne = mercator_raw(extent.east, extent.north);
        Self::fit_bounds(sw, ne, width, height, margin)
    }

    /// Calibrate from the planar bounding box of an arbitrary coordinate set,
    /// e.g. every vertex of an outline feature file.
    pub fn fit_points<I>(coords: I, width: u32, height: u32, margin: f64) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);

        for (lon, lat) in coords {
            let (x, y) = mercator_raw(lon, lat);
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            min.0 = min.0.min(x);
            min.1 = min.1.min(y);
            max.0 = max.0.max(x);
            max.1 = max.1.max(y);
        }

        if min.0 > max.0 {
            return Err(DotmapError::DegenerateExtent {
                message: "No finite coordinates to fit".to_string(),
            });
        }
        Self::fit_bounds(min, max, width, height, margin)
    }

    fn fit_bounds(
        a: (f64, f64),
        b: (f64, f64),
        width: u32,
        height: u32,
        margin: f64,
    ) -> Result<Self> {
        let dx = (b.0 - a.0).abs();
        let dy = (b.1 - a.1).abs();

        // Guard the division below: a single point or a zero-width/height
        // extent has no defined scale.
        if dx <= 0.0 || dy <= 0.0 || !dx.is_finite() || !dy.is_finite() {
            return Err(DotmapError::DegenerateExtent {
                message: format!("projected bounds are {} x {}", dx, dy),
            });
        }

        let scale = margin / f64::max(dx / width as f64, dy / height as f64);
        let cx = (a.0 + b.0) / 2.0;
        let cy = (a.1 + b.1) / 2.0;
        let translate = (
            width as f64 / 2.0 - scale * cx,
            height as f64 / 2.0 - scale * cy,
        );

        Ok(Self { scale, translate })
    }

    /// Project a (longitude, latitude) pair to pixel coordinates.
    /// Pure and deterministic; reused for every record and outline vertex.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = mercator_raw(lon, lat);
        (
            self.scale * x + self.translate.0,
            self.scale * y + self.translate.1,
        )
    }

    /// The calibrated scalar scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_parse() {
        let extent = Extent::parse("-180,-85,180,85").unwrap();
        assert_eq!(extent, Extent::world());

        assert!(Extent::parse("-180,-85,180").is_err());
        assert!(Extent::parse("-180,-85,180,not_a_number").is_err());
    }

    #[test]
    fn test_extent_validate() {
        assert!(Extent::world().validate().is_ok());

        // west >= east
        let extent = Extent::parse("10,-85,10,85").unwrap();
        assert!(extent.validate().is_err());

        // south >= north
        let extent = Extent::parse("-10,20,10,20").unwrap();
        assert!(extent.validate().is_err());
    }

    #[test]
    fn test_containment_is_strict() {
        let extent = Extent::world();

        assert!(extent.contains_box(-10.0, -10.0, 10.0, 10.0));
        // Boundary-touching boxes are still contained
        assert!(extent.contains_box(-180.0, -85.0, 180.0, 85.0));
        // Partial overlap is rejected entirely
        assert!(!extent.contains_box(-200.0, 0.0, 10.0, 10.0));
        assert!(!extent.contains_box(170.0, 80.0, 185.0, 84.0));
        assert!(!extent.contains_box(0.0, 80.0, 10.0, 90.0));
    }

    #[test]
    fn test_world_fit_centers_origin() {
        let projection = Projection::fit_extent(&Extent::world(), 4000, 3000, 0.9).unwrap();
        let (x, y) = projection.project(0.0, 0.0);

        // The world extent is symmetric about (0, 0), so the origin lands at
        // the canvas center.
        assert!((x - 2000.0).abs() < 1e-6, "x was {}", x);
        assert!((y - 1500.0).abs() < 1e-6, "y was {}", y);
    }

    #[test]
    fn test_fit_keeps_corners_inside_margin() {
        let cases = [
            (Extent::world(), 4000u32, 3000u32),
            (Extent::parse("-20,-35,55,38").unwrap(), 800, 800), // Africa
            (Extent::parse("85,27,86,29").unwrap(), 500, 1000),  // tall extent
        ];

        for (extent, width, height) in cases {
            let projection = Projection::fit_extent(&extent, width, height, 0.9).unwrap();
            for (lon, lat) in [(extent.west, extent.south), (extent.east, extent.north)] {
                let (x, y) = projection.project(lon, lat);
                // 0.9 margin leaves at least 5% of the limiting dimension on
                // each side; the other dimension is at least as roomy.
                assert!(x >= 0.0 && x <= width as f64, "x {} out of canvas", x);
                assert!(y >= 0.0 && y <= height as f64, "y {} out of canvas", y);
            }
        }
    }

    #[test]
    fn test_aspect_ratio_preserved() {
        // A square geographic extent near the equator must project to a
        // square pixel box regardless of canvas shape.
        let extent = Extent::parse("-10,-10,10,10").unwrap();
        let projection = Projection::fit_extent(&extent, 3000, 1000, 0.9).unwrap();

        let sw = projection.project(extent.west, extent.south);
        let ne = projection.project(extent.east, extent.north);
        let dx = (ne.0 - sw.0).abs();
        let dy = (ne.1 - sw.1).abs();

        let raw_sw = mercator_raw(extent.west, extent.south);
        let raw_ne = mercator_raw(extent.east, extent.north);
        let raw_ratio = (raw_ne.0 - raw_sw.0).abs() / (raw_ne.1 - raw_sw.1).abs();

        assert!((dx / dy - raw_ratio).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_extent_is_an_error() {
        let extent = Extent {
            west: 10.0,
            south: 20.0,
            east: 10.0,
            north: 20.0,
        };
        assert!(matches!(
            Projection::fit_extent(&extent, 100, 100, 0.9),
            Err(DotmapError::InvalidParameter { .. })
        ));

        // A single point also has no defined scale.
        assert!(matches!(
            Projection::fit_points([(5.0, 5.0)], 100, 100, 0.9),
            Err(DotmapError::DegenerateExtent { .. })
        ));

        // As does an empty coordinate set.
        assert!(Projection::fit_points(std::iter::empty(), 100, 100, 0.9).is_err());
    }

    #[test]
    fn test_projection_is_deterministic() {
        let projection = Projection::fit_extent(&Extent::world(), 4000, 3000, 0.9).unwrap();
        let first = projection.project(12.5, 41.9);
        let second = projection.project(12.5, 41.9);
        assert_eq!(first, second);
    }
}
