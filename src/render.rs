//! The rendering pass.
//!
//! The canvas is painted in a fixed order: background, extent gridlines,
//! world outline, then the data pass. Drawing is sequential and the canvas is
//! owned exclusively by the renderer, so a fixed input stream always produces
//! a byte-identical image.

use std::path::Path;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, Blend, Canvas};
use imageproc::rect::Rect;
use tracing::{debug, info};

use crate::error::{DotmapError, Result};
use crate::outline::Outline;
use crate::projection::{Extent, Projection};
use crate::source::{RecordSource, Shape};
use crate::style::Style;

/// Counters from the data pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Records received from the source
    pub processed: u64,
    /// Records actually painted
    pub drawn: u64,
    /// Box records dropped by the extent containment test
    pub dropped: u64,
}

pub struct Renderer {
    canvas: Blend<RgbaImage>,
    projection: Projection,
    extent: Extent,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Create the canvas and paint the background.
    pub fn new(
        projection: Projection,
        extent: Extent,
        width: u32,
        height: u32,
        background: Rgba<u8>,
    ) -> Self {
        let canvas = Blend(RgbaImage::from_pixel(width, height, background));
        Self {
            canvas,
            projection,
            extent,
            width,
            height,
        }
    }

    /// Stroke the four extent boundary lines across the full canvas.
    pub fn draw_extent_lines(&mut self, color: Rgba<u8>) {
        let (left, bottom) = self.projection.project(self.extent.west, self.extent.south);
        let (right, top) = self.projection.project(self.extent.east, self.extent.north);
        let (w, h) = (self.width as f32, self.height as f32);

        for x in [left as f32, right as f32] {
            draw_line_segment_mut(&mut self.canvas, (x, 0.0), (x, h), color);
        }
        for y in [top as f32, bottom as f32] {
            draw_line_segment_mut(&mut self.canvas, (0.0, y), (w, y), color);
        }
    }

    /// Stroke the outline polylines.
    pub fn draw_outline(&mut self, outline: &Outline, color: Rgba<u8>) {
        let mut segments = 0u64;
        for polyline in &outline.polylines {
            let mut previous: Option<(f64, f64)> = None;
            for &(lon, lat) in polyline {
                let (x, y) = self.projection.project(lon, lat);
                if !x.is_finite() || !y.is_finite() {
                    previous = None;
                    continue;
                }
                if let Some((px, py)) = previous {
                    draw_line_segment_mut(
                        &mut self.canvas,
                        (px as f32, py as f32),
                        (x as f32, y as f32),
                        color,
                    );
                    segments += 1;
                }
                previous = Some((x, y));
            }
        }
        debug!(segments, "Stroked outline");
    }

    /// Consume the record source and paint every record as it arrives.
    pub fn draw_records(&mut self, source: &mut dyn RecordSource, style: &Style) -> Result<DrawStats> {
        let mut stats = DrawStats::default();

        while let Some(record) = source.next_record()? {
            stats.processed += 1;
            match record.shape {
                Shape::Point { lat, lng } => {
                    let color = style.point_rule.color_for(record.tag.as_deref());
                    if self.draw_point(lng, lat, color) {
                        stats.drawn += 1;
                    }
                }
                Shape::Box {
                    north,
                    south,
                    east,
                    west,
                } => {
                    let color = style.box_rule.color_for(record.tag.as_deref());
                    if self.draw_box(west, south, east, north, color) {
                        stats.drawn += 1;
                    } else {
                        stats.dropped += 1;
                    }
                }
            }
        }

        info!(
            processed = stats.processed,
            drawn = stats.drawn,
            dropped = stats.dropped,
            "Data pass complete"
        );
        Ok(stats)
    }

    /// Paint a blended 1x1 pixel. Off-canvas or non-projectable locations are
    /// silently ignored.
    fn draw_point(&mut self, lng: f64, lat: f64, color: Rgba<u8>) -> bool {
        let (x, y) = self.projection.project(lng, lat);
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let (xi, yi) = (x.floor(), y.floor());
        if xi < 0.0 || yi < 0.0 || xi >= self.width as f64 || yi >= self.height as f64 {
            return false;
        }
        self.canvas.draw_pixel(xi as u32, yi as u32, color);
        true
    }

    /// Stroke a hollow rectangle for a box record. Containment against the
    /// extent is strict: a box partially overlapping is dropped entirely.
    fn draw_box(&mut self, west: f64, south: f64, east: f64, north: f64, color: Rgba<u8>) -> bool {
        if !self.extent.contains_box(west, south, east, north) {
            return false;
        }

        let (left, bottom) = self.projection.project(west, south);
        let (right, top) = self.projection.project(east, north);
        let box_width = (right - left).abs().round().max(1.0) as u32;
        let box_height = (bottom - top).abs().round().max(1.0) as u32;

        let rect = Rect::at(left.round() as i32, top.round() as i32)
            .of_size(box_width, box_height);
        draw_hollow_rect_mut(&mut self.canvas, rect, color);
        true
    }

    /// Hand back the finished image for the sink.
    pub fn into_image(self) -> RgbaImage {
        self.canvas.0
    }
}

/// Serialize the canvas to a PNG file. Any error here is fatal to the run.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| DotmapError::ImageEncoding {
            message: format!("Failed to write {}: {}", path.display(), e),
        })?;
    info!(file = %path.display(), "Image written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::source::Record;
    use crate::style::parse_color;

    /// In-memory source for tests.
    struct VecSource(std::vec::IntoIter<Record>);

    impl VecSource {
        fn new(shapes: Vec<Shape>) -> Self {
            Self(
                shapes
                    .into_iter()
                    .map(|shape| Record { shape, tag: None })
                    .collect::<Vec<_>>()
                    .into_iter(),
            )
        }
    }

    impl RecordSource for VecSource {
        fn next_record(&mut self) -> Result<Option<Record>> {
            Ok(self.0.next())
        }
    }

    fn world_renderer(width: u32, height: u32) -> Renderer {
        let extent = Extent::world();
        let projection = Projection::fit_extent(&extent, width, height, 0.9).unwrap();
        Renderer::new(
            projection,
            extent,
            width,
            height,
            parse_color("rgba(255,255,255,1)").unwrap(),
        )
    }

    fn opaque_style() -> Style {
        let mut config = Config::default();
        config.fill = "rgba(255,0,0,1)".to_string();
        config.stroke = "rgba(0,0,255,1)".to_string();
        Style::from_config(&config).unwrap()
    }

    #[test]
    fn test_origin_point_lands_at_canvas_center() {
        let mut renderer = world_renderer(4000, 3000);
        let style = opaque_style();
        let mut source = VecSource::new(vec![Shape::Point { lat: 0.0, lng: 0.0 }]);

        let stats = renderer.draw_records(&mut source, &style).unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.drawn, 1);

        let image = renderer.into_image();
        assert_eq!(image.get_pixel(2000, 1500), &Rgba([255, 0, 0, 255]));
        // A neighbor off the dot is still background
        assert_eq!(image.get_pixel(2010, 1500), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_box_outside_extent_is_never_drawn() {
        let mut renderer = world_renderer(400, 300);
        let style = opaque_style();
        let mut source = VecSource::new(vec![Shape::Box {
            west: -200.0,
            east: 10.0,
            south: 0.0,
            north: 10.0,
        }]);

        let stats = renderer.draw_records(&mut source, &style).unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.drawn, 0);
        assert_eq!(stats.dropped, 1);

        // Canvas is untouched background
        let image = renderer.into_image();
        assert!(image.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn test_contained_box_is_stroked_hollow() {
        let mut renderer = world_renderer(400, 300);
        let style = opaque_style();
        let mut source = VecSource::new(vec![Shape::Box {
            west: -90.0,
            east: 90.0,
            south: -45.0,
            north: 45.0,
        }]);

        let stats = renderer.draw_records(&mut source, &style).unwrap();
        assert_eq!(stats.drawn, 1);

        let image = renderer.into_image();
        let stroked: Vec<_> = image
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == Rgba([0, 0, 255, 255]))
            .collect();
        assert!(!stroked.is_empty());
        // Hollow: the canvas center stays background
        assert_eq!(image.get_pixel(200, 150), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let shapes = vec![
            Shape::Point { lat: 10.0, lng: 20.0 },
            Shape::Point { lat: -30.0, lng: 40.0 },
            Shape::Box {
                west: 0.0,
                east: 50.0,
                south: 0.0,
                north: 30.0,
            },
        ];
        let style = opaque_style();

        let render = |shapes: Vec<Shape>| {
            let mut renderer = world_renderer(300, 200);
            renderer.draw_extent_lines(parse_color("#333").unwrap());
            let mut source = VecSource::new(shapes);
            renderer.draw_records(&mut source, &style).unwrap();
            renderer.into_image()
        };

        let first = render(shapes.clone());
        let second = render(shapes);
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_translucent_points_accumulate() {
        let mut config = Config::default();
        config.fill = "rgba(0,0,0,0.5)".to_string();
        let style = Style::from_config(&config).unwrap();

        let mut renderer = world_renderer(4000, 3000);
        let mut source = VecSource::new(vec![
            Shape::Point { lat: 0.0, lng: 0.0 },
            Shape::Point { lat: 0.0, lng: 0.0 },
        ]);
        renderer.draw_records(&mut source, &style).unwrap();

        // Two 50%-alpha black dots on white composite darker than one
        let image = renderer.into_image();
        let pixel = image.get_pixel(2000, 1500);
        assert!(pixel.0[0] < 128, "pixel was {:?}", pixel);
    }

    #[test]
    fn test_extent_lines_span_canvas() {
        let extent = Extent::world();
        let projection = Projection::fit_extent(&extent, 400, 300, 0.9).unwrap();
        let mut renderer = Renderer::new(
            projection,
            extent,
            400,
            300,
            parse_color("rgba(255,255,255,1)").unwrap(),
        );
        renderer.draw_extent_lines(parse_color("rgba(0,0,0,1)").unwrap());
        let image = renderer.into_image();

        // The west boundary line runs the full canvas height
        let (west_x, _) = projection.project(extent.west, extent.south);
        let x = west_x as u32;
        assert_eq!(image.get_pixel(x, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(image.get_pixel(x, 299), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_save_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");

        let renderer = world_renderer(64, 48);
        save_png(&renderer.into_image(), &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded.dimensions(), (64, 48));
        assert_eq!(reloaded.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }
}
