//! # dotmap
//!
//! Draw points and boxes on a map.
//!
//! This library reads point or bounding-box records from a delimited file or
//! a Postgres query and rasterizes them onto a Mercator-projected PNG.
//!
//! ## Architecture
//!
//! - **Projection**: a spherical Mercator forward map, calibrated once per
//!   run so the configured extent (or the outline features' bounding box)
//!   fits the canvas with a margin
//! - **Sources**: pull-based record streams, consumed incrementally in
//!   arrival order
//! - **Renderer**: paints background, reference overlays and records onto a
//!   single alpha-blending canvas, then hands it to the PNG sink

pub mod config;
pub mod error;
pub mod logging;
pub mod outline;
pub mod projection;
pub mod render;
pub mod source;
pub mod style;

pub use config::Config;
pub use error::{DotmapError, Result};
pub use logging::{init_tracing, log_operation_end, log_operation_start};
pub use outline::Outline;
pub use projection::{Extent, Projection, DEFAULT_MARGIN};
pub use render::{save_png, DrawStats, Renderer};
pub use source::{open_source, Record, RecordSource, Shape};
pub use style::Style;
