//! Configuration management for dotmap.
//!
//! This module handles the layered configuration system with the following
//! precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DotmapError, Result};
use crate::projection::Extent;
use crate::style::ColorRuleConfig;

/// Command-line arguments for dotmap
#[derive(Parser, Debug)]
#[command(name = "dotmap")]
#[command(author, version, about = "Draw points & boxes on a map", long_about = None)]
pub struct Args {
    /// Path to JSON configuration file
    #[arg(short = 'c', long, env = "DOTMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a delimited record file (tab-separated by default)
    #[arg(long, env = "DOTMAP_CSV")]
    pub csv: Option<PathBuf>,

    /// Postgres connection string
    #[arg(long, env = "DOTMAP_CONNECTION")]
    pub connection: Option<String>,

    /// Query supplying the records
    #[arg(long)]
    pub query: Option<String>,

    /// Treat records as boxes (north/south/east/west) instead of points
    #[arg(long)]
    pub bbox: bool,

    /// Canvas width in pixels
    #[arg(short = 'W', long)]
    pub width: Option<u32>,

    /// Canvas height in pixels
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Geographic extent as "west,south,east,north"
    #[arg(long)]
    pub extent: Option<String>,

    /// Background color
    #[arg(long)]
    pub background: Option<String>,

    /// Stroke color for box records
    #[arg(long)]
    pub stroke: Option<String>,

    /// Fill color for point records
    #[arg(long)]
    pub fill: Option<String>,

    /// Global alpha applied to data colors (0 to 1)
    #[arg(long)]
    pub alpha: Option<f64>,

    /// GeoJSON file drawn as a reference outline behind the data
    #[arg(long)]
    pub world_file: Option<PathBuf>,

    /// Color for the outline; omitting it skips the outline pass
    #[arg(long = "world")]
    pub world_color: Option<String>,

    /// Color for the extent gridlines; omitting it skips them
    #[arg(long)]
    pub extent_color: Option<String>,

    /// Calibrate the projection to the outline features instead of the extent
    #[arg(long)]
    pub fit_to_features: bool,

    /// Output PNG path
    #[arg(short = 'o', long, env = "DOTMAP_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DOTMAP_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Postgres connection string
    pub connection: Option<String>,

    /// Query supplying the records
    pub query: Option<String>,

    /// Path to a delimited record file
    pub csv_file: Option<PathBuf>,

    /// Field delimiter for the record file
    pub delimiter: char,

    /// Box mode: records carry north/south/east/west instead of lat/lng
    pub bbox: bool,

    /// Canvas width in pixels
    pub width: u32,

    /// Canvas height in pixels
    pub height: u32,

    /// Geographic extent constraining data and the initial projection scale
    pub extent: Extent,

    /// Canvas background color
    pub background: String,

    /// Stroke color for box records
    pub stroke: String,

    /// Fill color for point records
    pub fill: String,

    /// Global alpha applied to data colors
    pub alpha: f64,

    /// GeoJSON outline file
    pub world_file: Option<PathBuf>,

    /// Outline color (None = don't draw the outline)
    pub world_color: Option<String>,

    /// Extent gridline color (None = don't draw them)
    pub extent_color: Option<String>,

    /// Calibrate to the outline features' bounding box instead of the extent
    pub fit_to_features: bool,

    /// Output PNG path
    pub image_name: PathBuf,

    /// Optional per-record color rule
    pub color_rule: Option<ColorRuleConfig>,

    /// Log level
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<Self> {
        let args = Args::parse();
        Self::from_args(args)
    }

    /// Build a config from already-parsed arguments (separated for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &args.config {
            let file_config = Self::load_from_file(config_path)?;
            config = file_config;
        }

        // Override with command-line arguments
        if args.csv.is_some() {
            config.csv_file = args.csv;
        }
        if args.connection.is_some() {
            config.connection = args.connection;
        }
        if args.query.is_some() {
            config.query = args.query;
        }
        if args.bbox {
            config.bbox = true;
        }
        if let Some(width) = args.width {
            config.width = width;
        }
        if let Some(height) = args.height {
            config.height = height;
        }
        if let Some(extent) = &args.extent {
            config.extent = Extent::parse(extent)?;
        }
        if let Some(background) = args.background {
            config.background = background;
        }
        if let Some(stroke) = args.stroke {
            config.stroke = stroke;
        }
        if let Some(fill) = args.fill {
            config.fill = fill;
        }
        if let Some(alpha) = args.alpha {
            config.alpha = alpha;
        }
        if args.world_file.is_some() {
            config.world_file = args.world_file;
        }
        if args.world_color.is_some() {
            config.world_color = args.world_color;
        }
        if args.extent_color.is_some() {
            config.extent_color = args.extent_color;
        }
        if args.fit_to_features {
            config.fit_to_features = true;
        }
        if let Some(output) = args.output {
            config.image_name = output;
        }
        if let Some(log_level) = args.log_level {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a JSON file
    fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.extent.validate()?;

        if self.width == 0 || self.height == 0 {
            return Err(DotmapError::Config {
                message: "Canvas width and height must be positive".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(DotmapError::Config {
                message: format!("Global alpha must be in the range 0 to 1, got {}", self.alpha),
            });
        }

        if !self.delimiter.is_ascii() {
            return Err(DotmapError::Config {
                message: format!("Delimiter must be an ASCII character, got '{}'", self.delimiter),
            });
        }

        if self.fit_to_features && self.world_file.is_none() {
            return Err(DotmapError::Config {
                message: "fit_to_features requires a world_file".to_string(),
            });
        }

        if self.connection.is_some() != self.query.is_some() {
            return Err(DotmapError::Config {
                message: "A database source needs both a connection string and a query".to_string(),
            });
        }

        // Validate log level
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(DotmapError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        Ok(())
    }

    /// True when neither a file nor a database source is configured. The run
    /// still proceeds and writes a background-only image.
    pub fn has_source(&self) -> bool {
        self.csv_file.is_some() || (self.connection.is_some() && self.query.is_some())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: None,
            query: None,
            csv_file: None,
            delimiter: default_delimiter(),
            bbox: false,
            width: default_dimension(),
            height: default_dimension(),
            extent: Extent::world(),
            background: default_background(),
            stroke: default_data_color(),
            fill: default_data_color(),
            alpha: 1.0,
            world_file: None,
            world_color: None,
            extent_color: None,
            fit_to_features: false,
            image_name: default_image_name(),
            color_rule: None,
            log_level: default_log_level(),
        }
    }
}

// Default value functions for serde
fn default_delimiter() -> char {
    '\t'
}

fn default_dimension() -> u32 {
    2000
}

fn default_background() -> String {
    "rgba(255,255,255,1)".to_string()
}

fn default_data_color() -> String {
    "rgba(0,0,0,0.1)".to_string()
}

fn default_image_name() -> PathBuf {
    PathBuf::from("map.png")
}

fn default_log_level() -> String {
    "info".to_string()
}
