//! Error types for the dotmap application.
//!
//! This module defines a comprehensive error enum that covers all possible
//! error conditions in the application.

use thiserror::Error;

/// The main error type for dotmap operations.
#[derive(Error, Debug)]
pub enum DotmapError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-file reader errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// GeoJSON parsing errors
    #[error("GeoJSON error: {message}")]
    GeoJson { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// Degenerate extent errors (zero-width or zero-height projection target)
    #[error("Degenerate extent: {message}")]
    DegenerateExtent { message: String },

    /// Image encoding errors
    #[error("Image encoding error: {message}")]
    ImageEncoding { message: String },
}

/// Convenience type alias for Results with DotmapError
pub type Result<T> = std::result::Result<T, DotmapError>;
