//! Record sources.
//!
//! A record source supplies a pull-based stream of point or box records, read
//! incrementally in arrival order. The renderer only sees the `RecordSource`
//! trait and never the concrete backing (delimited file or Postgres query).

pub mod delimited;
pub mod postgres;

use tracing::warn;

use crate::config::Config;
use crate::error::Result;

pub use delimited::DelimitedSource;
pub use postgres::PostgresSource;

/// The geographic payload of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// A single location
    Point { lat: f64, lng: f64 },
    /// A rectangular geographic area
    Box {
        north: f64,
        south: f64,
        east: f64,
        west: f64,
    },
}

/// One record from a source: its shape plus the optional value of the field
/// the color rule reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub shape: Shape,
    pub tag: Option<String>,
}

/// A pull-based record stream. `Ok(None)` signals end-of-stream.
pub trait RecordSource {
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// Open the configured record source, if any.
///
/// The delimited file wins when both a file and a database query are
/// configured. No source at all is permitted and yields `None`; the run then
/// writes a background-only image.
pub fn open_source(
    config: &Config,
    tag_field: Option<&str>,
) -> Result<Option<Box<dyn RecordSource>>> {
    if let Some(path) = &config.csv_file {
        if config.connection.is_some() || config.query.is_some() {
            warn!("Both a delimited file and a database query are configured; using the file");
        }
        let source = DelimitedSource::open(
            path,
            config.delimiter as u8,
            config.bbox,
            tag_field,
        )?;
        return Ok(Some(Box::new(source)));
    }

    if let (Some(connection), Some(query)) = (&config.connection, &config.query) {
        let source = PostgresSource::spawn(
            connection.clone(),
            query.clone(),
            config.bbox,
            tag_field.map(str::to_string),
        )?;
        return Ok(Some(Box::new(source)));
    }

    Ok(None)
}
