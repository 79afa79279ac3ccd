//! Delimited-file record source.
//!
//! Reads a headered, delimiter-separated file (tab by default). Point mode
//! needs `lat` and `lng` columns; box mode needs `north`, `south`, `east` and
//! `west`. Malformed rows are skipped with a warning rather than aborting the
//! run; I/O errors remain fatal.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use tracing::{info, warn};

use crate::error::{DotmapError, Result};
use crate::source::{Record, RecordSource, Shape};

/// Column indices resolved from the header row.
#[derive(Debug, Clone, Copy)]
enum Columns {
    Point { lat: usize, lng: usize },
    Box { north: usize, south: usize, east: usize, west: usize },
}

pub struct DelimitedSource {
    rows: StringRecordsIntoIter<File>,
    columns: Columns,
    tag_column: Option<usize>,
    skipped: u64,
}

impl DelimitedSource {
    pub fn open(
        path: &Path,
        delimiter: u8,
        bbox_mode: bool,
        tag_field: Option<&str>,
    ) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let find = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DotmapError::Config {
                    message: format!(
                        "Column '{}' not found in {} (headers: {})",
                        name,
                        path.display(),
                        headers.iter().collect::<Vec<_>>().join(", ")
                    ),
                })
        };

        let columns = if bbox_mode {
            Columns::Box {
                north: find("north")?,
                south: find("south")?,
                east: find("east")?,
                west: find("west")?,
            }
        } else {
            Columns::Point {
                lat: find("lat")?,
                lng: find("lng")?,
            }
        };

        let tag_column = match tag_field {
            Some(name) => match headers.iter().position(|h| h == name) {
                Some(idx) => Some(idx),
                None => {
                    warn!(
                        field = name,
                        "Color-rule field not present in file headers; using the fallback color"
                    );
                    None
                }
            },
            None => None,
        };

        info!(file = %path.display(), bbox_mode, "Opened delimited record source");

        Ok(Self {
            rows: reader.into_records(),
            columns,
            tag_column,
            skipped: 0,
        })
    }

    /// Rows dropped because of missing or non-numeric fields.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn decode(&self, row: &StringRecord) -> Option<Shape> {
        let number = |idx: usize| -> Option<f64> {
            row.get(idx).and_then(|v| v.trim().parse::<f64>().ok())
        };
        match self.columns {
            Columns::Point { lat, lng } => Some(Shape::Point {
                lat: number(lat)?,
                lng: number(lng)?,
            }),
            Columns::Box {
                north,
                south,
                east,
                west,
            } => Some(Shape::Box {
                north: number(north)?,
                south: number(south)?,
                east: number(east)?,
                west: number(west)?,
            }),
        }
    }
}

impl RecordSource for DelimitedSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            let row = match self.rows.next() {
                Some(Ok(row)) => row,
                Some(Err(e)) if e.is_io_error() => return Err(e.into()),
                Some(Err(e)) => {
                    self.skipped += 1;
                    warn!(error = %e, "Skipping unreadable row");
                    continue;
                }
                None => return Ok(None),
            };

            match self.decode(&row) {
                Some(shape) => {
                    let tag = self
                        .tag_column
                        .and_then(|idx| row.get(idx))
                        .map(str::to_string);
                    return Ok(Some(Record { shape, tag }));
                }
                None => {
                    self.skipped += 1;
                    warn!(row = ?row, "Skipping row with missing or non-numeric fields");
                }
            }
        }
    }
}
