//! Postgres record source.
//!
//! Streams query rows over a bounded channel so the renderer can keep pulling
//! records synchronously while the database read proceeds on a private tokio
//! runtime. Arrival order is preserved and rows are fetched incrementally,
//! never collected up front.

use futures::TryStreamExt;
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, Row};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::Result;
use crate::source::{Record, RecordSource, Shape};

/// Channel depth between the database task and the draw loop.
const CHANNEL_CAPACITY: usize = 256;

pub struct PostgresSource {
    // Kept alive for the duration of the stream; dropping it cancels the task.
    _runtime: tokio::runtime::Runtime,
    receiver: mpsc::Receiver<Result<Record>>,
}

impl PostgresSource {
    /// Connect and start streaming `query` rows. Connection errors surface on
    /// the first `next_record` call.
    pub fn spawn(
        connection: String,
        query: String,
        bbox_mode: bool,
        tag_field: Option<String>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

        runtime.spawn(async move {
            let outcome = stream_rows(&connection, &query, bbox_mode, tag_field, &sender).await;
            if let Err(e) = outcome {
                // The receiver may already be gone; nothing more to do then.
                let _ = sender.send(Err(e)).await;
            }
        });

        info!("Opened Postgres record source");

        Ok(Self {
            _runtime: runtime,
            receiver,
        })
    }
}

impl RecordSource for PostgresSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        match self.receiver.blocking_recv() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

async fn stream_rows(
    connection: &str,
    query: &str,
    bbox_mode: bool,
    tag_field: Option<String>,
    sender: &mpsc::Sender<Result<Record>>,
) -> Result<()> {
    let mut conn = PgConnection::connect(connection).await?;
    let mut rows = sqlx::query(query).fetch(&mut conn);

    while let Some(row) = rows.try_next().await? {
        let record = match decode_row(&row, bbox_mode, tag_field.as_deref()) {
            Some(record) => record,
            None => {
                warn!("Skipping row with missing or non-numeric fields");
                continue;
            }
        };
        if sender.send(Ok(record)).await.is_err() {
            // Renderer stopped pulling; abandon the stream.
            break;
        }
    }

    Ok(())
}

fn decode_row(row: &PgRow, bbox_mode: bool, tag_field: Option<&str>) -> Option<Record> {
    let shape = if bbox_mode {
        Shape::Box {
            north: field_f64(row, "north")?,
            south: field_f64(row, "south")?,
            east: field_f64(row, "east")?,
            west: field_f64(row, "west")?,
        }
    } else {
        Shape::Point {
            lat: field_f64(row, "lat")?,
            lng: field_f64(row, "lng")?,
        }
    };
    let tag = tag_field.and_then(|name| field_string(row, name));
    Some(Record { shape, tag })
}

/// Read a column as f64, coercing from the common numeric types and from
/// text, mirroring the loose typing of delimited input.
fn field_f64(row: &PgRow, name: &str) -> Option<f64> {
    if let Ok(v) = row.try_get::<f64, _>(name) {
        return Some(v);
    }
    if let Ok(v) = row.try_get::<f32, _>(name) {
        return Some(v as f64);
    }
    if let Ok(v) = row.try_get::<i64, _>(name) {
        return Some(v as f64);
    }
    if let Ok(v) = row.try_get::<i32, _>(name) {
        return Some(v as f64);
    }
    if let Ok(v) = row.try_get::<String, _>(name) {
        return v.trim().parse::<f64>().ok();
    }
    None
}

fn field_string(row: &PgRow, name: &str) -> Option<String> {
    row.try_get::<String, _>(name).ok()
}
