//! # Batch Loader
//!
//! Full-refresh load of the retail export into a warehouse table:
//!
//! 1. extract and coerce every record (a bad row aborts before anything is touched)
//! 2. connect to the destination
//! 3. truncate the destination table
//! 4. bulk insert the records batch by batch, in source order
//! 5. commit once after the last batch
//!
//! A failure after step 3 leaves the table empty until the next successful load.
//!
//! ```rust
//! use retail_pipeline::loader::{BatchLoader, InMemoryWarehouse};
//!
//! # tokio_test::block_on(async {
//! let warehouse = InMemoryWarehouse::new();
//! let loader = BatchLoader::new(warehouse.clone(), 5_000);
//! let report = loader.load_records(&[], "raw.online_retail").await.unwrap();
//! assert_eq!(report.rows_inserted, 0);
//! assert_eq!(warehouse.truncate_count(), 1);
//! # });
//! ```

use crate::error::Result;
use crate::loader::batch::{partition, LoadProgress};
use crate::loader::source::SourceReader;
use crate::loader::warehouse::{validate_table_name, Warehouse, WarehouseSession};
use crate::models::Record;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, instrument};

/// Outcome of a successful load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub rows_inserted: usize,
    pub batch_sizes: Vec<usize>,
    /// Progress as it stood after each batch
    pub progress: Vec<LoadProgress>,
    pub duration: Duration,
}

pub struct BatchLoader<W: Warehouse> {
    warehouse: W,
    reader: SourceReader,
    batch_size: usize,
    progress: watch::Sender<Option<LoadProgress>>,
}

impl<W: Warehouse> BatchLoader<W> {
    pub fn new(warehouse: W, batch_size: usize) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            warehouse,
            reader: SourceReader::default(),
            batch_size: batch_size.max(1),
            progress,
        }
    }

    pub fn with_reader(mut self, reader: SourceReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Receives the progress of the current load after every batch
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<LoadProgress>> {
        self.progress.subscribe()
    }

    /// Replace the contents of `destination` with every record of `source`
    #[instrument(skip(self, source), fields(source = %source.display()))]
    pub async fn load(&self, source: &Path, destination: &str) -> Result<LoadReport> {
        let started = Instant::now();
        validate_table_name(destination)?;
        let records = self.reader.extract(source).await?;
        self.write_all(&records, destination, started).await
    }

    /// Full-refresh load of already extracted records
    pub async fn load_records(&self, records: &[Record], destination: &str) -> Result<LoadReport> {
        validate_table_name(destination)?;
        self.write_all(records, destination, Instant::now()).await
    }

    async fn write_all(
        &self,
        records: &[Record],
        destination: &str,
        started: Instant,
    ) -> Result<LoadReport> {
        let mut session = self.warehouse.connect().await?;

        info!("Truncating existing data in {destination}");
        session.truncate(destination).await?;

        let total_rows = records.len();
        info!(
            "Loading {total_rows} rows to {} in batches of {}",
            self.warehouse.describe(),
            self.batch_size
        );

        let mut rows_inserted = 0;
        let mut batch_sizes = Vec::new();
        let mut progress_log = Vec::new();
        for (index, batch) in partition(records, self.batch_size).enumerate() {
            let batch_number = index + 1;
            session
                .bulk_insert(destination, batch_number, batch)
                .await?;

            rows_inserted += batch.len();
            batch_sizes.push(batch.len());
            let progress = LoadProgress {
                batch_number,
                rows_inserted,
                total_rows,
            };
            info!(
                "Inserted {rows_inserted}/{total_rows} rows ({}%)",
                progress.percent_text()
            );
            self.progress.send_replace(Some(progress));
            progress_log.push(progress);
        }

        session.commit().await?;

        let duration = started.elapsed();
        info!(
            "Successfully loaded {rows_inserted} rows into {destination} in {:.2} seconds",
            duration.as_secs_f64()
        );

        Ok(LoadReport {
            total_rows,
            rows_inserted,
            batch_sizes,
            progress: progress_log,
            duration,
        })
    }
}
