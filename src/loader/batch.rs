//! Batch partitioning and load progress.

use serde::{Deserialize, Serialize};

/// Split `records` into contiguous slices of at most `batch_size`, in source order.
///
/// Every batch but the last holds exactly `batch_size` records. A `batch_size`
/// of zero is treated as one.
pub fn partition<T>(records: &[T], batch_size: usize) -> std::slice::Chunks<'_, T> {
    records.chunks(batch_size.max(1))
}

/// Progress after a batch has been written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    /// 1-based number of the batch just written
    pub batch_number: usize,
    pub rows_inserted: usize,
    pub total_rows: usize,
}

impl LoadProgress {
    /// Share of rows written, in percent; an empty load is complete
    pub fn percent(&self) -> f64 {
        if self.total_rows == 0 {
            return 100.0;
        }
        self.rows_inserted as f64 / self.total_rows as f64 * 100.0
    }

    /// Percentage with one decimal, as logged
    pub fn percent_text(&self) -> String {
        format!("{:.1}", self.percent())
    }
}
