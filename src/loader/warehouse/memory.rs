//! In-process destination.
//!
//! Used as the loader's destination in tests and local dry runs. It follows the
//! same visibility rules as the Postgres backend and can be told to become
//! unreachable or to reject a given batch.

use super::{Warehouse, WarehouseSession};
use crate::error::{PipelineError, Result};
use crate::models::Record;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryState {
    /// Committed rows per table
    tables: HashMap<String, Vec<Record>>,
    unreachable: bool,
    fail_on_batch: Option<usize>,
    connects: usize,
    truncates: usize,
    commits: usize,
    insert_batch_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryWarehouse {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate `table` with committed rows
    pub fn seed(&self, table: &str, records: Vec<Record>) {
        self.state.lock().tables.insert(table.to_string(), records);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Reject the insert of this 1-based batch number in every later load
    pub fn fail_on_batch(&self, batch_number: Option<usize>) {
        self.state.lock().fail_on_batch = batch_number;
    }

    /// Committed rows of `table`
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().tables.get(table).map_or(0, Vec::len)
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    pub fn truncate_count(&self) -> usize {
        self.state.lock().truncates
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().commits
    }

    /// Size of every accepted bulk insert, in call order
    pub fn insert_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().insert_batch_sizes.clone()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    type Session = MemorySession;

    async fn connect(&self) -> Result<MemorySession> {
        let mut state = self.state.lock();
        if state.unreachable {
            return Err(PipelineError::Connection {
                destination: self.describe(),
                reason: "warehouse is unreachable".to_string(),
            });
        }
        state.connects += 1;
        Ok(MemorySession {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
        })
    }

    fn describe(&self) -> String {
        "memory://warehouse".to_string()
    }
}

pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    staged: Vec<(String, Record)>,
}

#[async_trait]
impl WarehouseSession for MemorySession {
    async fn truncate(&mut self, table: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.tables.entry(table.to_string()).or_default().clear();
        state.truncates += 1;
        Ok(())
    }

    async fn bulk_insert(
        &mut self,
        table: &str,
        batch_number: usize,
        records: &[Record],
    ) -> Result<u64> {
        let mut state = self.state.lock();
        if state.fail_on_batch == Some(batch_number) {
            return Err(PipelineError::Write {
                table: table.to_string(),
                batch_number,
                reason: "insert rejected by destination".to_string(),
            });
        }
        state.insert_batch_sizes.push(records.len());
        self.staged
            .extend(records.iter().map(|r| (table.to_string(), r.clone())));
        Ok(records.len() as u64)
    }

    async fn commit(self) -> Result<()> {
        let mut state = self.state.lock();
        for (table, record) in self.staged {
            state.tables.entry(table).or_default().push(record);
        }
        state.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn record(invoice_id: &str) -> Record {
        Record {
            invoice_id: invoice_id.to_string(),
            stock_code: "85123A".to_string(),
            description: "WHITE HANGING HEART T-LIGHT HOLDER".to_string(),
            quantity: 6,
            invoice_timestamp: NaiveDate::from_ymd_opt(2010, 12, 1)
                .unwrap()
                .and_hms_opt(8, 26, 0)
                .unwrap(),
            unit_price: Decimal::new(255, 2),
            customer_id: "17850".to_string(),
            country: "United Kingdom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rows_visible_only_after_commit() {
        let warehouse = InMemoryWarehouse::new();
        let mut session = warehouse.connect().await.unwrap();
        session.truncate("raw").await.unwrap();
        session.bulk_insert("raw", 1, &[record("1"), record("2")]).await.unwrap();
        assert_eq!(warehouse.row_count("raw"), 0);

        session.commit().await.unwrap();
        assert_eq!(warehouse.row_count("raw"), 2);
        assert_eq!(warehouse.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_session_discards_staged_rows_but_keeps_truncate() {
        let warehouse = InMemoryWarehouse::new();
        warehouse.seed("raw", vec![record("old")]);
        {
            let mut session = warehouse.connect().await.unwrap();
            session.truncate("raw").await.unwrap();
            session.bulk_insert("raw", 1, &[record("new")]).await.unwrap();
        }
        assert_eq!(warehouse.row_count("raw"), 0);
    }

    #[tokio::test]
    async fn test_unreachable_warehouse_refuses_connections() {
        let warehouse = InMemoryWarehouse::new();
        warehouse.set_unreachable(true);
        assert!(matches!(
            warehouse.connect().await,
            Err(PipelineError::Connection { .. })
        ));
        assert_eq!(warehouse.connect_count(), 0);
    }
}
