//! # Warehouse Destinations
//!
//! The loader talks to its destination through two traits: a [`Warehouse`]
//! hands out sessions, and a [`WarehouseSession`] truncates, bulk inserts and
//! commits. A truncate takes effect immediately; inserted rows only become
//! visible at `commit`, and dropping a session without committing discards them.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{InMemoryWarehouse, MemorySession};
#[cfg(feature = "postgres")]
pub use postgres::{PgSession, PgWarehouse};

use crate::error::{PipelineError, Result};
use crate::models::Record;
use async_trait::async_trait;

#[async_trait]
pub trait Warehouse: Send + Sync {
    type Session: WarehouseSession;

    /// Open a session; fails with `Connection` when the destination is unreachable
    async fn connect(&self) -> Result<Self::Session>;

    /// Name of the destination for logs
    fn describe(&self) -> String;
}

#[async_trait]
pub trait WarehouseSession: Send {
    /// Empty `table`; not undone by a later failure
    async fn truncate(&mut self, table: &str) -> Result<()>;

    /// Write one batch in a single call; fails with `Write` when rejected
    async fn bulk_insert(&mut self, table: &str, batch_number: usize, records: &[Record])
        -> Result<u64>;

    /// Make every inserted batch visible
    async fn commit(self) -> Result<()>;
}

/// Reject table names that are not dotted plain identifiers
pub fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(PipelineError::Configuration(format!(
            "invalid destination table name '{table}'"
        )))
    }
}
