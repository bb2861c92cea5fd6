//! # Batch Loader
//!
//! Extract-load half of the pipeline: reads the retail export, coerces it into
//! [`Record`](crate::models::Record)s and writes them to the warehouse with a
//! truncate-then-load strategy and a single commit.

pub mod batch;
pub mod batch_loader;
pub mod source;
pub mod warehouse;

pub use batch::{partition, LoadProgress};
pub use batch_loader::{BatchLoader, LoadReport};
pub use source::{SourceEncoding, SourceReader};
pub use warehouse::{InMemoryWarehouse, Warehouse, WarehouseSession};
#[cfg(feature = "postgres")]
pub use warehouse::PgWarehouse;
