//! Postgres destination backed by a `sqlx` pool.
//!
//! `TRUNCATE` runs on its own autocommitted statement; batches are inserted
//! inside one transaction opened by the first batch and committed at the end.

use super::{validate_table_name, Warehouse, WarehouseSession};
use crate::constants::SOURCE_COLUMNS;
use crate::error::{PipelineError, Result};
use crate::models::Record;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PgWarehouse {
    database_url: String,
    connect_timeout: Duration,
}

impl PgWarehouse {
    pub fn new(database_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            database_url: database_url.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    type Session = PgSession;

    async fn connect(&self) -> Result<PgSession> {
        debug!("Connecting to warehouse {}", self.describe());
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(self.connect_timeout)
            .connect(&self.database_url)
            .await
            .map_err(|e| PipelineError::Connection {
                destination: self.describe(),
                reason: e.to_string(),
            })?;
        info!("Connected to warehouse {}", self.describe());
        Ok(PgSession { pool, tx: None })
    }

    fn describe(&self) -> String {
        // Host and database only; credentials stay out of logs
        let url = self.database_url.as_str();
        let location = match url.rsplit_once('@') {
            Some((_, rest)) => rest,
            None => url.split_once("://").map_or(url, |(_, rest)| rest),
        };
        format!("postgres://{location}")
    }
}

pub struct PgSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

#[async_trait]
impl WarehouseSession for PgSession {
    async fn truncate(&mut self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        sqlx::query(&format!("TRUNCATE TABLE {table}"))
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::Write {
                table: table.to_string(),
                batch_number: 0,
                reason: format!("truncate failed: {e}"),
            })?;
        Ok(())
    }

    async fn bulk_insert(
        &mut self,
        table: &str,
        batch_number: usize,
        records: &[Record],
    ) -> Result<u64> {
        validate_table_name(table)?;
        let write_error = |reason: String| PipelineError::Write {
            table: table.to_string(),
            batch_number,
            reason,
        };

        if self.tx.is_none() {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| write_error(format!("could not open transaction: {e}")))?;
            self.tx = Some(tx);
        }
        let Some(tx) = self.tx.as_mut() else {
            return Err(write_error("transaction unavailable".to_string()));
        };

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {table} ({}) ",
            SOURCE_COLUMNS.join(", ")
        ));
        builder.push_values(records, |mut row, record| {
            row.push_bind(record.invoice_id.clone())
                .push_bind(record.stock_code.clone())
                .push_bind(record.description.clone())
                .push_bind(record.quantity)
                .push_bind(record.invoice_timestamp)
                .push_bind(record.unit_price)
                .push_bind(record.customer_id.clone())
                .push_bind(record.country.clone());
        });

        let result = builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| write_error(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        match self.tx {
            Some(tx) => tx.commit().await.map_err(|e| PipelineError::Write {
                table: String::new(),
                batch_number: 0,
                reason: format!("commit failed: {e}"),
            }),
            None => Ok(()),
        }
    }
}
