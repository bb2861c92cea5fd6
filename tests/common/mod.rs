#![allow(dead_code)]

use retail_pipeline::models::{RetryPolicy, StepDefinition};
use retail_pipeline::orchestration::StepUnit;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const HEADER: &str =
    "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country\n";

pub const TABLE: &str = "raw.online_retail";

/// Source file of `rows` valid rows; every 3rd row lacks a CustomerID and every 5th a Description
pub fn write_source(dir: &TempDir, rows: usize) -> PathBuf {
    let path = dir.path().join("OnlineRetail.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(HEADER.as_bytes()).unwrap();
    for i in 0..rows {
        let customer = if i % 3 == 0 { "" } else { "17850" };
        let description = if i % 5 == 0 { "" } else { "WHITE HANGING HEART T-LIGHT HOLDER" };
        writeln!(
            file,
            "{},85123A,{description},6,12/1/2010 8:26,2.55,{customer},United Kingdom",
            536_365 + i
        )
        .unwrap();
    }
    path
}

/// Write raw bytes after the header
pub fn write_source_bytes(dir: &TempDir, body: &[u8]) -> PathBuf {
    let path = dir.path().join("OnlineRetail.csv");
    let mut bytes = HEADER.as_bytes().to_vec();
    bytes.extend_from_slice(body);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn policy(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::from_secs(300), Duration::from_secs(3600))
}

pub fn step(id: &str, deps: &[&str], unit: Arc<dyn StepUnit>, retries: u32) -> StepDefinition {
    deps.iter().fold(
        StepDefinition::new(id, unit).with_retry_policy(policy(retries)),
        |definition, dep| definition.depends_on(*dep),
    )
}
