mod common;

use common::{write_source, write_source_bytes, TABLE};
use retail_pipeline::constants::{NO_DESCRIPTION, UNKNOWN_CUSTOMER_ID};
use retail_pipeline::error::PipelineError;
use retail_pipeline::loader::{BatchLoader, InMemoryWarehouse, SourceEncoding, SourceReader};
use tempfile::TempDir;

#[tokio::test]
async fn test_ten_thousand_rows_in_three_batches() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 10_250);
    let warehouse = InMemoryWarehouse::new();
    let loader = BatchLoader::new(warehouse.clone(), 5_000);
    let progress = loader.subscribe_progress();

    let report = loader.load(&source, TABLE).await.unwrap();

    assert_eq!(report.total_rows, 10_250);
    assert_eq!(report.rows_inserted, 10_250);
    assert_eq!(report.batch_sizes, vec![5_000, 5_000, 250]);
    let percents: Vec<String> = report.progress.iter().map(|p| p.percent_text()).collect();
    assert_eq!(percents, vec!["48.8", "97.6", "100.0"]);
    assert_eq!((*progress.borrow()).map(|p| p.rows_inserted), Some(10_250));

    assert_eq!(warehouse.row_count(TABLE), 10_250);
    assert_eq!(warehouse.insert_batch_sizes(), vec![5_000, 5_000, 250]);
    assert_eq!(warehouse.truncate_count(), 1);
    assert_eq!(warehouse.commit_count(), 1);
}

#[tokio::test]
async fn test_missing_values_load_as_sentinels() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 30);
    let warehouse = InMemoryWarehouse::new();

    BatchLoader::new(warehouse.clone(), 7)
        .load(&source, TABLE)
        .await
        .unwrap();

    let rows = warehouse.rows(TABLE);
    for (i, row) in rows.iter().enumerate() {
        if i % 3 == 0 {
            assert_eq!(row.customer_id, UNKNOWN_CUSTOMER_ID);
        } else {
            assert_eq!(row.customer_id, "17850");
        }
        if i % 5 == 0 {
            assert_eq!(row.description, NO_DESCRIPTION);
        }
        assert!(!row.customer_id.is_empty());
    }
}

#[tokio::test]
async fn test_loading_twice_keeps_one_copy() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 1_200);
    let warehouse = InMemoryWarehouse::new();
    let loader = BatchLoader::new(warehouse.clone(), 500);

    loader.load(&source, TABLE).await.unwrap();
    let first = warehouse.rows(TABLE);
    loader.load(&source, TABLE).await.unwrap();

    assert_eq!(warehouse.rows(TABLE), first);
    assert_eq!(warehouse.row_count(TABLE), 1_200);
}

#[tokio::test]
async fn test_write_failure_leaves_destination_truncated() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 10_250);
    let warehouse = InMemoryWarehouse::new();
    let loader = BatchLoader::new(warehouse.clone(), 5_000);
    loader.load(&source, TABLE).await.unwrap();
    assert_eq!(warehouse.row_count(TABLE), 10_250);

    warehouse.fail_on_batch(Some(2));
    let err = loader.load(&source, TABLE).await.unwrap_err();

    assert!(matches!(err, PipelineError::Write { batch_number: 2, .. }));
    assert!(err.is_retryable());
    assert_eq!(warehouse.row_count(TABLE), 0);
    assert_eq!(warehouse.truncate_count(), 2);
    assert_eq!(warehouse.commit_count(), 1);
}

#[tokio::test]
async fn test_parse_error_aborts_before_truncate() {
    let dir = TempDir::new().unwrap();
    let warehouse = InMemoryWarehouse::new();
    let loader = BatchLoader::new(warehouse.clone(), 5_000);
    loader
        .load(&write_source(&dir, 10), TABLE)
        .await
        .unwrap();

    let bad = write_source_bytes(
        &dir,
        b"536365,85123A,HOLDER,6,12/1/2010 8:26,2.55,17850,United Kingdom\n\
          536366,22633,HAND WARMER,6,12/1/2010 8:28,two,17850,United Kingdom\n",
    );
    let err = loader.load(&bad, TABLE).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::RecordParse { line: 3, field: "UnitPrice", .. }
    ));
    assert_eq!(warehouse.truncate_count(), 1);
    assert_eq!(warehouse.row_count(TABLE), 10);
}

#[tokio::test]
async fn test_unreachable_destination_aborts_before_truncate() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 10);
    let warehouse = InMemoryWarehouse::new();
    warehouse.set_unreachable(true);

    let err = BatchLoader::new(warehouse.clone(), 5_000)
        .load(&source, TABLE)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Connection { .. }));
    assert_eq!(warehouse.truncate_count(), 0);
}

#[tokio::test]
async fn test_missing_source_file() {
    let dir = TempDir::new().unwrap();
    let err = BatchLoader::new(InMemoryWarehouse::new(), 5_000)
        .load(&dir.path().join("absent.csv"), TABLE)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
}

#[tokio::test]
async fn test_latin1_source_loads() {
    let dir = TempDir::new().unwrap();
    let source = write_source_bytes(
        &dir,
        b"536370,22728,ALARM CLOCK BAKELIKE PINK,24,12/1/2010 8:45,3.75,12583,Fran\xe7e\n",
    );
    let warehouse = InMemoryWarehouse::new();
    BatchLoader::new(warehouse.clone(), 5_000)
        .with_reader(SourceReader::new(SourceEncoding::Latin1, b','))
        .load(&source, TABLE)
        .await
        .unwrap();

    assert_eq!(warehouse.rows(TABLE)[0].country, "Françe");
}

#[tokio::test]
async fn test_empty_source_truncates_and_commits() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 0);
    let warehouse = InMemoryWarehouse::new();
    let report = BatchLoader::new(warehouse.clone(), 5_000)
        .load(&source, TABLE)
        .await
        .unwrap();

    assert_eq!(report.total_rows, 0);
    assert!(report.batch_sizes.is_empty());
    assert_eq!(warehouse.truncate_count(), 1);
    assert_eq!(warehouse.commit_count(), 1);
}
