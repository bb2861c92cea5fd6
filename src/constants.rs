//! # System Constants
//!
//! Fixed values that define the operational boundaries of the retail pipeline:
//! the default retry policy, the run cadence, the source column set and the
//! sentinels substituted for missing values.

use std::time::Duration;

/// Identifier of the retail pipeline in logs and run summaries
pub const PIPELINE_ID: &str = "retail_etl_pipeline";

/// Tags attached to every run log line
pub const PIPELINE_TAGS: &[&str] = &["retail", "etl", "warehouse", "transform"];

/// Sentinel loaded when `CustomerID` is missing
pub const UNKNOWN_CUSTOMER_ID: &str = "UNKNOWN";

/// Sentinel loaded when `Description` is missing
pub const NO_DESCRIPTION: &str = "NO DESCRIPTION";

/// Tokens a source cell may hold that count as a missing value
pub const MISSING_VALUE_TOKENS: &[&str] = &[
    "", "NA", "N/A", "NULL", "NaN", "nan", "null", "#N/A", "<NA>", "None",
];

/// Source header, in destination column order
pub const SOURCE_COLUMNS: [&str; 8] = [
    "InvoiceNo",
    "StockCode",
    "Description",
    "Quantity",
    "InvoiceDate",
    "UnitPrice",
    "CustomerID",
    "Country",
];

/// Accepted `InvoiceDate` layouts, tried in order
pub const SOURCE_TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Postgres caps a single statement at this many bind parameters
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Largest batch a single multi-row insert can carry
pub const MAX_BATCH_SIZE: usize = MAX_BIND_PARAMETERS / SOURCE_COLUMNS.len();

/// Step retry policy applied when a step does not override it
pub mod retry {
    use super::Duration;

    pub const DEFAULT_RETRIES: u32 = 2;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(60 * 60);
}

/// Run cadence defaults
pub mod schedule {
    /// Daily at 02:00 UTC
    pub const DEFAULT_CRON: &str = "0 2 * * *";
    /// No tick before this instant ever fires
    pub const DEFAULT_START_DATE: &str = "2024-01-01T00:00:00Z";
    /// Exactly one run may be active
    pub const MAX_ACTIVE_RUNS: u32 = 1;
}

/// Batch loader defaults
pub mod loader {
    pub const DEFAULT_BATCH_SIZE: usize = 5_000;
    pub const DEFAULT_DESTINATION_TABLE: &str = "RETAIL_DW.RAW.ONLINE_RETAIL";
    pub const DEFAULT_SOURCE_PATH: &str = "data/OnlineRetail.csv";
    pub const DEFAULT_DELIMITER: char = ',';
}

/// Identifiers of the steps that make up the retail chain, in execution order
pub mod steps {
    pub const LOAD_CSV_TO_WAREHOUSE: &str = "load_csv_to_warehouse";
    pub const INSTALL_DEPENDENCIES: &str = "transform_install_dependencies";
    pub const RUN_STAGING: &str = "transform_run_staging";
    pub const TEST_STAGING: &str = "transform_test_staging";
    pub const RUN_ANALYTICS: &str = "transform_run_analytics";
    pub const TEST_ANALYTICS: &str = "transform_test_analytics";
    pub const GENERATE_DOCS: &str = "transform_generate_docs";

    pub const CHAIN: [&str; 7] = [
        LOAD_CSV_TO_WAREHOUSE,
        INSTALL_DEPENDENCIES,
        RUN_STAGING,
        TEST_STAGING,
        RUN_ANALYTICS,
        TEST_ANALYTICS,
        GENERATE_DOCS,
    ];
}

/// Environment variables handed to external step commands
pub mod step_env {
    pub const RUN_ID: &str = "PIPELINE_RUN_ID";
    pub const LOGICAL_DATE: &str = "PIPELINE_LOGICAL_DATE";
    pub const STEP_ID: &str = "PIPELINE_STEP_ID";
    pub const ATTEMPT: &str = "PIPELINE_ATTEMPT";
}
