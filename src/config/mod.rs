//! # Pipeline Configuration
//!
//! Typed configuration tree for the retail pipeline. Every field has a default
//! reproducing the production DAG, so an empty configuration is valid:
//!
//! ```rust
//! use retail_pipeline::config::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.schedule.cron, "0 2 * * *");
//! ```
//!
//! Values are loaded by [`ConfigManager`] from an optional TOML file layered
//! under `RETAIL_PIPELINE__*` environment variables.

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::{self, loader as loader_defaults, retry, schedule};
use crate::loader::SourceEncoding;
use crate::models::RetryPolicy;
use crate::orchestration::scheduler::parse_cadence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline_id: String,
    pub schedule: ScheduleConfig,
    pub retry: RetryConfig,
    pub loader: LoaderConfig,
    pub warehouse: WarehouseConfig,
    pub transform: TransformConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_id: constants::PIPELINE_ID.to_string(),
            schedule: ScheduleConfig::default(),
            retry: RetryConfig::default(),
            loader: LoaderConfig::default(),
            warehouse: WarehouseConfig::default(),
            transform: TransformConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Five- or six-field cron expression, evaluated in UTC
    pub cron: String,
    /// RFC 3339 instant; no tick before it fires
    pub start_date: String,
    /// Backfilling missed intervals is not supported; must stay `false`
    pub catchup: bool,
    pub max_active_runs: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: schedule::DEFAULT_CRON.to_string(),
            start_date: schedule::DEFAULT_START_DATE.to_string(),
            catchup: false,
            max_active_runs: schedule::MAX_ACTIVE_RUNS,
        }
    }
}

impl ScheduleConfig {
    pub fn start_boundary(&self) -> ConfigResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.start_date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| {
                ConfigurationError::invalid_value("schedule.start_date", &self.start_date, e.to_string())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub retry_delay_seconds: u64,
    pub execution_timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: retry::DEFAULT_RETRIES,
            retry_delay_seconds: retry::DEFAULT_RETRY_DELAY.as_secs(),
            execution_timeout_seconds: retry::DEFAULT_EXECUTION_TIMEOUT.as_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retries,
            Duration::from_secs(self.retry_delay_seconds),
            Duration::from_secs(self.execution_timeout_seconds),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub source_path: PathBuf,
    pub destination_table: String,
    pub batch_size: usize,
    pub encoding: SourceEncoding,
    pub delimiter: char,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(loader_defaults::DEFAULT_SOURCE_PATH),
            destination_table: loader_defaults::DEFAULT_DESTINATION_TABLE.to_string(),
            batch_size: loader_defaults::DEFAULT_BATCH_SIZE,
            encoding: SourceEncoding::default(),
            delimiter: loader_defaults::DEFAULT_DELIMITER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub database_url: String,
    pub connect_timeout_seconds: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/retail_dw".to_string(),
            connect_timeout_seconds: 30,
        }
    }
}

impl WarehouseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Database URL with any password replaced, for logging
    pub fn redacted_database_url(&self) -> String {
        let url = &self.database_url;
        let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
            return url.clone();
        };
        let Some(at) = url[scheme_end..].find('@').map(|i| i + scheme_end) else {
            return url.clone();
        };
        match url[scheme_end..at].find(':') {
            Some(colon) => format!("{}:***{}", &url[..scheme_end + colon], &url[at..]),
            None => url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Transform tool executable, invoked through `sh -c`
    pub program: String,
    /// Working directory of every transform step
    pub project_dir: PathBuf,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            program: "dbt".to_string(),
            project_dir: PathBuf::from("dbt"),
        }
    }
}

impl PipelineConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pipeline_id.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "pipeline_id",
                "pipeline configuration",
            ));
        }

        parse_cadence(&self.schedule.cron).map_err(|e| {
            ConfigurationError::invalid_value("schedule.cron", &self.schedule.cron, e.to_string())
        })?;
        self.schedule.start_boundary()?;

        if self.schedule.catchup {
            return Err(ConfigurationError::invalid_value(
                "schedule.catchup",
                "true",
                "missed intervals are never backfilled",
            ));
        }

        if self.schedule.max_active_runs != schedule::MAX_ACTIVE_RUNS {
            return Err(ConfigurationError::invalid_value(
                "schedule.max_active_runs",
                self.schedule.max_active_runs.to_string(),
                "exactly one pipeline run may be active",
            ));
        }

        if self.retry.execution_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.execution_timeout_seconds",
                "0",
                "execution timeout must be greater than 0",
            ));
        }

        if self.loader.batch_size == 0 || self.loader.batch_size > constants::MAX_BATCH_SIZE {
            return Err(ConfigurationError::invalid_value(
                "loader.batch_size",
                self.loader.batch_size.to_string(),
                format!("batch size must be between 1 and {}", constants::MAX_BATCH_SIZE),
            ));
        }

        if self.loader.destination_table.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "loader.destination_table",
                "loader configuration",
            ));
        }

        if !self.loader.delimiter.is_ascii() {
            return Err(ConfigurationError::invalid_value(
                "loader.delimiter",
                self.loader.delimiter.to_string(),
                "delimiter must be a single ASCII character",
            ));
        }

        if self.warehouse.database_url.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "warehouse.database_url",
                "warehouse configuration",
            ));
        }

        Ok(())
    }
}
