#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Retail Pipeline
//!
//! Scheduled extract-load of retail transactions into a warehouse raw table,
//! followed by the transform tool's build, test and documentation steps.
//!
//! ## Overview
//!
//! Two engines make up the crate:
//!
//! - an **orchestration engine** that runs step definitions in dependency order
//!   with per-step retry, fixed delay and timeout, allows at most one pipeline
//!   run at a time, and fires runs on a cron cadence without backfilling
//! - a **batch loader** that coerces the source rows, substitutes sentinels for
//!   missing values and performs a truncate-then-load with one final commit
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Task graph, executor, run registry and scheduler
//! - [`loader`] - Source extraction, batching and warehouse backends
//! - [`state_machine`] - Run and step state transitions
//! - [`models`] - Pipeline runs, task instances, step definitions and records
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use retail_pipeline::config::PipelineConfig;
//! use retail_pipeline::loader::InMemoryWarehouse;
//! use retail_pipeline::orchestration::{build_retail_graph, TaskGraphExecutor};
//!
//! # async fn example() -> retail_pipeline::Result<()> {
//! let config = PipelineConfig::default();
//! let graph = build_retail_graph(&config, InMemoryWarehouse::new())?;
//! let executor = TaskGraphExecutor::new(config.pipeline_id.clone(), graph);
//!
//! let summary = executor.trigger(chrono::Utc::now()).await?;
//! if let Some(failure) = &summary.failure {
//!     eprintln!("step {} failed after {} attempts", failure.step_id, failure.attempts);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod loader;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod test_helpers;

pub use config::{ConfigManager, PipelineConfig};
pub use error::{PipelineError, Result};
pub use loader::{BatchLoader, InMemoryWarehouse, LoadReport};
pub use models::{PipelineRun, Record, RetryPolicy, StepDefinition, StepId, TaskInstance};
pub use orchestration::{RunScheduler, RunSummary, TaskGraph, TaskGraphExecutor};
pub use state_machine::{RunState, StepState};
