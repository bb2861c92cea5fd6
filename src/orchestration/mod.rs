//! # Orchestration Engine
//!
//! Dependency-ordered execution of pipeline steps with per-step retry, delay
//! and timeout, single-run exclusivity, and cron-driven triggering.
//!
//! ## Core Components
//!
//! - **TaskGraph**: validated DAG of step definitions
//! - **ViableStepDiscovery**: which pending steps have every dependency in `success`
//! - **RunRegistry**: single-slot registry holding the one active run
//! - **TaskGraphExecutor**: starts runs and advances them to a terminal state
//! - **RunScheduler**: fires runs on a cron cadence, dropping ticks while busy
//! - **RunObserver**: alert hook for steps that fail for good
//! - **StepUnit**: the capability each step exposes (`BatchLoadStep`, `ExternalProcessStep`)
//!
//! The retail chain itself is assembled in [`pipeline`].

pub mod executor;
pub mod observer;
pub mod pipeline;
pub mod run_registry;
pub mod scheduler;
pub mod step_unit;
pub mod task_graph;
pub mod types;
pub mod viable_step_discovery;

// Re-export core types and components for easy access
pub use executor::{ActiveRun, TaskGraphExecutor};
pub use observer::{RunObserver, TracingRunObserver};
pub use pipeline::{build_retail_graph, retail_step_definitions};
pub use run_registry::{ActiveRunInfo, RunRegistry, RunSlot};
pub use scheduler::{parse_cadence, RunScheduler, TickOutcome};
pub use step_unit::{BatchLoadStep, ExternalProcessStep, StepUnit};
pub use task_graph::TaskGraph;
pub use types::*;
pub use viable_step_discovery::ViableStepDiscovery;
