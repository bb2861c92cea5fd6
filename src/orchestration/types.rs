//! # Orchestration Types
//!
//! Data structures shared by the executor, the scheduler and the step units:
//! the context handed to a unit of work, what a unit returns, and the
//! operator-facing run summary.

use crate::models::StepId;
use crate::state_machine::{RunState, StepState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context handed to a unit of work for one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepContext {
    pub run_id: Uuid,
    pub logical_date: DateTime<Utc>,
    pub step_id: StepId,
    /// 1-based attempt number
    pub attempt: u32,
}

/// What a successful unit of work reports back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    pub output: serde_json::Value,
}

impl StepOutput {
    pub fn new(output: serde_json::Value) -> Self {
        Self { output }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Identity of the first step that exhausted its retries, its final error and what it blocked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub step_id: StepId,
    pub error: String,
    pub attempts: u32,
    /// Transitive dependents of the failed step; they never leave `pending`
    pub skipped: Vec<StepId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub step_id: StepId,
    pub state: StepState,
    pub attempts: u32,
}

/// Result of a pipeline run as reported to operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub pipeline_id: String,
    pub logical_date: DateTime<Utc>,
    pub state: RunState,
    pub steps: Vec<StepSummary>,
    pub failure: Option<RunFailure>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Success
    }

    pub fn step(&self, step_id: &str) -> Option<&StepSummary> {
        self.steps.iter().find(|s| s.step_id.as_str() == step_id)
    }
}

/// What a single `advance()` pass did
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceOutcome {
    /// Steps whose unit of work was invoked during this pass, in invocation order
    pub started: Vec<StepId>,
    pub run_state: RunState,
}
