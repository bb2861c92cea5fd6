//! Error types for the retail pipeline.
//!

use crate::config::ConfigurationError;
use crate::models::StepId;
use crate::state_machine::StateMachineError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The destination could not be reached; raised before anything is truncated
    #[error("Connection error: cannot reach {destination}: {reason}")]
    Connection { destination: String, reason: String },

    /// A source row failed type coercion; raised before anything is truncated
    #[error("Record parse error at line {line}, field {field} ({value:?}): {reason}")]
    RecordParse {
        line: u64,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Source unavailable: {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },

    /// The destination rejected a bulk insert; the destination stays truncated
    #[error("Write error on batch {batch_number} of {table}: {reason}")]
    Write {
        table: String,
        batch_number: usize,
        reason: String,
    },

    #[error("Concurrency violation: pipeline run {active_run_id} is already running")]
    ConcurrencyViolation { active_run_id: Uuid },

    /// A transform-tool invocation exited non-zero (`None` when killed by a signal)
    #[error("Step {step_id} failed with exit code {exit_code:?}")]
    StepFailure {
        step_id: StepId,
        exit_code: Option<i32>,
    },

    #[error("Step {step_id} exceeded its execution timeout of {timeout:?}")]
    StepTimeout { step_id: StepId, timeout: Duration },

    #[error("Step {step_id} exhausted its retries after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        step_id: StepId,
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid task graph: {0}")]
    InvalidGraph(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("State transition error: {0}")]
    StateTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether a step that produced this error may be attempted again
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::ConcurrencyViolation { .. }
                | Self::InvalidGraph(_)
                | Self::Configuration(_)
                | Self::RetriesExhausted { .. }
        )
    }

    pub fn record_parse(
        line: u64,
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::RecordParse {
            line,
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl From<StateMachineError> for PipelineError {
    fn from(err: StateMachineError) -> Self {
        PipelineError::StateTransition(err.to_string())
    }
}

impl From<ConfigurationError> for PipelineError {
    fn from(err: ConfigurationError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Internal(format!("Blocking task did not complete: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PipelineError::StepFailure {
            step_id: StepId::from("transform_run_staging"),
            exit_code: Some(1),
        }
        .is_retryable());
        assert!(PipelineError::Write {
            table: "raw".into(),
            batch_number: 2,
            reason: "rejected".into(),
        }
        .is_retryable());
        assert!(!PipelineError::ConcurrencyViolation {
            active_run_id: Uuid::new_v4()
        }
        .is_retryable());
        assert!(!PipelineError::Configuration("bad".into()).is_retryable());
    }

    #[test]
    fn test_record_parse_display() {
        let err = PipelineError::record_parse(7, "Quantity", "abc", "invalid digit found in string");
        assert_eq!(
            err.to_string(),
            "Record parse error at line 7, field Quantity (\"abc\"): invalid digit found in string"
        );
    }
}
