//! # Step Units
//!
//! The capability every step exposes to the executor: run one attempt and
//! report success or failure. The executor never looks past this trait, so
//! retry, timeout and dependency handling are identical for every kind of work.

use crate::constants::step_env;
use crate::error::{PipelineError, Result};
use crate::loader::{BatchLoader, Warehouse};
use crate::orchestration::types::{StepContext, StepOutput};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A retryable unit of work
#[async_trait]
pub trait StepUnit: Send + Sync {
    /// Perform one attempt
    async fn run(&self, context: &StepContext) -> Result<StepOutput>;

    /// Short name of the kind of work, for logs
    fn kind(&self) -> &'static str;
}

/// Full-refresh load of the source file into the destination table
pub struct BatchLoadStep<W: Warehouse> {
    loader: BatchLoader<W>,
    source: PathBuf,
    destination: String,
}

impl<W: Warehouse> BatchLoadStep<W> {
    pub fn new(
        loader: BatchLoader<W>,
        source: impl Into<PathBuf>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            loader,
            source: source.into(),
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl<W: Warehouse + 'static> StepUnit for BatchLoadStep<W> {
    async fn run(&self, context: &StepContext) -> Result<StepOutput> {
        info!(
            run_id = %context.run_id,
            step_id = %context.step_id,
            attempt = context.attempt,
            source = %self.source.display(),
            destination = %self.destination,
            "Starting full-refresh load"
        );

        let report = self.loader.load(&self.source, &self.destination).await?;

        Ok(StepOutput::new(serde_json::json!({
            "total_rows": report.total_rows,
            "rows_inserted": report.rows_inserted,
            "batches": report.batch_sizes.len(),
            "duration_ms": report.duration.as_millis() as u64,
        })))
    }

    fn kind(&self) -> &'static str {
        "batch_load"
    }
}

/// Shell invocation of the external transform tool; only the exit status matters
#[derive(Debug, Clone)]
pub struct ExternalProcessStep {
    command: String,
    working_dir: Option<PathBuf>,
}

impl ExternalProcessStep {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl StepUnit for ExternalProcessStep {
    async fn run(&self, context: &StepContext) -> Result<StepOutput> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .env(step_env::RUN_ID, context.run_id.to_string())
            .env(step_env::LOGICAL_DATE, context.logical_date.to_rfc3339())
            .env(step_env::STEP_ID, context.step_id.as_str())
            .env(step_env::ATTEMPT, context.attempt.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The executor drops this future when the timeout elapses
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        debug!(
            step_id = %context.step_id,
            command = %self.command,
            "Executing external step"
        );

        let output = command.output().await.map_err(|e| {
            PipelineError::Internal(format!(
                "Failed to spawn `{}` for step {}: {e}",
                self.command, context.step_id
            ))
        })?;

        log_output(context, &output.stdout, false);

        if output.status.success() {
            return Ok(StepOutput::new(serde_json::json!({
                "exit_code": output.status.code(),
            })));
        }

        log_output(context, &output.stderr, true);
        Err(PipelineError::StepFailure {
            step_id: context.step_id.clone(),
            exit_code: output.status.code(),
        })
    }

    fn kind(&self) -> &'static str {
        "external_process"
    }
}

fn log_output(context: &StepContext, bytes: &[u8], failed: bool) {
    let text = String::from_utf8_lossy(bytes);
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        if failed {
            warn!(step_id = %context.step_id, "{line}");
        } else {
            debug!(step_id = %context.step_id, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn context() -> StepContext {
        StepContext {
            run_id: Uuid::new_v4(),
            logical_date: Utc::now(),
            step_id: "transform_run_staging".into(),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let step = ExternalProcessStep::new("true");
        let output = step.run(&context()).await.unwrap();
        assert_eq!(output.output["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_step_failure() {
        let step = ExternalProcessStep::new("echo broken >&2; exit 3");
        let err = step.run(&context()).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::StepFailure {
                step_id: "transform_run_staging".into(),
                exit_code: Some(3),
            }
        );
    }

    #[tokio::test]
    async fn test_step_environment_is_exported() {
        let ctx = context();
        let step = ExternalProcessStep::new(format!(
            "test \"${}\" = \"{}\" && test \"${}\" = 1",
            step_env::RUN_ID,
            ctx.run_id,
            step_env::ATTEMPT
        ));
        assert!(step.run(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "x").unwrap();
        let step = ExternalProcessStep::new("test -f marker").in_dir(dir.path());
        assert!(step.run(&context()).await.is_ok());
    }
}
