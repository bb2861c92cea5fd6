//! # Run Observers
//!
//! Operator alerting hook. The executor notifies its observer once when a step
//! fails for good and takes the run down with it. Retried attempts that later
//! recover raise no alert.

use crate::constants::PIPELINE_TAGS;
use crate::logging::log_error;
use crate::models::PipelineRun;
use crate::orchestration::types::RunFailure;

/// Receives terminal step failures
pub trait RunObserver: Send + Sync {
    /// Called after `run` has been marked failed because of `failure`
    fn on_step_failed(&self, run: &PipelineRun, failure: &RunFailure);

    fn observer_name(&self) -> &str {
        "unnamed_observer"
    }
}

/// Default observer: raises the alert as an `error` log line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRunObserver;

impl RunObserver for TracingRunObserver {
    fn on_step_failed(&self, run: &PipelineRun, failure: &RunFailure) {
        let skipped: Vec<&str> = failure.skipped.iter().map(|s| s.as_str()).collect();
        let context = format!(
            "run_id={} pipeline_id={} step_id={} attempts={} skipped=[{}] tags=[{}]",
            run.run_id,
            run.pipeline_id,
            failure.step_id,
            failure.attempts,
            skipped.join(","),
            PIPELINE_TAGS.join(",")
        );
        log_error("run_observer", "step_failed", &failure.error, Some(&context));
    }

    fn observer_name(&self) -> &str {
        "tracing"
    }
}
