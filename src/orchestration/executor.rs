//! # Task Graph Executor
//!
//! Drives one pipeline run through its task graph. A run is started with
//! [`TaskGraphExecutor::start_run`], which claims the single run slot, and is
//! then advanced pass by pass: each pass invokes every step whose dependencies
//! have all succeeded, applying the step's retry, delay and timeout policy.
//!
//! The first step to exhaust its retries fails the run. No further step starts,
//! and the failed step's transitive dependents are reported as skipped.
//!
//! ```rust,no_run
//! use retail_pipeline::orchestration::{TaskGraph, TaskGraphExecutor};
//! # async fn example(graph: TaskGraph) -> retail_pipeline::error::Result<()> {
//! let executor = TaskGraphExecutor::new("retail_etl_pipeline", graph);
//! let summary = executor.trigger(chrono::Utc::now()).await?;
//! println!("run {} finished {}", summary.run_id, summary.state);
//! # Ok(())
//! # }
//! ```

use crate::error::{PipelineError, Result};
use crate::logging::{log_run_operation, log_step_operation};
use crate::models::{PipelineRun, StepId, TaskInstance};
use crate::orchestration::observer::{RunObserver, TracingRunObserver};
use crate::orchestration::run_registry::{RunRegistry, RunSlot};
use crate::orchestration::task_graph::TaskGraph;
use crate::orchestration::types::{AdvanceOutcome, RunFailure, RunSummary, StepContext};
use crate::orchestration::viable_step_discovery::ViableStepDiscovery;
use crate::state_machine::{RunEvent, RunState, StepEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct TaskGraphExecutor {
    pipeline_id: String,
    graph: Arc<TaskGraph>,
    registry: RunRegistry,
    observer: Arc<dyn RunObserver>,
}

impl TaskGraphExecutor {
    pub fn new(pipeline_id: impl Into<String>, graph: TaskGraph) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            graph: Arc::new(graph),
            registry: RunRegistry::new(),
            observer: Arc::new(TracingRunObserver),
        }
    }

    /// Replace the default log-based failure alert
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Create a run for `logical_date` and claim the run slot.
    ///
    /// Fails with `ConcurrencyViolation` while another run holds the slot; the
    /// active run is left untouched.
    #[instrument(skip(self), fields(pipeline_id = %self.pipeline_id))]
    pub fn start_run(&self, logical_date: DateTime<Utc>) -> Result<ActiveRun> {
        let mut run = PipelineRun::new(
            self.pipeline_id.clone(),
            logical_date,
            self.graph.definitions(),
        );
        let slot = self.registry.try_acquire(run.run_id, logical_date)?;
        run.apply(RunEvent::Start)?;

        log_run_operation(
            "start_run",
            run.run_id,
            &self.pipeline_id,
            "running",
            Some(&format!("logical_date={}", logical_date.to_rfc3339())),
        );

        Ok(ActiveRun {
            graph: Arc::clone(&self.graph),
            observer: Arc::clone(&self.observer),
            run,
            slot: Some(slot),
        })
    }

    /// Start a run and drive it to a terminal state
    pub async fn trigger(&self, logical_date: DateTime<Utc>) -> Result<RunSummary> {
        self.start_run(logical_date)?.run_to_completion().await
    }
}

/// A started pipeline run; holds the run slot until the run is terminal
pub struct ActiveRun {
    graph: Arc<TaskGraph>,
    observer: Arc<dyn RunObserver>,
    run: PipelineRun,
    slot: Option<RunSlot>,
}

impl ActiveRun {
    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    pub fn run_id(&self) -> uuid::Uuid {
        self.run.run_id
    }

    /// One scheduling pass: invoke every pending step whose dependencies are
    /// all `success`, in topological order, stopping early if the run fails.
    #[instrument(skip(self), fields(run_id = %self.run.run_id))]
    pub async fn advance(&mut self) -> Result<AdvanceOutcome> {
        if self.run.state.is_terminal() {
            return Ok(AdvanceOutcome {
                started: Vec::new(),
                run_state: self.run.state,
            });
        }

        let viable = ViableStepDiscovery::new(&self.graph).find_viable_steps(&self.run);
        if viable.is_empty() && !self.run.all_succeeded() {
            return Err(PipelineError::Internal(format!(
                "run {} has no viable steps but pending steps {:?}",
                self.run.run_id,
                self.run.pending_steps()
            )));
        }

        let mut started = Vec::with_capacity(viable.len());
        for step_id in viable {
            started.push(step_id.clone());
            if !self.execute_step(&step_id).await? {
                break;
            }
        }

        if self.run.state == RunState::Running && self.run.all_succeeded() {
            self.complete_run()?;
        }

        Ok(AdvanceOutcome {
            started,
            run_state: self.run.state,
        })
    }

    /// Advance until the run is terminal
    pub async fn run_to_completion(mut self) -> Result<RunSummary> {
        loop {
            let outcome = self.advance().await?;
            if outcome.run_state.is_terminal() {
                return Ok(self.run.summary());
            }
        }
    }

    /// Attempt one step until it succeeds or fails for good. Returns whether it succeeded.
    async fn execute_step(&mut self, step_id: &StepId) -> Result<bool> {
        let graph = Arc::clone(&self.graph);
        let definition = graph.definition(step_id.as_str()).ok_or_else(|| {
            PipelineError::Internal(format!("step {step_id} is not part of the task graph"))
        })?;
        let policy = &definition.retry_policy;
        let run_id = self.run.run_id;

        loop {
            let attempt = {
                let instance = self.instance_mut(step_id)?;
                instance.apply(StepEvent::Start)?;
                instance.attempts
            };
            let context = StepContext {
                run_id,
                logical_date: self.run.logical_date,
                step_id: step_id.clone(),
                attempt,
            };

            log_step_operation(
                "execute_step",
                run_id,
                step_id.as_str(),
                context.attempt,
                "running",
                Some(definition.unit.kind()),
            );

            let result =
                match tokio::time::timeout(policy.execution_timeout, definition.unit.run(&context))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::StepTimeout {
                        step_id: step_id.clone(),
                        timeout: policy.execution_timeout,
                    }),
                };

            let instance = self.instance_mut(step_id)?;
            match result {
                Ok(output) => {
                    instance.apply(StepEvent::Complete)?;
                    debug!(step_id = %step_id, output = %output.output, "Step output");
                    log_step_operation(
                        "execute_step",
                        run_id,
                        step_id.as_str(),
                        context.attempt,
                        "success",
                        None,
                    );
                    return Ok(true);
                }
                Err(err) if err.is_retryable() && instance.retries_remaining > 0 => {
                    instance.apply(StepEvent::retry_with_error(err.to_string()))?;
                    warn!(
                        run_id = %run_id,
                        step_id = %step_id,
                        attempt = context.attempt,
                        retries_remaining = instance.retries_remaining,
                        retry_delay_secs = policy.retry_delay.as_secs_f64(),
                        error = %err,
                        "Step attempt failed, retrying after delay"
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                }
                Err(err) => {
                    instance.apply(StepEvent::fail_with_error(err.to_string()))?;
                    let attempts = instance.attempts;
                    self.fail_run(step_id, &err, attempts)?;
                    return Ok(false);
                }
            }
        }
    }

    fn instance_mut(&mut self, step_id: &StepId) -> Result<&mut TaskInstance> {
        let run_id = self.run.run_id;
        self.run.instance_mut(step_id.as_str()).ok_or_else(|| {
            PipelineError::Internal(format!("run {run_id} has no task instance for {step_id}"))
        })
    }

    fn complete_run(&mut self) -> Result<()> {
        self.run.apply(RunEvent::Complete)?;
        self.slot.take();
        log_run_operation(
            "complete_run",
            self.run.run_id,
            &self.run.pipeline_id,
            "success",
            None,
        );
        Ok(())
    }

    fn fail_run(&mut self, step_id: &StepId, err: &PipelineError, attempts: u32) -> Result<()> {
        let skipped = self.graph.transitive_dependents(step_id.as_str());
        let exhausted = PipelineError::RetriesExhausted {
            step_id: step_id.clone(),
            attempts,
            last_error: err.to_string(),
        };

        error!(
            run_id = %self.run.run_id,
            pipeline_id = %self.run.pipeline_id,
            step_id = %step_id,
            attempts = attempts,
            error = %err,
            skipped = ?skipped,
            "Pipeline run failed"
        );

        let failure = RunFailure {
            step_id: step_id.clone(),
            error: err.to_string(),
            attempts,
            skipped,
        };
        self.run.failure = Some(failure.clone());
        self.run.apply(RunEvent::Fail(exhausted.to_string()))?;
        self.slot.take();
        self.observer.on_step_failed(&self.run, &failure);

        info!(run_id = %self.run.run_id, "Run slot released after failure");
        Ok(())
    }
}
