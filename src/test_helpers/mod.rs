// Test Helpers Module - Scripted Units of Work
//
// Step units with predetermined outcomes, shared by the unit tests in this
// crate and the integration tests under tests/.

use crate::error::{PipelineError, Result};
use crate::models::{PipelineRun, StepId};
use crate::orchestration::{RunFailure, RunObserver, StepContext, StepOutput, StepUnit};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared, ordered log of step invocations across several scripted steps
pub type InvocationJournal = Arc<Mutex<Vec<StepContext>>>;

#[derive(Debug, Clone)]
enum Outcome {
    Succeed,
    /// Fail this many attempts, then succeed
    FailTimes(u32),
    AlwaysFail,
    /// Always fail with this error
    Error(PipelineError),
}

/// A step unit whose outcome per attempt is fixed up front
#[derive(Debug)]
pub struct ScriptedStep {
    outcome: Outcome,
    delay: Duration,
    attempts: AtomicU32,
    journal: Option<InvocationJournal>,
}

impl ScriptedStep {
    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            attempts: AtomicU32::new(0),
            journal: None,
        }
    }

    pub fn always_succeeds() -> Self {
        Self::with_outcome(Outcome::Succeed)
    }

    /// Exits non-zero on every attempt
    pub fn always_fails() -> Self {
        Self::with_outcome(Outcome::AlwaysFail)
    }

    pub fn fails_n_times(failures: u32) -> Self {
        Self::with_outcome(Outcome::FailTimes(failures))
    }

    pub fn failing_with(error: PipelineError) -> Self {
        Self::with_outcome(Outcome::Error(error))
    }

    /// Sleep this long on every attempt before reporting the outcome
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn recording(mut self, journal: InvocationJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn failure(step_id: &StepId) -> PipelineError {
        PipelineError::StepFailure {
            step_id: step_id.clone(),
            exit_code: Some(1),
        }
    }
}

#[async_trait]
impl StepUnit for ScriptedStep {
    async fn run(&self, context: &StepContext) -> Result<StepOutput> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(journal) = &self.journal {
            journal.lock().push(context.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.outcome {
            Outcome::Succeed => Ok(StepOutput::empty()),
            Outcome::FailTimes(failures) if attempt > *failures => Ok(StepOutput::empty()),
            Outcome::FailTimes(_) | Outcome::AlwaysFail => Err(Self::failure(&context.step_id)),
            Outcome::Error(error) => Err(error.clone()),
        }
    }

    fn kind(&self) -> &'static str {
        "scripted"
    }
}

/// Step ids in the order they were invoked, one entry per attempt
pub fn journal_step_ids(journal: &InvocationJournal) -> Vec<String> {
    journal
        .lock()
        .iter()
        .map(|c| c.step_id.to_string())
        .collect()
}

/// Observer that keeps every failure alert it receives
#[derive(Debug, Default)]
pub struct RecordingObserver {
    alerts: Mutex<Vec<RunFailure>>,
}

impl RecordingObserver {
    pub fn alerts(&self) -> Vec<RunFailure> {
        self.alerts.lock().clone()
    }
}

impl RunObserver for RecordingObserver {
    fn on_step_failed(&self, run: &PipelineRun, failure: &RunFailure) {
        debug_assert!(run.state.is_terminal());
        self.alerts.lock().push(failure.clone());
    }

    fn observer_name(&self) -> &str {
        "recording"
    }
}
