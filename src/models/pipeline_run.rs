use super::step_definition::{StepDefinition, StepId};
use super::task_instance::TaskInstance;
use crate::orchestration::types::{RunFailure, RunSummary, StepSummary};
use crate::state_machine::{RunEvent, RunState, RunStateMachine, StateMachineResult, StepState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// PipelineRun is one execution of the task graph for a logical date.
///
/// Owns one [`TaskInstance`] per step definition, in definition order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub pipeline_id: String,
    /// Cadence tick (or manual trigger time) this run stands for
    pub logical_date: DateTime<Utc>,
    pub state: RunState,
    pub task_instances: Vec<TaskInstance>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub failure: Option<RunFailure>,
}

impl PipelineRun {
    /// Create a queued run with every task instance `pending`
    pub fn new<'a>(
        pipeline_id: impl Into<String>,
        logical_date: DateTime<Utc>,
        definitions: impl IntoIterator<Item = &'a StepDefinition>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_id: pipeline_id.into(),
            logical_date,
            state: RunState::Queued,
            task_instances: definitions.into_iter().map(TaskInstance::new).collect(),
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            failure: None,
        }
    }

    /// Apply a run-level event
    pub fn apply(&mut self, event: RunEvent) -> StateMachineResult<RunState> {
        let target = RunStateMachine::determine_target_state(self.state, &event)?;
        let now = Utc::now();
        if target == RunState::Running {
            self.started_at = Some(now);
        }
        if target.is_terminal() {
            self.ended_at = Some(now);
        }
        self.state = target;
        Ok(target)
    }

    pub fn instance(&self, step_id: &str) -> Option<&TaskInstance> {
        self.task_instances
            .iter()
            .find(|i| i.step_id.as_str() == step_id)
    }

    pub fn instance_mut(&mut self, step_id: &str) -> Option<&mut TaskInstance> {
        self.task_instances
            .iter_mut()
            .find(|i| i.step_id.as_str() == step_id)
    }

    pub fn all_succeeded(&self) -> bool {
        self.task_instances
            .iter()
            .all(|i| i.state.satisfies_dependencies())
    }

    /// Steps that have not left `pending`
    pub fn pending_steps(&self) -> Vec<StepId> {
        self.task_instances
            .iter()
            .filter(|i| i.state == StepState::Pending)
            .map(|i| i.step_id.clone())
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            pipeline_id: self.pipeline_id.clone(),
            logical_date: self.logical_date,
            state: self.state,
            steps: self
                .task_instances
                .iter()
                .map(|i| StepSummary {
                    step_id: i.step_id.clone(),
                    state: i.state,
                    attempts: i.attempts,
                })
                .collect(),
            failure: self.failure.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedStep;
    use std::sync::Arc;

    fn definitions() -> Vec<StepDefinition> {
        vec![
            StepDefinition::new("extract", Arc::new(ScriptedStep::always_succeeds())),
            StepDefinition::new("transform", Arc::new(ScriptedStep::always_succeeds()))
                .depends_on("extract"),
        ]
    }

    #[test]
    fn test_new_run_instantiates_pending_instances() {
        let defs = definitions();
        let run = PipelineRun::new("retail_etl_pipeline", Utc::now(), &defs);
        assert_eq!(run.state, RunState::Queued);
        assert_eq!(run.task_instances.len(), 2);
        assert!(run
            .task_instances
            .iter()
            .all(|i| i.state == StepState::Pending));
        assert_eq!(run.pending_steps().len(), 2);
        assert!(!run.all_succeeded());
    }

    #[test]
    fn test_run_lifecycle_timestamps() {
        let defs = definitions();
        let mut run = PipelineRun::new("retail_etl_pipeline", Utc::now(), &defs);
        run.apply(RunEvent::Start).unwrap();
        assert!(run.started_at.is_some());
        run.apply(RunEvent::Fail("transform failed".into())).unwrap();
        assert_eq!(run.state, RunState::Failed);
        assert!(run.ended_at.is_some());
        assert!(run.apply(RunEvent::Start).is_err());
    }

    #[test]
    fn test_summary_lists_steps_in_definition_order() {
        let defs = definitions();
        let run = PipelineRun::new("retail_etl_pipeline", Utc::now(), &defs);
        let summary = run.summary();
        let ids: Vec<&str> = summary.steps.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(ids, vec!["extract", "transform"]);
        assert!(run.instance("transform").is_some());
        assert!(run.instance("missing").is_none());
    }
}
