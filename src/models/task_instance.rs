use super::step_definition::{StepDefinition, StepId};
use crate::state_machine::{StateMachineError, StateMachineResult, StepEvent, StepState, StepStateMachine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// StepTransition is one entry of a task instance's state change audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTransition {
    pub from_state: StepState,
    pub to_state: StepState,
    pub event: String,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

/// TaskInstance is the execution record of one step definition within one pipeline run.
///
/// Created in `pending` when the run starts; immutable once terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    pub step_id: StepId,
    pub state: StepState,
    /// Attempts started so far
    pub attempts: u32,
    pub retries_remaining: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub transitions: Vec<StepTransition>,
}

impl TaskInstance {
    pub fn new(definition: &StepDefinition) -> Self {
        Self {
            step_id: definition.id.clone(),
            state: StepState::Pending,
            attempts: 0,
            retries_remaining: definition.retry_policy.retries,
            started_at: None,
            ended_at: None,
            last_error: None,
            transitions: Vec::new(),
        }
    }

    /// Apply an event, recording the timestamped transition
    pub fn apply(&mut self, event: StepEvent) -> StateMachineResult<StepState> {
        let from_state = self.state;
        let to_state = StepStateMachine::determine_target_state(from_state, &event)?;

        if matches!(event, StepEvent::Retry(_)) {
            if self.retries_remaining == 0 {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                });
            }
            self.retries_remaining -= 1;
        }

        let now = Utc::now();
        if to_state == StepState::Running {
            self.attempts += 1;
            self.started_at.get_or_insert(now);
        }
        if to_state.is_terminal() {
            self.ended_at = Some(now);
        }
        if let Some(message) = event.error_message() {
            self.last_error = Some(message.to_string());
        }

        self.transitions.push(StepTransition {
            from_state,
            to_state,
            event: event.event_type().to_string(),
            attempt: self.attempts,
            created_at: now,
        });
        self.state = to_state;

        Ok(to_state)
    }

    /// When the instance first entered `state`
    pub fn first_entered(&self, state: StepState) -> Option<DateTime<Utc>> {
        self.transitions
            .iter()
            .find(|t| t.to_state == state)
            .map(|t| t.created_at)
    }

    /// When the instance last entered `state`
    pub fn last_entered(&self, state: StepState) -> Option<DateTime<Utc>> {
        self.transitions
            .iter()
            .rev()
            .find(|t| t.to_state == state)
            .map(|t| t.created_at)
    }
}
