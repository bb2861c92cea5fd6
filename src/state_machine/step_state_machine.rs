use super::{
    errors::{StateMachineError, StateMachineResult},
    events::StepEvent,
    states::StepState,
};

/// Transition table for task instances.
///
/// ```text
/// pending ──start──▶ running ──complete──▶ success
///                      │  ▲
///                retry │  │ start
///                      ▼  │
///                    retrying
///
/// running ──fail──▶ failed
/// ```
pub struct StepStateMachine;

impl StepStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: StepState,
        event: &StepEvent,
    ) -> StateMachineResult<StepState> {
        if current_state.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                entity: "task_instance".to_string(),
                state: current_state.to_string(),
            });
        }

        let target = match (current_state, event) {
            (StepState::Pending, StepEvent::Start) => StepState::Running,
            (StepState::Retrying, StepEvent::Start) => StepState::Running,

            (StepState::Running, StepEvent::Complete) => StepState::Success,
            (StepState::Running, StepEvent::Retry(_)) => StepState::Retrying,
            (StepState::Running, StepEvent::Fail(_)) => StepState::Failed,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }
}
