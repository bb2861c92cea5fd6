use super::{
    errors::{StateMachineError, StateMachineResult},
    events::RunEvent,
    states::RunState,
};

/// Transition table for pipeline runs
pub struct RunStateMachine;

impl RunStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: RunState,
        event: &RunEvent,
    ) -> StateMachineResult<RunState> {
        if current_state.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                entity: "pipeline_run".to_string(),
                state: current_state.to_string(),
            });
        }

        let target = match (current_state, event) {
            (RunState::Queued, RunEvent::Start) => RunState::Running,
            (RunState::Running, RunEvent::Complete) => RunState::Success,
            (RunState::Running, RunEvent::Fail(_)) => RunState::Failed,

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
