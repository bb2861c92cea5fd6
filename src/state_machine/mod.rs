// State machine module for pipeline runs and their task instances
//
// Transitions are pure functions over (state, event); the owning model records
// the timestamped transition once the table accepts it.

pub mod errors;
pub mod events;
pub mod run_state_machine;
pub mod states;
pub mod step_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{RunEvent, StepEvent};
pub use run_state_machine::RunStateMachine;
pub use states::{RunState, StepState};
pub use step_state_machine::StepStateMachine;
