use thiserror::Error;

/// Error types for state machine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Entity {entity} is terminal in state {state}")]
    AlreadyTerminal { entity: String, state: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
