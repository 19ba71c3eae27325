use thiserror::Error;

/// Errors raised when applying event or rebuild unit transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Transition to {to} requires a non-empty reason")]
    MissingReason { to: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },
}

impl StateMachineError {
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
