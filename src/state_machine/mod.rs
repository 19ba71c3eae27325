//! State machines for trigger events and their rebuild units.
//!
//! Both machines are pure rule sets. Persistence goes through the store, which
//! validates every write against these rules.

pub mod build_state_machine;
pub mod errors;
pub mod event_state_machine;
pub mod states;

pub use build_state_machine::BuildStateMachine;
pub use errors::{StateMachineError, StateMachineResult};
pub use event_state_machine::EventStateMachine;
pub use states::{ArtifactBuildState, EventState};

/// Result of validating a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// State changes and must be persisted
    Applied,
    /// Target equals the current state; nothing to write
    Unchanged,
}
