use super::errors::{StateMachineError, StateMachineResult};
use super::states::ArtifactBuildState;
use super::TransitionOutcome;

/// Transition rules for rebuild units
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStateMachine;

impl BuildStateMachine {
    pub fn target_allowed(from: ArtifactBuildState, to: ArtifactBuildState) -> bool {
        use ArtifactBuildState::*;
        matches!(
            (from, to),
            (Planned, Building)
                | (Planned, Failed)
                | (Planned, Skipped)
                | (Building, Done)
                | (Building, Failed)
        )
    }

    /// Validate a transition. Re-applying the current state is a no-op.
    pub fn transition(
        from: ArtifactBuildState,
        to: ArtifactBuildState,
        reason: Option<&str>,
    ) -> StateMachineResult<TransitionOutcome> {
        if from == to {
            return Ok(TransitionOutcome::Unchanged);
        }
        if !Self::target_allowed(from, to) {
            return Err(StateMachineError::invalid_transition(from, to));
        }
        if to.requires_reason() && reason.map_or(true, |r| r.trim().is_empty()) {
            return Err(StateMachineError::MissingReason { to: to.to_string() });
        }
        Ok(TransitionOutcome::Applied)
    }
}
