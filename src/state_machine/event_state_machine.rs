use super::errors::{StateMachineError, StateMachineResult};
use super::states::{ArtifactBuildState, EventState};
use super::TransitionOutcome;
use crate::constants::reasons;
use tracing::debug;

/// Transition rules for trigger events
#[derive(Debug, Clone, Copy, Default)]
pub struct EventStateMachine;

impl EventStateMachine {
    /// Check whether `from -> to` is a legal move (same-state is handled separately)
    pub fn target_allowed(from: EventState, to: EventState) -> bool {
        use EventState::*;
        matches!(
            (from, to),
            (Initialized, Building)
                | (Initialized, Skipped)
                | (Initialized, Complete)
                | (Initialized, CompleteFailed)
                | (Building, Complete)
                | (Building, CompleteFailed)
        )
    }

    /// Validate a transition. Re-applying the current state is a no-op.
    pub fn transition(
        from: EventState,
        to: EventState,
        reason: Option<&str>,
    ) -> StateMachineResult<TransitionOutcome> {
        if from == to {
            debug!(state = %to, "Event already in target state");
            return Ok(TransitionOutcome::Unchanged);
        }
        if !Self::target_allowed(from, to) {
            return Err(StateMachineError::invalid_transition(from, to));
        }
        if to == EventState::Skipped && reason.map_or(true, |r| r.trim().is_empty()) {
            return Err(StateMachineError::MissingReason { to: to.to_string() });
        }
        Ok(TransitionOutcome::Applied)
    }

    /// Derive the event state implied by its rebuild units.
    ///
    /// Returns `None` when there are no units, since the caller decides whether
    /// that means SKIPPED.
    pub fn settle(builds: &[ArtifactBuildState]) -> Option<(EventState, &'static str)> {
        if builds.is_empty() {
            return None;
        }
        if builds.iter().any(|s| s.is_active()) {
            return Some((EventState::Building, reasons::WAITING_FOR_BUILDS));
        }
        if builds.iter().any(|s| *s == ArtifactBuildState::Failed) {
            Some((EventState::CompleteFailed, reasons::SOME_BUILDS_FAILED))
        } else {
            Some((EventState::Complete, reasons::ALL_BUILDS_DONE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ArtifactBuildState::*;

    #[test]
    fn test_terminal_states_accept_no_further_moves() {
        for terminal in [
            EventState::Complete,
            EventState::CompleteFailed,
            EventState::Skipped,
        ] {
            assert!(EventStateMachine::transition(terminal, EventState::Building, None).is_err());
            assert!(
                EventStateMachine::transition(terminal, EventState::Initialized, None).is_err()
            );
        }
    }

    #[test]
    fn test_same_state_is_noop() {
        let outcome =
            EventStateMachine::transition(EventState::Building, EventState::Building, None)
                .unwrap();
        assert_eq!(outcome, TransitionOutcome::Unchanged);
    }

    #[test]
    fn test_skip_requires_reason() {
        let err = EventStateMachine::transition(EventState::Initialized, EventState::Skipped, None)
            .unwrap_err();
        assert!(matches!(err, StateMachineError::MissingReason { .. }));
        assert!(EventStateMachine::transition(
            EventState::Initialized,
            EventState::Skipped,
            Some("No container images to rebuild")
        )
        .is_ok());
    }

    #[test]
    fn test_building_cannot_be_skipped() {
        assert!(!EventStateMachine::target_allowed(
            EventState::Building,
            EventState::Skipped
        ));
    }

    #[test]
    fn test_settle() {
        assert_eq!(EventStateMachine::settle(&[]), None);
        assert_eq!(
            EventStateMachine::settle(&[Done, Planned]).map(|s| s.0),
            Some(EventState::Building)
        );
        assert_eq!(
            EventStateMachine::settle(&[Done, Failed, Skipped]).map(|s| s.0),
            Some(EventState::CompleteFailed)
        );
        assert_eq!(
            EventStateMachine::settle(&[Done, Skipped]).map(|s| s.0),
            Some(EventState::Complete)
        );
    }
}
