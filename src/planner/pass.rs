use crate::models::ArtifactBuild;
use crate::state_machine::{ArtifactBuildState, EventState, EventStateMachine};
use crate::store::PlanCommit;

/// Units produced by one planning pass, not yet persisted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannedPass {
    pub event_id: i64,
    pub builds: Vec<ArtifactBuild>,
}

impl PlannedPass {
    pub fn new(event_id: i64) -> Self {
        Self {
            event_id,
            builds: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn contains(&self, original_nvr: &str) -> bool {
        self.builds.iter().any(|b| b.original_nvr == original_nvr)
    }

    pub fn find(&self, original_nvr: &str) -> Option<&ArtifactBuild> {
        self.builds.iter().find(|b| b.original_nvr == original_nvr)
    }

    /// Units ready for hand-off: PLANNED with no parent unit in this pass
    pub fn ready(&self) -> impl Iterator<Item = &ArtifactBuild> {
        self.builds
            .iter()
            .filter(|b| b.state == ArtifactBuildState::Planned && b.dep_on.is_none())
    }

    /// Event state implied by the pass; an empty pass skips the event
    pub fn event_outcome(&self, empty_reason: &str) -> (EventState, String) {
        let states: Vec<ArtifactBuildState> = self.builds.iter().map(|b| b.state).collect();
        match EventStateMachine::settle(&states) {
            Some((state, reason)) => (state, reason.to_string()),
            None => (EventState::Skipped, empty_reason.to_string()),
        }
    }

    pub fn into_commit(self, empty_reason: &str) -> PlanCommit {
        let (event_state, event_reason) = self.event_outcome(empty_reason);
        PlanCommit {
            event_id: self.event_id,
            builds: self.builds,
            event_state,
            event_reason,
        }
    }
}
