//! # Build Lifecycle
//!
//! Applies build progress reported by the build system to rebuild units and
//! keeps the owning event's state in step with its units.
//!
//! A FAILED unit fails every PLANNED descendant with the dependency-failure
//! reason. A DONE unit releases its PLANNED children, which are returned so
//! the caller can hand them off.

use crate::constants::reasons;
use crate::error::FreshmakerResult;
use crate::models::ArtifactBuild;
use crate::state_machine::{ArtifactBuildState, EventState, EventStateMachine, StateMachineError};
use crate::store::RebuildStore;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Outcome of applying one build update
#[derive(Debug, Clone, PartialEq)]
pub struct BuildUpdate {
    pub build: ArtifactBuild,
    /// Descendants failed because this unit failed
    pub cascaded_failures: Vec<Uuid>,
    /// Children whose parent is now DONE and that are ready to build
    pub ready: Vec<ArtifactBuild>,
    pub event_state: EventState,
}

#[derive(Clone)]
pub struct BuildLifecycle {
    store: Arc<dyn RebuildStore>,
}

impl std::fmt::Debug for BuildLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildLifecycle").finish_non_exhaustive()
    }
}

impl BuildLifecycle {
    pub fn new(store: Arc<dyn RebuildStore>) -> Self {
        Self { store }
    }

    /// Record that a unit was submitted to the build system
    #[instrument(skip(self))]
    pub async fn mark_submitted(&self, build_id: Uuid, task_id: i64) -> FreshmakerResult<ArtifactBuild> {
        let reason = format!("Build submitted as task {task_id}");
        let build = self
            .store
            .update_build_state(build_id, ArtifactBuildState::Building, &reason)
            .await?;
        self.store.set_build_id(build_id, task_id).await?;
        self.settle_event(build.event_id).await?;
        Ok(ArtifactBuild {
            build_id: Some(task_id),
            ..build
        })
    }

    /// Transition a unit and propagate the consequences
    #[instrument(skip(self, reason), fields(state = %state))]
    pub async fn apply_build_update(
        &self,
        build_id: Uuid,
        state: ArtifactBuildState,
        reason: &str,
    ) -> FreshmakerResult<BuildUpdate> {
        let build = self.store.update_build_state(build_id, state, reason).await?;
        let event_id = build.event_id;

        let mut cascaded_failures = Vec::new();
        let mut ready = Vec::new();
        match state {
            ArtifactBuildState::Failed => {
                cascaded_failures = self.fail_descendants(event_id, build_id).await?;
            }
            ArtifactBuildState::Done => {
                ready = self
                    .store
                    .builds_for_event(event_id)
                    .await?
                    .into_iter()
                    .filter(|b| b.dep_on == Some(build_id) && b.state == ArtifactBuildState::Planned)
                    .collect();
                debug!(ready = ready.len(), "Children released by finished build");
            }
            _ => {}
        }

        let event_state = self.settle_event(event_id).await?;
        info!(
            event_id,
            original_nvr = %build.original_nvr,
            cascaded = cascaded_failures.len(),
            event_state = %event_state,
            "Build update applied"
        );

        Ok(BuildUpdate {
            build,
            cascaded_failures,
            ready,
            event_state,
        })
    }

    async fn fail_descendants(&self, event_id: i64, root: Uuid) -> FreshmakerResult<Vec<Uuid>> {
        let builds = self.store.builds_for_event(event_id).await?;
        let mut failed = Vec::new();
        let mut queue = VecDeque::from([root]);

        while let Some(parent) = queue.pop_front() {
            for child in builds.iter().filter(|b| b.dep_on == Some(parent)) {
                queue.push_back(child.id);
                if child.state != ArtifactBuildState::Planned {
                    continue;
                }
                self.store
                    .update_build_state(child.id, ArtifactBuildState::Failed, reasons::DEPENDENCY_FAILED)
                    .await?;
                failed.push(child.id);
            }
        }

        if !failed.is_empty() {
            warn!(count = failed.len(), "Dependent rebuilds failed with their parent");
        }
        Ok(failed)
    }

    /// Move the event to the state implied by its units. Terminal events
    /// are left untouched.
    pub async fn settle_event(&self, event_id: i64) -> FreshmakerResult<EventState> {
        let event = self
            .store
            .event(event_id)
            .await?
            .ok_or_else(|| StateMachineError::not_found("event", event_id))?;
        if event.is_terminal() {
            return Ok(event.state);
        }

        let states: Vec<ArtifactBuildState> = self
            .store
            .builds_for_event(event_id)
            .await?
            .iter()
            .map(|b| b.state)
            .collect();
        let Some((state, reason)) = EventStateMachine::settle(&states) else {
            return Ok(event.state);
        };
        if state == event.state {
            return Ok(state);
        }

        let updated = self.store.update_event_state(event_id, state, reason).await?;
        Ok(updated.state)
    }
}
