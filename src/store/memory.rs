use super::{PlanCommit, RebuildStore, StoreError, StoreResult};
use crate::models::{ArtifactBuild, ArtifactType, NewTriggerEvent, TriggerEvent};
use crate::state_machine::{
    ArtifactBuildState, BuildStateMachine, EventState, EventStateMachine, TransitionOutcome,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    events: BTreeMap<i64, TriggerEvent>,
    event_ids_by_message: HashMap<String, i64>,
    /// Creation order
    builds: Vec<ArtifactBuild>,
    next_event_id: i64,
}

impl Inner {
    fn build_mut(&mut self, build_id: Uuid) -> StoreResult<&mut ArtifactBuild> {
        self.builds
            .iter_mut()
            .find(|b| b.id == build_id)
            .ok_or_else(|| StoreError::not_found("ArtifactBuild", build_id))
    }
}

/// Store kept in process memory, used by tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a unit outside of a planning pass, for seeding history
    pub fn insert_build(&self, build: ArtifactBuild) {
        self.inner.write().builds.push(build);
    }
}

#[async_trait]
impl RebuildStore for InMemoryStore {
    async fn get_or_create_event(&self, new: NewTriggerEvent) -> StoreResult<(TriggerEvent, bool)> {
        let mut inner = self.inner.write();
        if let Some(id) = inner.event_ids_by_message.get(&new.message_id).copied() {
            if let Some(existing) = inner.events.get(&id) {
                return Ok((existing.clone(), false));
            }
        }

        inner.next_event_id += 1;
        let id = inner.next_event_id;
        let event = TriggerEvent {
            id,
            message_id: new.message_id.clone(),
            kind: new.kind,
            search_key: new.search_key,
            state: EventState::Initialized,
            state_reason: None,
            depends_on: new.depends_on,
            requester: new.requester,
            requester_metadata: new.requester_metadata,
            dry_run: new.dry_run,
            created_at: Utc::now(),
        };
        inner.event_ids_by_message.insert(new.message_id, id);
        inner.events.insert(id, event.clone());
        debug!(event_id = id, message_id = %event.message_id, "Created trigger event");
        Ok((event, true))
    }

    async fn event(&self, event_id: i64) -> StoreResult<Option<TriggerEvent>> {
        Ok(self.inner.read().events.get(&event_id).cloned())
    }

    async fn event_by_message_id(&self, message_id: &str) -> StoreResult<Option<TriggerEvent>> {
        let inner = self.inner.read();
        Ok(inner
            .event_ids_by_message
            .get(message_id)
            .and_then(|id| inner.events.get(id))
            .cloned())
    }

    async fn update_event_state(
        &self,
        event_id: i64,
        state: EventState,
        reason: &str,
    ) -> StoreResult<TriggerEvent> {
        let mut inner = self.inner.write();
        let event = inner
            .events
            .get_mut(&event_id)
            .ok_or_else(|| StoreError::not_found("TriggerEvent", event_id))?;
        if EventStateMachine::transition(event.state, state, Some(reason))?
            == TransitionOutcome::Applied
        {
            event.state = state;
            event.state_reason = Some(reason.to_string());
        }
        Ok(event.clone())
    }

    async fn builds_for_event(&self, event_id: i64) -> StoreResult<Vec<ArtifactBuild>> {
        Ok(self
            .inner
            .read()
            .builds
            .iter()
            .filter(|b| b.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn build(&self, build_id: Uuid) -> StoreResult<Option<ArtifactBuild>> {
        Ok(self
            .inner
            .read()
            .builds
            .iter()
            .find(|b| b.id == build_id)
            .cloned())
    }

    async fn update_build_state(
        &self,
        build_id: Uuid,
        state: ArtifactBuildState,
        reason: &str,
    ) -> StoreResult<ArtifactBuild> {
        let mut inner = self.inner.write();
        let build = inner.build_mut(build_id)?;
        if BuildStateMachine::transition(build.state, state, Some(reason))?
            == TransitionOutcome::Applied
        {
            build.state = state;
            build.state_reason = Some(reason.to_string());
        }
        Ok(build.clone())
    }

    async fn set_build_id(&self, build_id: Uuid, task_id: i64) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.build_mut(build_id)?.build_id = Some(task_id);
        Ok(())
    }

    async fn build_by_rebuilt_nvr(&self, rebuilt_nvr: &str) -> StoreResult<Option<ArtifactBuild>> {
        Ok(self
            .inner
            .read()
            .builds
            .iter()
            .rev()
            .find(|b| {
                b.artifact_type == ArtifactType::Image
                    && b.rebuilt_nvr.as_deref() == Some(rebuilt_nvr)
            })
            .cloned())
    }

    async fn dependency_build_for(
        &self,
        event_id: i64,
        original_nvr: &str,
    ) -> StoreResult<Option<ArtifactBuild>> {
        let inner = self.inner.read();
        let mut visited = HashSet::new();
        let mut next = inner.events.get(&event_id).and_then(|e| e.depends_on);

        while let Some(dep_id) = next {
            if !visited.insert(dep_id) {
                break;
            }
            if let Some(found) = inner
                .builds
                .iter()
                .find(|b| b.event_id == dep_id && b.original_nvr == original_nvr)
            {
                return Ok(Some(found.clone()));
            }
            next = inner.events.get(&dep_id).and_then(|e| e.depends_on);
        }
        Ok(None)
    }

    async fn commit_plan(&self, plan: PlanCommit) -> StoreResult<()> {
        let mut inner = self.inner.write();

        // Validate everything before touching state
        let current = inner
            .events
            .get(&plan.event_id)
            .ok_or_else(|| StoreError::not_found("TriggerEvent", plan.event_id))?
            .state;
        let outcome =
            EventStateMachine::transition(current, plan.event_state, Some(&plan.event_reason))?;

        let mut seen: HashSet<&str> = inner
            .builds
            .iter()
            .filter(|b| b.event_id == plan.event_id)
            .map(|b| b.original_nvr.as_str())
            .collect();
        for build in &plan.builds {
            if build.event_id != plan.event_id {
                return Err(StoreError::Conflict(format!(
                    "build {} belongs to event {}, not {}",
                    build.id, build.event_id, plan.event_id
                )));
            }
            if !seen.insert(build.original_nvr.as_str()) {
                return Err(StoreError::Conflict(format!(
                    "{} already planned for event {}",
                    build.original_nvr, plan.event_id
                )));
            }
        }

        let count = plan.builds.len();
        inner.builds.extend(plan.builds);
        if outcome == TransitionOutcome::Applied {
            if let Some(event) = inner.events.get_mut(&plan.event_id) {
                event.state = plan.event_state;
                event.state_reason = Some(plan.event_reason);
            }
        }
        debug!(event_id = plan.event_id, builds = count, "Committed planning pass");
        Ok(())
    }
}
