mod common;

use common::*;
use freshmaker_core::constants::reasons::{ALL_BUILDS_DONE, DEPENDENCY_FAILED, SOME_BUILDS_FAILED};
use freshmaker_core::models::{ArtifactBuild, ArtifactType};
use freshmaker_core::orchestration::BuildLifecycle;
use freshmaker_core::state_machine::{ArtifactBuildState, EventState};
use freshmaker_core::store::{PlanCommit, RebuildStore};
use uuid::Uuid;

struct Forest {
    parent: Uuid,
    child: Uuid,
    grandchild: Uuid,
    sibling: Uuid,
}

/// parent <- child <- grandchild, plus an independent sibling
async fn plant_forest(harness: &Harness, event_id: i64) -> Forest {
    let parent = ArtifactBuild::planned(event_id, "parent", "parent-1-1", ArtifactType::Image);
    let mut child = ArtifactBuild::planned(event_id, "child", "child-1-1", ArtifactType::Image);
    child.dep_on = Some(parent.id);
    let mut grandchild =
        ArtifactBuild::planned(event_id, "grandchild", "grandchild-1-1", ArtifactType::Image);
    grandchild.dep_on = Some(child.id);
    let sibling = ArtifactBuild::planned(event_id, "sibling", "sibling-1-1", ArtifactType::Image);

    let forest = Forest {
        parent: parent.id,
        child: child.id,
        grandchild: grandchild.id,
        sibling: sibling.id,
    };
    harness
        .store
        .commit_plan(PlanCommit {
            event_id,
            builds: vec![parent, child, grandchild, sibling],
            event_state: EventState::Building,
            event_reason: "Waiting for rebuilds to finish".to_string(),
        })
        .await
        .unwrap();
    forest
}

async fn state_of(harness: &Harness, id: Uuid) -> ArtifactBuild {
    harness.store.build(id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_failure_cascades_to_planned_descendants() {
    let harness = Harness::new();
    let lifecycle = BuildLifecycle::new(harness.store());
    let event = harness.event("msg-1", None).await;
    let forest = plant_forest(&harness, event.id).await;

    let submitted = lifecycle.mark_submitted(forest.parent, 42).await.unwrap();
    assert_eq!(submitted.state, ArtifactBuildState::Building);
    assert_eq!(submitted.build_id, Some(42));

    let update = lifecycle
        .apply_build_update(forest.parent, ArtifactBuildState::Failed, "Build failed")
        .await
        .unwrap();
    assert_eq!(update.cascaded_failures, vec![forest.child, forest.grandchild]);
    assert_eq!(update.event_state, EventState::Building);

    for id in [forest.child, forest.grandchild] {
        let build = state_of(&harness, id).await;
        assert_eq!(build.state, ArtifactBuildState::Failed);
        assert_eq!(build.state_reason.as_deref(), Some(DEPENDENCY_FAILED));
    }
    assert_eq!(
        state_of(&harness, forest.sibling).await.state,
        ArtifactBuildState::Planned
    );

    lifecycle.mark_submitted(forest.sibling, 43).await.unwrap();
    let update = lifecycle
        .apply_build_update(forest.sibling, ArtifactBuildState::Done, "Build finished")
        .await
        .unwrap();
    assert_eq!(update.event_state, EventState::CompleteFailed);

    let event = harness.store.event(event.id).await.unwrap().unwrap();
    assert_eq!(event.state, EventState::CompleteFailed);
    assert_eq!(event.state_reason.as_deref(), Some(SOME_BUILDS_FAILED));
}

#[tokio::test]
async fn test_done_releases_children_and_completes_event() {
    let harness = Harness::new();
    let lifecycle = BuildLifecycle::new(harness.store());
    let event = harness.event("msg-1", None).await;
    let forest = plant_forest(&harness, event.id).await;

    lifecycle.mark_submitted(forest.parent, 1).await.unwrap();
    let update = lifecycle
        .apply_build_update(forest.parent, ArtifactBuildState::Done, "Build finished")
        .await
        .unwrap();
    let ready: Vec<Uuid> = update.ready.iter().map(|b| b.id).collect();
    assert_eq!(ready, vec![forest.child]);
    assert!(update.cascaded_failures.is_empty());

    for (id, task) in [(forest.child, 2), (forest.grandchild, 3), (forest.sibling, 4)] {
        lifecycle.mark_submitted(id, task).await.unwrap();
        lifecycle
            .apply_build_update(id, ArtifactBuildState::Done, "Build finished")
            .await
            .unwrap();
    }

    let event = harness.store.event(event.id).await.unwrap().unwrap();
    assert_eq!(event.state, EventState::Complete);
    assert_eq!(event.state_reason.as_deref(), Some(ALL_BUILDS_DONE));
}

#[tokio::test]
async fn test_terminal_event_is_not_reopened() {
    let harness = Harness::new();
    let lifecycle = BuildLifecycle::new(harness.store());
    let event = harness.event("msg-1", None).await;
    harness
        .store
        .update_event_state(event.id, EventState::Skipped, "Nothing to rebuild")
        .await
        .unwrap();

    let state = lifecycle.settle_event(event.id).await.unwrap();
    assert_eq!(state, EventState::Skipped);
}

#[tokio::test]
async fn test_illegal_build_transition_is_rejected() {
    let harness = Harness::new();
    let lifecycle = BuildLifecycle::new(harness.store());
    let event = harness.event("msg-1", None).await;
    let forest = plant_forest(&harness, event.id).await;

    let result = lifecycle
        .apply_build_update(forest.parent, ArtifactBuildState::Done, "Build finished")
        .await;
    assert!(result.is_err());
    assert_eq!(
        state_of(&harness, forest.parent).await.state,
        ArtifactBuildState::Planned
    );
}
