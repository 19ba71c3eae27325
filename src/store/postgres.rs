//! PostgreSQL-backed store. Queries are checked at runtime so the crate builds
//! without a live database.

use super::{PlanCommit, RebuildStore, StoreError, StoreResult};
use crate::models::{
    ArtifactBuild, BuildArgs, BundleOverrides, NewTriggerEvent, TriggerEvent,
};
use crate::state_machine::{
    ArtifactBuildState, BuildStateMachine, EventState, EventStateMachine, TransitionOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

const EVENT_COLUMNS: &str = "id, message_id, kind, search_key, state, state_reason, depends_on, \
     requester, requester_metadata, dry_run, created_at";

const BUILD_COLUMNS: &str = "id, event_id, name, original_nvr, rebuilt_nvr, artifact_type, state, \
     state_reason, dep_on, rebuild_reason, build_args, bundle_pullspec_overrides, build_id, created_at";

#[derive(Debug, FromRow)]
struct EventRow {
    id: i64,
    message_id: String,
    kind: String,
    search_key: String,
    state: String,
    state_reason: Option<String>,
    depends_on: Option<i64>,
    requester: Option<String>,
    requester_metadata: serde_json::Value,
    dry_run: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for TriggerEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(TriggerEvent {
            id: row.id,
            message_id: row.message_id,
            kind: row.kind.parse().map_err(StoreError::Corrupt)?,
            search_key: row.search_key,
            state: row.state.parse().map_err(StoreError::Corrupt)?,
            state_reason: row.state_reason,
            depends_on: row.depends_on,
            requester: row.requester,
            requester_metadata: row.requester_metadata,
            dry_run: row.dry_run,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BuildRow {
    id: Uuid,
    event_id: i64,
    name: String,
    original_nvr: String,
    rebuilt_nvr: Option<String>,
    artifact_type: String,
    state: String,
    state_reason: Option<String>,
    dep_on: Option<Uuid>,
    rebuild_reason: String,
    build_args: Option<Json<BuildArgs>>,
    bundle_pullspec_overrides: Option<Json<BundleOverrides>>,
    build_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BuildRow> for ArtifactBuild {
    type Error = StoreError;

    fn try_from(row: BuildRow) -> Result<Self, Self::Error> {
        Ok(ArtifactBuild {
            id: row.id,
            event_id: row.event_id,
            name: row.name,
            original_nvr: row.original_nvr,
            rebuilt_nvr: row.rebuilt_nvr,
            artifact_type: row.artifact_type.parse().map_err(StoreError::Corrupt)?,
            state: row.state.parse().map_err(StoreError::Corrupt)?,
            state_reason: row.state_reason,
            dep_on: row.dep_on,
            rebuild_reason: row.rebuild_reason.parse().map_err(StoreError::Corrupt)?,
            build_args: row.build_args.map(|j| j.0),
            bundle_pullspec_overrides: row.bundle_pullspec_overrides.map(|j| j.0),
            build_id: row.build_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))
    }

    async fn lock_event_state(
        tx: &mut Transaction<'_, Postgres>,
        event_id: i64,
    ) -> StoreResult<EventState> {
        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM freshmaker_events WHERE id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_optional(&mut **tx)
                .await?;
        state
            .ok_or_else(|| StoreError::not_found("TriggerEvent", event_id))?
            .parse()
            .map_err(StoreError::Corrupt)
    }

    async fn fetch_event(&self, event_id: i64) -> StoreResult<Option<TriggerEvent>> {
        let row: Option<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM freshmaker_events WHERE id = $1"
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TriggerEvent::try_from).transpose()
    }

    async fn insert_build(
        tx: &mut Transaction<'_, Postgres>,
        build: &ArtifactBuild,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO freshmaker_artifact_builds
            (id, event_id, name, original_nvr, rebuilt_nvr, artifact_type, state, state_reason,
             dep_on, rebuild_reason, build_args, bundle_pullspec_overrides, build_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(build.id)
        .bind(build.event_id)
        .bind(&build.name)
        .bind(&build.original_nvr)
        .bind(&build.rebuilt_nvr)
        .bind(build.artifact_type.to_string())
        .bind(build.state.to_string())
        .bind(&build.state_reason)
        .bind(build.dep_on)
        .bind(build.rebuild_reason.to_string())
        .bind(build.build_args.as_ref().map(Json))
        .bind(build.bundle_pullspec_overrides.as_ref().map(Json))
        .bind(build.build_id)
        .bind(build.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict(
                format!("{} already planned for event {}", build.original_nvr, build.event_id),
            ),
            other => StoreError::Database(other),
        })?;
        Ok(())
    }
}

#[async_trait]
impl RebuildStore for PgStore {
    #[instrument(skip(self, new), fields(message_id = %new.message_id))]
    async fn get_or_create_event(&self, new: NewTriggerEvent) -> StoreResult<(TriggerEvent, bool)> {
        let inserted: Option<EventRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO freshmaker_events
            (message_id, kind, search_key, state, depends_on, requester, requester_metadata, dry_run)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (message_id) DO NOTHING
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(&new.message_id)
        .bind(new.kind.to_string())
        .bind(&new.search_key)
        .bind(EventState::Initialized.to_string())
        .bind(new.depends_on)
        .bind(&new.requester)
        .bind(&new.requester_metadata)
        .bind(new.dry_run)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            debug!(event_id = row.id, "Created trigger event");
            return Ok((row.try_into()?, true));
        }

        let existing = self
            .event_by_message_id(&new.message_id)
            .await?
            .ok_or_else(|| StoreError::not_found("TriggerEvent", &new.message_id))?;
        Ok((existing, false))
    }

    async fn event(&self, event_id: i64) -> StoreResult<Option<TriggerEvent>> {
        self.fetch_event(event_id).await
    }

    async fn event_by_message_id(&self, message_id: &str) -> StoreResult<Option<TriggerEvent>> {
        let row: Option<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM freshmaker_events WHERE message_id = $1"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TriggerEvent::try_from).transpose()
    }

    async fn update_event_state(
        &self,
        event_id: i64,
        state: EventState,
        reason: &str,
    ) -> StoreResult<TriggerEvent> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_event_state(&mut tx, event_id).await?;
        if EventStateMachine::transition(current, state, Some(reason))? == TransitionOutcome::Applied
        {
            sqlx::query("UPDATE freshmaker_events SET state = $2, state_reason = $3 WHERE id = $1")
                .bind(event_id)
                .bind(state.to_string())
                .bind(reason)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.fetch_event(event_id)
            .await?
            .ok_or_else(|| StoreError::not_found("TriggerEvent", event_id))
    }

    async fn builds_for_event(&self, event_id: i64) -> StoreResult<Vec<ArtifactBuild>> {
        let rows: Vec<BuildRow> = sqlx::query_as(&format!(
            "SELECT {BUILD_COLUMNS} FROM freshmaker_artifact_builds WHERE event_id = $1 ORDER BY seq"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ArtifactBuild::try_from).collect()
    }

    async fn build(&self, build_id: Uuid) -> StoreResult<Option<ArtifactBuild>> {
        let row: Option<BuildRow> = sqlx::query_as(&format!(
            "SELECT {BUILD_COLUMNS} FROM freshmaker_artifact_builds WHERE id = $1"
        ))
        .bind(build_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ArtifactBuild::try_from).transpose()
    }

    async fn update_build_state(
        &self,
        build_id: Uuid,
        state: ArtifactBuildState,
        reason: &str,
    ) -> StoreResult<ArtifactBuild> {
        let mut tx = self.pool.begin().await?;
        let current: Option<String> = sqlx::query_scalar(
            "SELECT state FROM freshmaker_artifact_builds WHERE id = $1 FOR UPDATE",
        )
        .bind(build_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current: ArtifactBuildState = current
            .ok_or_else(|| StoreError::not_found("ArtifactBuild", build_id))?
            .parse()
            .map_err(StoreError::Corrupt)?;

        if BuildStateMachine::transition(current, state, Some(reason))?
            == TransitionOutcome::Applied
        {
            sqlx::query(
                "UPDATE freshmaker_artifact_builds SET state = $2, state_reason = $3 WHERE id = $1",
            )
            .bind(build_id)
            .bind(state.to_string())
            .bind(reason)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.build(build_id)
            .await?
            .ok_or_else(|| StoreError::not_found("ArtifactBuild", build_id))
    }

    async fn set_build_id(&self, build_id: Uuid, task_id: i64) -> StoreResult<()> {
        let result = sqlx::query("UPDATE freshmaker_artifact_builds SET build_id = $2 WHERE id = $1")
            .bind(build_id)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("ArtifactBuild", build_id));
        }
        Ok(())
    }

    async fn build_by_rebuilt_nvr(&self, rebuilt_nvr: &str) -> StoreResult<Option<ArtifactBuild>> {
        let row: Option<BuildRow> = sqlx::query_as(&format!(
            "SELECT {BUILD_COLUMNS} FROM freshmaker_artifact_builds \
             WHERE rebuilt_nvr = $1 AND artifact_type = 'image' ORDER BY seq DESC LIMIT 1"
        ))
        .bind(rebuilt_nvr)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ArtifactBuild::try_from).transpose()
    }

    async fn dependency_build_for(
        &self,
        event_id: i64,
        original_nvr: &str,
    ) -> StoreResult<Option<ArtifactBuild>> {
        let columns = BUILD_COLUMNS
            .split(", ")
            .map(|c| format!("b.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let row: Option<BuildRow> = sqlx::query_as(&format!(
            r#"
            WITH RECURSIVE deps(id) AS (
                SELECT depends_on FROM freshmaker_events
                WHERE id = $1 AND depends_on IS NOT NULL
                UNION
                SELECT e.depends_on FROM freshmaker_events e
                JOIN deps d ON e.id = d.id
                WHERE e.depends_on IS NOT NULL
            )
            SELECT {columns}
            FROM freshmaker_artifact_builds b
            JOIN deps d ON b.event_id = d.id
            WHERE b.original_nvr = $2
            ORDER BY b.event_id DESC, b.seq
            LIMIT 1
            "#
        ))
        .bind(event_id)
        .bind(original_nvr)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ArtifactBuild::try_from).transpose()
    }

    #[instrument(skip(self, plan), fields(event_id = plan.event_id, builds = plan.builds.len()))]
    async fn commit_plan(&self, plan: PlanCommit) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let current = Self::lock_event_state(&mut tx, plan.event_id).await?;
        let outcome =
            EventStateMachine::transition(current, plan.event_state, Some(&plan.event_reason))?;

        for build in &plan.builds {
            if build.event_id != plan.event_id {
                return Err(StoreError::Conflict(format!(
                    "build {} belongs to event {}, not {}",
                    build.id, build.event_id, plan.event_id
                )));
            }
            Self::insert_build(&mut tx, build).await?;
        }

        if outcome == TransitionOutcome::Applied {
            sqlx::query("UPDATE freshmaker_events SET state = $2, state_reason = $3 WHERE id = $1")
                .bind(plan.event_id)
                .bind(plan.event_state.to_string())
                .bind(&plan.event_reason)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Committed planning pass");
        Ok(())
    }
}
