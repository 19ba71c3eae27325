//! # Rebuild Store
//!
//! Repository-style persistence for trigger events and rebuild units. Every
//! state write is validated against the state machines, so a store never
//! records an illegal transition.
//!
//! A planning pass is written through [`RebuildStore::commit_plan`], which
//! stores all units of the pass and the event's new state together or not at
//! all.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use crate::models::{ArtifactBuild, NewTriggerEvent, TriggerEvent};
use crate::state_machine::{ArtifactBuildState, EventState, StateMachineError};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rejected transition: {0}")]
    Transition(#[from] StateMachineError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything one planning pass writes
#[derive(Debug, Clone)]
pub struct PlanCommit {
    pub event_id: i64,
    pub builds: Vec<ArtifactBuild>,
    pub event_state: EventState,
    pub event_reason: String,
}

#[async_trait]
pub trait RebuildStore: Send + Sync {
    /// Look up the event by message id, creating it in INITIALIZED state when
    /// absent. The flag is true when the event was created by this call.
    async fn get_or_create_event(&self, new: NewTriggerEvent) -> StoreResult<(TriggerEvent, bool)>;

    async fn event(&self, event_id: i64) -> StoreResult<Option<TriggerEvent>>;

    async fn event_by_message_id(&self, message_id: &str) -> StoreResult<Option<TriggerEvent>>;

    /// Validated state write; re-applying the current state is a no-op
    async fn update_event_state(
        &self,
        event_id: i64,
        state: EventState,
        reason: &str,
    ) -> StoreResult<TriggerEvent>;

    /// Units of an event in creation order
    async fn builds_for_event(&self, event_id: i64) -> StoreResult<Vec<ArtifactBuild>>;

    async fn build(&self, build_id: Uuid) -> StoreResult<Option<ArtifactBuild>>;

    /// Validated state write; re-applying the current state is a no-op
    async fn update_build_state(
        &self,
        build_id: Uuid,
        state: ArtifactBuildState,
        reason: &str,
    ) -> StoreResult<ArtifactBuild>;

    /// Record the build system's task id for a submitted unit
    async fn set_build_id(&self, build_id: Uuid, task_id: i64) -> StoreResult<()>;

    /// Most recent image unit that rebuilt an artifact into `rebuilt_nvr`
    async fn build_by_rebuilt_nvr(&self, rebuilt_nvr: &str) -> StoreResult<Option<ArtifactBuild>>;

    /// Unit for `original_nvr` created by any event that `event_id` depends
    /// on, following the dependency chain
    async fn dependency_build_for(
        &self,
        event_id: i64,
        original_nvr: &str,
    ) -> StoreResult<Option<ArtifactBuild>>;

    /// Atomically store a pass's units and move the event to its new state
    async fn commit_plan(&self, plan: PlanCommit) -> StoreResult<()>;
}
