//! # Event Handlers
//!
//! Incoming events form a closed set of kinds. The [`HandlerRegistry`] maps
//! each kind to the pipeline that handles it, built once at startup, and
//! [`HandlerRegistry::dispatch`] is the single entry point for events.
//!
//! Dispatch creates the trigger event (or finds it by message id) before
//! the handler runs, so a replayed message never plans twice.

pub mod allowlist;
pub mod bundle_advisory;
pub mod flatpak_module;

pub use allowlist::is_allowed;
pub use bundle_advisory::BundleAdvisoryHandler;
pub use flatpak_module::FlatpakModuleHandler;

use crate::config::FreshmakerConfig;
use crate::error::{FreshmakerError, FreshmakerResult};
use crate::logging::LogContext;
use crate::models::{ErrataAdvisory, EventKindTag, NewTriggerEvent, TriggerEvent};
use crate::orchestration::BuildLifecycle;
use crate::planner::BuildPlanner;
use crate::services::BuildDispatcher;
use crate::state_machine::{ArtifactBuildState, EventState};
use crate::store::RebuildStore;
use crate::versioning::Clock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// How a manual bundle rebuild selects its bundles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualRebuildMode {
    /// Re-run advisory resolution, optionally restricted to some bundles
    ManualRebuild,
    /// Rebuild exactly the requested bundle images
    ReleaseDriver,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    FlatpakModuleAdvisoryReady {
        advisory: ErrataAdvisory,
    },
    BotasErrataShipped {
        advisory: ErrataAdvisory,
    },
    ManualBundleRebuild {
        advisory: Option<ErrataAdvisory>,
        #[serde(default)]
        container_images: Vec<String>,
        #[serde(default)]
        bundle_images: Vec<String>,
        requester: Option<String>,
        #[serde(default)]
        requester_metadata: serde_json::Value,
        mode: ManualRebuildMode,
    },
}

impl EventKind {
    pub fn tag(&self) -> EventKindTag {
        match self {
            Self::FlatpakModuleAdvisoryReady { .. } => EventKindTag::FlatpakModuleAdvisoryReady,
            Self::BotasErrataShipped { .. } => EventKindTag::BotasErrataShipped,
            Self::ManualBundleRebuild { .. } => EventKindTag::ManualBundleRebuild,
        }
    }

    pub fn advisory(&self) -> Option<&ErrataAdvisory> {
        match self {
            Self::FlatpakModuleAdvisoryReady { advisory } | Self::BotasErrataShipped { advisory } => {
                Some(advisory)
            }
            Self::ManualBundleRebuild { advisory, .. } => advisory.as_ref(),
        }
    }

    /// Key events are searched by: the advisory id, or the message id for
    /// requests without an advisory
    pub fn search_key(&self, message_id: &str) -> String {
        self.advisory()
            .map(|a| a.errata_id.to_string())
            .unwrap_or_else(|| message_id.to_string())
    }
}

/// Event as received from the message bus or the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub message_id: String,
    pub kind: EventKind,
    /// Message id of an earlier event whose rebuilds this one builds on
    pub depends_on_message_id: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

impl IncomingEvent {
    pub fn new(message_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            message_id: message_id.into(),
            kind,
            depends_on_message_id: None,
            dry_run: false,
        }
    }

    pub fn with_dependency(mut self, message_id: impl Into<String>) -> Self {
        self.depends_on_message_id = Some(message_id.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub event_id: i64,
    pub state: EventState,
    pub reason: Option<String>,
    /// Units handed to the build system
    pub submitted: Vec<Uuid>,
}

impl HandlerOutcome {
    fn from_event(event: &TriggerEvent) -> Self {
        Self {
            event_id: event.id,
            state: event.state,
            reason: event.state_reason.clone(),
            submitted: Vec::new(),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handles(&self) -> &'static [EventKindTag];

    /// Resolve, plan and submit rebuilds for a freshly created event
    async fn handle(&self, event: &TriggerEvent, incoming: &IncomingEvent) -> FreshmakerResult<HandlerOutcome>;
}

/// Services shared by all handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub config: Arc<FreshmakerConfig>,
    pub store: Arc<dyn RebuildStore>,
    pub planner: Arc<BuildPlanner>,
    pub lifecycle: BuildLifecycle,
    pub dispatcher: Arc<dyn BuildDispatcher>,
    pub clock: Arc<dyn Clock>,
}

impl HandlerContext {
    pub fn is_dry_run(&self, event: &TriggerEvent) -> bool {
        self.config.dry_run || event.dry_run
    }

    /// Skip the event with a policy or resolution reason
    pub async fn skip(&self, event: &TriggerEvent, reason: &str) -> FreshmakerResult<HandlerOutcome> {
        info!(event_id = event.id, reason = %reason, "Skipping event");
        let skipped = self
            .store
            .update_event_state(event.id, EventState::Skipped, reason)
            .await?;
        Ok(HandlerOutcome::from_event(&skipped))
    }

    /// Hand every ready unit of the event to the build system. A failed
    /// submission fails that unit only.
    pub async fn submit_ready(&self, event: &TriggerEvent) -> FreshmakerResult<Vec<Uuid>> {
        let ready = self.planner.ready_units(event.id).await?;
        if self.is_dry_run(event) {
            info!(event_id = event.id, units = ready.len(), "Dry run, not submitting rebuilds");
            return Ok(Vec::new());
        }

        let mut submitted = Vec::new();
        for build in ready {
            match self.dispatcher.dispatch(&build).await {
                Ok(task_id) => {
                    self.lifecycle.mark_submitted(build.id, task_id).await?;
                    submitted.push(build.id);
                }
                Err(e) => {
                    warn!(original_nvr = %build.original_nvr, error = %e, "Build submission failed");
                    let reason = format!("Build submission failed: {e}");
                    self.lifecycle
                        .apply_build_update(build.id, ArtifactBuildState::Failed, &reason)
                        .await?;
                }
            }
        }
        Ok(submitted)
    }

    /// Outcome after a committed pass, submitting ready units when building
    pub async fn finish(&self, event: &TriggerEvent, state: EventState) -> FreshmakerResult<HandlerOutcome> {
        let submitted = if state == EventState::Building {
            self.submit_ready(event).await?
        } else {
            Vec::new()
        };
        let current = self
            .store
            .event(event.id)
            .await?
            .unwrap_or_else(|| event.clone());
        Ok(HandlerOutcome {
            submitted,
            ..HandlerOutcome::from_event(&current)
        })
    }
}

/// Lookup table from event kind to handler
#[derive(Clone)]
pub struct HandlerRegistry {
    store: Arc<dyn RebuildStore>,
    handlers: HashMap<EventKindTag, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new(store: Arc<dyn RebuildStore>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for every kind it handles; a kind may only have
    /// one handler
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) -> FreshmakerResult<()> {
        for tag in handler.handles() {
            if let Some(existing) = self.handlers.get(tag) {
                return Err(FreshmakerError::InvalidInput(format!(
                    "{tag} is already handled by {}",
                    existing.name()
                )));
            }
        }
        for tag in handler.handles() {
            self.handlers.insert(*tag, Arc::clone(&handler));
        }
        info!(handler = handler.name(), "Event handler registered");
        Ok(())
    }

    pub fn handler_for(&self, tag: EventKindTag) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(&tag)
    }

    /// Create or look up the trigger event and run its handler.
    ///
    /// An event that already left INITIALIZED was handled before; its
    /// current state is returned without running the handler again.
    pub async fn dispatch(&self, incoming: &IncomingEvent) -> FreshmakerResult<HandlerOutcome> {
        let tag = incoming.kind.tag();
        let handler = self.handler_for(tag).ok_or_else(|| {
            FreshmakerError::InvalidInput(format!("No handler registered for {tag} events"))
        })?;

        let depends_on = match &incoming.depends_on_message_id {
            Some(message_id) => {
                let dependency = self.store.event_by_message_id(message_id).await?;
                if dependency.is_none() {
                    warn!(message_id = %message_id, "Dependency event not found");
                }
                dependency.map(|e| e.id)
            }
            None => None,
        };

        let (requester, requester_metadata) = match &incoming.kind {
            EventKind::ManualBundleRebuild {
                requester,
                requester_metadata,
                ..
            } => (requester.clone(), requester_metadata.clone()),
            _ => (None, serde_json::Value::Null),
        };
        let new = NewTriggerEvent::new(
            &incoming.message_id,
            tag,
            incoming.kind.search_key(&incoming.message_id),
        )
        .with_depends_on(depends_on)
        .with_requester(requester, requester_metadata)
        .with_dry_run(incoming.dry_run);

        let (event, created) = self.store.get_or_create_event(new).await?;
        let ctx = LogContext::for_event(event.id, &event.message_id);

        if !created && event.state != EventState::Initialized {
            info!(
                event_id = event.id,
                state = %event.state,
                "Event already handled, ignoring replay"
            );
            return Ok(HandlerOutcome::from_event(&event));
        }

        handler.handle(&event, incoming).instrument(ctx.span()).await
    }
}
