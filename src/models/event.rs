//! # Trigger Event Model
//!
//! One upstream occurrence (advisory shipped, module ready, manual request).
//! Events are keyed by their external message id, carry the state of the whole
//! rebuild they triggered, and are never deleted.

use crate::state_machine::EventState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag identifying which pipeline handles an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKindTag {
    FlatpakModuleAdvisoryReady,
    BotasErrataShipped,
    ManualBundleRebuild,
}

impl fmt::Display for EventKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlatpakModuleAdvisoryReady => write!(f, "flatpak_module_advisory_ready"),
            Self::BotasErrataShipped => write!(f, "botas_errata_shipped"),
            Self::ManualBundleRebuild => write!(f, "manual_bundle_rebuild"),
        }
    }
}

impl std::str::FromStr for EventKindTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flatpak_module_advisory_ready" => Ok(Self::FlatpakModuleAdvisoryReady),
            "botas_errata_shipped" => Ok(Self::BotasErrataShipped),
            "manual_bundle_rebuild" => Ok(Self::ManualBundleRebuild),
            _ => Err(format!("Invalid event kind: {s}")),
        }
    }
}

/// Persisted trigger event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Store-assigned sequence id
    pub id: i64,
    /// Externally supplied, unique
    pub message_id: String,
    pub kind: EventKindTag,
    /// Advisory name or other human-facing search key
    pub search_key: String,
    pub state: EventState,
    pub state_reason: Option<String>,
    /// Earlier event this one builds on (manual re-runs)
    pub depends_on: Option<i64>,
    pub requester: Option<String>,
    pub requester_metadata: serde_json::Value,
    pub dry_run: bool,
    pub created_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Values needed to create a trigger event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTriggerEvent {
    pub message_id: String,
    pub kind: EventKindTag,
    pub search_key: String,
    pub depends_on: Option<i64>,
    pub requester: Option<String>,
    pub requester_metadata: serde_json::Value,
    pub dry_run: bool,
}

impl NewTriggerEvent {
    pub fn new(
        message_id: impl Into<String>,
        kind: EventKindTag,
        search_key: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            kind,
            search_key: search_key.into(),
            depends_on: None,
            requester: None,
            requester_metadata: serde_json::Value::Null,
            dry_run: false,
        }
    }

    pub fn with_depends_on(mut self, depends_on: Option<i64>) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn with_requester(
        mut self,
        requester: Option<String>,
        metadata: serde_json::Value,
    ) -> Self {
        self.requester = requester;
        self.requester_metadata = metadata;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
