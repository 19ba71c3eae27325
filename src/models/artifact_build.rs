//! # Rebuild Unit Model
//!
//! One artifact slated for rebuild within a trigger event. Units form a forest
//! through `dep_on`, carry the payload handed to the build system, and stay in
//! the store as the record of what each original was rebuilt into.

use super::types::{ArtifactType, RebuildReason};
use crate::state_machine::ArtifactBuildState;
use crate::versioning::bundle::CsvUpdate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One image reference substitution inside a bundle manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullspecReplacement {
    /// Reference the manifest should point at after the rebuild
    pub new: String,
    /// Reference as written in the manifest source
    pub original: String,
    pub pinned: bool,
    /// Value of `new` before it was rewritten to the rebuilt digest
    #[serde(rename = "_old", default, skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
}

/// Manifest modifications served to the build system for a bundle rebuild
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleOverrides {
    pub pullspec_replacements: Vec<PullspecReplacement>,
    pub update: CsvUpdate,
}

/// Build instructions handed to the build system unmodified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArgs {
    pub repository: Option<String>,
    pub commit: Option<String>,
    pub target: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub arches: Vec<String>,
    /// Parent image NVR to build on top of, when the parent was rebuilt elsewhere
    pub original_parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_csv_modifications_url: Option<String>,
    #[serde(default)]
    pub flatpak: bool,
    #[serde(default)]
    pub isolated: bool,
}

/// Persisted rebuild unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBuild {
    pub id: Uuid,
    pub event_id: i64,
    pub name: String,
    pub original_nvr: String,
    pub rebuilt_nvr: Option<String>,
    pub artifact_type: ArtifactType,
    pub state: ArtifactBuildState,
    pub state_reason: Option<String>,
    /// Parent unit within the same event
    pub dep_on: Option<Uuid>,
    pub rebuild_reason: RebuildReason,
    pub build_args: Option<BuildArgs>,
    pub bundle_pullspec_overrides: Option<BundleOverrides>,
    /// Build system task id, once submitted
    pub build_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl ArtifactBuild {
    /// Fresh unit in PLANNED state with a pre-generated id
    pub fn planned(
        event_id: i64,
        name: impl Into<String>,
        original_nvr: impl Into<String>,
        artifact_type: ArtifactType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            name: name.into(),
            original_nvr: original_nvr.into(),
            rebuilt_nvr: None,
            artifact_type,
            state: ArtifactBuildState::Planned,
            state_reason: None,
            dep_on: None,
            rebuild_reason: RebuildReason::Directly,
            build_args: None,
            bundle_pullspec_overrides: None,
            build_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_state(mut self, state: ArtifactBuildState, reason: impl Into<String>) -> Self {
        self.state = state;
        self.state_reason = Some(reason.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pullspec_replacement_serializes_old_with_underscore() {
        let replacement = PullspecReplacement {
            new: "registry/repo/operator@sha256:456".to_string(),
            original: "registry/repo/operator:v2.2.0".to_string(),
            pinned: true,
            old: Some("registry/repo/operator@sha256:123".to_string()),
        };
        let value = serde_json::to_value(&replacement).unwrap();
        assert_eq!(value["_old"], "registry/repo/operator@sha256:123");

        let without_old = PullspecReplacement {
            old: None,
            ..replacement
        };
        let value = serde_json::to_value(&without_old).unwrap();
        assert!(value.get("_old").is_none());
    }

    #[test]
    fn test_planned_unit_defaults() {
        let build = ArtifactBuild::planned(7, "foo", "foo-1-1", ArtifactType::Image);
        assert_eq!(build.state, ArtifactBuildState::Planned);
        assert_eq!(build.event_id, 7);
        assert!(build.dep_on.is_none());
        assert!(!build.is_terminal());
    }
}
