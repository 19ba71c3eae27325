//! # Collaborator Services
//!
//! Contracts of the systems the engine consumes but does not implement: the
//! advisory tracker, the build system, the image metadata source and the
//! build dispatcher. Only the content index has an HTTP implementation here;
//! the others are wired in by the embedding process.

pub mod content_index;

pub use content_index::{ContentIndex, ContentIndexClient};

use crate::error::FreshmakerResult;
use crate::models::{ArtifactBuild, ContainerImage, PullspecReplacement};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Advisory metadata lookups
#[async_trait]
pub trait AdvisoryService: Send + Sync {
    /// RPM NVRs fixed by the advisory
    async fn affected_rpm_nvrs(&self, errata_id: i64) -> FreshmakerResult<Vec<String>>;

    /// Module build NVRs attached to the advisory
    async fn affected_module_nvrs(&self, errata_id: i64) -> FreshmakerResult<Vec<String>>;

    /// Builds attached to advisories that block this one
    async fn blocking_advisories_builds(&self, errata_id: i64) -> FreshmakerResult<HashSet<String>>;
}

/// Source metadata and operator manifest data of one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub nvr: String,
    pub repository: Option<String>,
    pub commit: Option<String>,
    pub target: Option<String>,
    pub git_branch: Option<String>,
    #[serde(default)]
    pub arches: Vec<String>,
    /// Pullspecs of the operator manifest's related images
    #[serde(default)]
    pub related_image_pullspecs: Vec<PullspecReplacement>,
    /// Related images were pinned to digests by the build system
    #[serde(default)]
    pub created_by_osbs: bool,
}

/// Module name and stream a module build belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStream {
    pub name: String,
    pub stream: String,
}

#[async_trait]
pub trait BuildSystem: Send + Sync {
    /// `None` when the build system has no record of `nvr`
    async fn build(&self, nvr: &str) -> FreshmakerResult<Option<BuildInfo>>;

    async fn module_stream(&self, module_nvr: &str) -> FreshmakerResult<Option<ModuleStream>>;
}

/// Full build metadata for images selected by NVR
#[async_trait]
pub trait ImageMetadataSource: Send + Sync {
    /// Images in dependency order, parents before children
    async fn images_by_nvrs(&self, nvrs: &[String]) -> FreshmakerResult<Vec<ContainerImage>>;
}

/// Hands a planned unit to the build system
#[async_trait]
pub trait BuildDispatcher: Send + Sync {
    /// Submit the unit's payload unmodified and return the build task id
    async fn dispatch(&self, build: &ArtifactBuild) -> FreshmakerResult<i64>;
}
