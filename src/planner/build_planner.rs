//! # Build Planner
//!
//! Turns resolved candidates into rebuild units wired into a dependency
//! forest. A pass reads the clock once (the caller passes the
//! [`RebuildStamp`]) and keeps every unit in memory until
//! [`BuildPlanner::commit`] writes the whole pass in one store call.
//!
//! Per-candidate problems (a resolution error, a failed parent, a build
//! system lookup failure) become FAILED units. Store errors abort the pass.

use super::pass::PlannedPass;
use crate::config::ConfigurationError;
use crate::constants::reasons;
use crate::error::FreshmakerResult;
use crate::logging::LogContext;
use crate::models::{
    ArtifactBuild, ArtifactType, BuildArgs, BundleOverrides, ContainerImage, RebuildReason,
    TriggerEvent,
};
use crate::resolver::BundleToRebuild;
use crate::services::{BuildInfo, BuildSystem};
use crate::state_machine::{ArtifactBuildState, EventState};
use crate::store::RebuildStore;
use crate::utils::render_pullspec_override_url;
use crate::versioning::{rebuilt_nvr, Nvr, RebuildStamp};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};
use url::Url;
use uuid::Uuid;

pub struct BuildPlanner {
    store: Arc<dyn RebuildStore>,
    build_system: Arc<dyn BuildSystem>,
    release_suffix: String,
    api_base_url: String,
}

impl BuildPlanner {
    /// Both the release suffix and the API base URL are required; the URL
    /// must parse since every bundle unit renders its override URL from it.
    pub fn new(
        store: Arc<dyn RebuildStore>,
        build_system: Arc<dyn BuildSystem>,
        release_suffix: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> FreshmakerResult<Self> {
        let release_suffix = release_suffix.into();
        let api_base_url = api_base_url.into();
        if release_suffix.is_empty() {
            return Err(
                ConfigurationError::missing_required_field("rebuilt_nvr_release_suffix", "rebuild")
                    .into(),
            );
        }
        if api_base_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("base_url", "api").into());
        }
        Url::parse(&api_base_url).map_err(|e| {
            ConfigurationError::invalid_value("api.base_url", &api_base_url, e.to_string())
        })?;
        Ok(Self {
            store,
            build_system,
            release_suffix,
            api_base_url,
        })
    }

    fn unit_name(nvr: &str, fallback: &str) -> String {
        match Nvr::parse(nvr) {
            Ok(parsed) => parsed.name,
            Err(_) => fallback.to_string(),
        }
    }

    /// Plan image rebuilds, in candidate order.
    ///
    /// Candidates are expected parents first, so a parent's unit exists when
    /// its children are planned.
    pub async fn plan_images(
        &self,
        event: &TriggerEvent,
        candidates: &[ContainerImage],
        stamp: RebuildStamp,
        ctx: &LogContext,
    ) -> FreshmakerResult<PlannedPass> {
        async {
            let mut pass = PlannedPass::new(event.id);
            let mut by_nvr: HashMap<String, usize> = HashMap::new();

            for image in candidates {
                if by_nvr.contains_key(&image.nvr) {
                    debug!(nvr = %image.nvr, "Skipping image already planned in this pass");
                    continue;
                }
                if let Some(existing) = self.store.dependency_build_for(event.id, &image.nvr).await? {
                    debug!(
                        nvr = %image.nvr,
                        dependency_event_id = existing.event_id,
                        "Skipping image already rebuilt in a dependency event"
                    );
                    continue;
                }

                let mut original_parent = image.parent.clone();
                let mut dep_on = image.parent.as_ref().and_then(|p| by_nvr.get(p)).copied();
                if let Some(parent) = &image.parent {
                    if let Some(parent_build) = self.store.dependency_build_for(event.id, parent).await? {
                        original_parent = parent_build.rebuilt_nvr.clone();
                        dep_on = None;
                    }
                }
                let parent_unit = dep_on.map(|index| &pass.builds[index]);

                let unit = ctx.with_build(&image.nvr).span().in_scope(|| {
                    self.image_unit(event.id, image, parent_unit, original_parent, stamp)
                });

                by_nvr.insert(image.nvr.clone(), pass.builds.len());
                pass.builds.push(unit);
            }

            info!(units = pass.len(), "Image rebuilds planned");
            FreshmakerResult::Ok(pass)
        }
        .instrument(ctx.span())
        .await
    }

    fn image_unit(
        &self,
        event_id: i64,
        image: &ContainerImage,
        parent_unit: Option<&ArtifactBuild>,
        original_parent: Option<String>,
        stamp: RebuildStamp,
    ) -> ArtifactBuild {
        let mut unit = ArtifactBuild::planned(
            event_id,
            Self::unit_name(&image.nvr, &image.name),
            &image.nvr,
            ArtifactType::Image,
        );
        unit.dep_on = parent_unit.map(|p| p.id);
        unit.rebuild_reason = if image.directly_affected {
            RebuildReason::Directly
        } else {
            RebuildReason::Dependency
        };
        unit.build_args = Some(BuildArgs {
            repository: image.repository.clone(),
            commit: image.commit.clone(),
            target: image.target.clone(),
            branch: image.git_branch.clone(),
            arches: image.arches.clone(),
            original_parent,
            operator_csv_modifications_url: None,
            flatpak: image.flatpak,
            isolated: image.isolated,
        });

        let rebuilt = rebuilt_nvr(ArtifactType::Image, &image.nvr, stamp.timestamp(), &self.release_suffix);

        let (state, reason) = if let Some(error) = &image.error {
            (ArtifactBuildState::Failed, error.clone())
        } else if parent_unit.is_some_and(|p| p.state == ArtifactBuildState::Failed) {
            (ArtifactBuildState::Failed, reasons::DEPENDENCY_FAILED.to_string())
        } else {
            match &rebuilt {
                Ok(_) => (ArtifactBuildState::Planned, reasons::PLANNED.to_string()),
                Err(e) => (ArtifactBuildState::Failed, e.to_string()),
            }
        };
        unit.rebuilt_nvr = rebuilt.ok().flatten();

        if state == ArtifactBuildState::Failed {
            warn!(reason = %reason, "Image rebuild cannot be planned");
        } else {
            debug!(rebuilt_nvr = ?unit.rebuilt_nvr, "Image rebuild planned");
        }
        unit.with_state(state, reason)
    }

    /// Plan bundle image rebuilds; each unit carries the manifest
    /// modifications the build system fetches from the override URL.
    pub async fn plan_bundles(
        &self,
        event: &TriggerEvent,
        bundles: &[BundleToRebuild],
        stamp: RebuildStamp,
        ctx: &LogContext,
    ) -> FreshmakerResult<PlannedPass> {
        async {
            let mut pass = PlannedPass::new(event.id);

            for bundle in bundles {
                if pass.contains(&bundle.nvr) {
                    debug!(nvr = %bundle.nvr, "Skipping bundle already planned in this pass");
                    continue;
                }

                let mut unit = ArtifactBuild::planned(
                    event.id,
                    Self::unit_name(&bundle.nvr, &bundle.nvr),
                    &bundle.nvr,
                    ArtifactType::Image,
                );
                unit.bundle_pullspec_overrides = Some(BundleOverrides {
                    pullspec_replacements: bundle.pullspec_replacements.clone(),
                    update: bundle.update.clone(),
                });

                let source = self.build_system.build(&bundle.nvr).await;
                let unit = ctx
                    .with_build(&bundle.nvr)
                    .span()
                    .in_scope(|| self.bundle_unit(unit, source, stamp));
                pass.builds.push(unit);
            }

            info!(units = pass.len(), "Bundle rebuilds planned");
            FreshmakerResult::Ok(pass)
        }
        .instrument(ctx.span())
        .await
    }

    fn bundle_unit(
        &self,
        mut unit: ArtifactBuild,
        source: FreshmakerResult<Option<BuildInfo>>,
        stamp: RebuildStamp,
    ) -> ArtifactBuild {
        let failure = |unit: ArtifactBuild, reason: String| {
            warn!(reason = %reason, "Bundle rebuild cannot be planned");
            unit.with_state(ArtifactBuildState::Failed, reason)
        };

        let info = match source {
            Ok(Some(info)) => info,
            Ok(None) => {
                let reason = format!("Build {} not found in the build system", unit.original_nvr);
                return failure(unit, reason);
            }
            Err(e) => return failure(unit, e.to_string()),
        };

        let url = match render_pullspec_override_url(&self.api_base_url, unit.id) {
            Ok(url) => url,
            Err(e) => return failure(unit, e.to_string()),
        };
        unit.build_args = Some(BuildArgs {
            repository: info.repository,
            commit: info.commit,
            target: info.target,
            branch: info.git_branch,
            arches: info.arches,
            original_parent: None,
            operator_csv_modifications_url: Some(url),
            flatpak: false,
            isolated: false,
        });

        match rebuilt_nvr(ArtifactType::Image, &unit.original_nvr, stamp.timestamp(), &self.release_suffix) {
            Ok(rebuilt) => unit.rebuilt_nvr = rebuilt,
            Err(e) => return failure(unit, e.to_string()),
        }

        debug!(rebuilt_nvr = ?unit.rebuilt_nvr, "Bundle rebuild planned");
        unit.with_state(ArtifactBuildState::Planned, reasons::PLANNED)
    }

    /// Persist the pass and move the event in one store call.
    ///
    /// An empty pass skips the event with `empty_reason`.
    pub async fn commit(&self, pass: PlannedPass, empty_reason: &str) -> FreshmakerResult<EventState> {
        let commit = pass.into_commit(empty_reason);
        let state = commit.event_state;
        let event_id = commit.event_id;
        let units = commit.builds.len();
        self.store.commit_plan(commit).await?;
        info!(event_id, units, state = %state, "Planning pass committed");
        Ok(state)
    }

    /// Units of the event that can be handed to the build system now
    pub async fn ready_units(&self, event_id: i64) -> FreshmakerResult<Vec<ArtifactBuild>> {
        let builds = self.store.builds_for_event(event_id).await?;
        let by_id: HashMap<Uuid, ArtifactBuildState> = builds.iter().map(|b| (b.id, b.state)).collect();
        Ok(builds
            .into_iter()
            .filter(|b| b.state == ArtifactBuildState::Planned)
            .filter(|b| match b.dep_on {
                Some(parent) => by_id.get(&parent) == Some(&ArtifactBuildState::Done),
                None => true,
            })
            .collect())
    }
}
