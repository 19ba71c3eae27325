//! Advisory-driven resolution: which released images contain an RPM older
//! than the fix shipped by an advisory.

use super::eligibility::AutoRebuildEligibility;
use crate::catalog::ImageCatalog;
use crate::error::FreshmakerResult;
use crate::services::{AdvisoryService, BuildSystem, ContentIndex};
use crate::versioning::{compare_evr, Nvr};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Index RPM NVRs by package name, dropping unparseable entries. The last
/// occurrence of a name wins.
fn rpms_by_name(nvrs: &[String]) -> HashMap<String, Nvr> {
    let mut by_name = HashMap::new();
    for nvr in nvrs {
        match Nvr::parse(nvr) {
            Ok(parsed) => {
                by_name.insert(parsed.name.clone(), parsed);
            }
            Err(e) => warn!(nvr = %nvr, error = %e, "Skipping unparseable RPM NVR"),
        }
    }
    by_name
}

/// True when some RPM in the image has the same name as an advisory RPM and
/// a strictly lower version-release. Epochs are ignored on both sides.
pub fn needs_rebuild(image_rpms: &[String], advisory_rpms: &[String]) -> bool {
    let fixed = rpms_by_name(advisory_rpms);
    rpms_by_name(image_rpms).into_iter().any(|(name, mut installed)| {
        let Some(fix) = fixed.get(&name) else {
            return false;
        };
        let mut fix = fix.clone();
        installed.epoch = None;
        fix.epoch = None;
        compare_evr(&installed, &fix) == Ordering::Less
    })
}

pub struct AdvisoryResolver {
    advisories: Arc<dyn AdvisoryService>,
    build_system: Arc<dyn BuildSystem>,
    content_index: Arc<dyn ContentIndex>,
    catalog: Arc<dyn ImageCatalog>,
    eligibility: AutoRebuildEligibility,
    max_concurrent_lookups: usize,
}

impl AdvisoryResolver {
    pub fn new(
        advisories: Arc<dyn AdvisoryService>,
        build_system: Arc<dyn BuildSystem>,
        content_index: Arc<dyn ContentIndex>,
        catalog: Arc<dyn ImageCatalog>,
        eligibility: AutoRebuildEligibility,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            advisories,
            build_system,
            content_index,
            catalog,
            eligibility,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
        }
    }

    /// Image NVRs to rebuild for the advisory, in content index order
    #[instrument(skip(self))]
    pub async fn images_to_rebuild(&self, errata_id: i64) -> FreshmakerResult<Vec<String>> {
        let advisory_rpms = self.advisories.affected_rpm_nvrs(errata_id).await?;
        let module_nvrs = self.advisories.affected_module_nvrs(errata_id).await?;

        let mut candidates = Vec::new();
        for module_nvr in &module_nvrs {
            let Some(module) = self.build_system.module_stream(module_nvr).await? else {
                warn!(module_nvr = %module_nvr, "Module build not found in build system");
                continue;
            };
            candidates.extend(self.content_index.images_for_module(&module).await?);
        }
        debug!(
            modules = module_nvrs.len(),
            candidates = candidates.len(),
            "Collected images built from advisory modules"
        );

        // Buffered keeps input order, which the planner relies on
        let checked: Vec<Option<String>> = stream::iter(candidates)
            .map(|nvr| {
                let advisory_rpms = &advisory_rpms;
                async move {
                    let affected = self.image_is_affected(&nvr, advisory_rpms).await?;
                    FreshmakerResult::Ok(affected.then_some(nvr))
                }
            })
            .buffered(self.max_concurrent_lookups)
            .try_collect()
            .await?;

        let mut seen = HashSet::new();
        let images: Vec<String> = checked
            .into_iter()
            .flatten()
            .filter(|nvr| seen.insert(nvr.clone()))
            .collect();

        info!(errata_id, images = images.len(), "Images affected by advisory");
        Ok(images)
    }

    async fn image_is_affected(&self, nvr: &str, advisory_rpms: &[String]) -> FreshmakerResult<bool> {
        let Some(image_id) = self.eligibility.rebuild_image_id(nvr).await? else {
            debug!(nvr = %nvr, "Image is not eligible for automatic rebuild");
            return Ok(false);
        };
        let Some(image_rpms) = self.catalog.image_rpm_nvrs(&image_id).await? else {
            warn!(nvr = %nvr, image_id = %image_id, "Image has no RPM manifest");
            return Ok(false);
        };
        Ok(needs_rebuild(&image_rpms, advisory_rpms))
    }
}
