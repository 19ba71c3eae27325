//! # Bundle Resolution
//!
//! Digest-driven traversal from rebuilt operator images to the operator
//! bundles that reference them:
//!
//! 1. original and rebuilt NVRs are resolved to manifest list digests
//! 2. bundles whose related images reference an original digest are found
//! 3. each bundle's content digest is resolved to the image carrying it
//! 4. the build system supplies the bundle build's related image pullspecs,
//!    whose digests are rewritten to the rebuilt ones
//!
//! Results for the same bundle image are merged into one entry.

use super::eligibility::AutoRebuildEligibility;
use super::release_dates::ReleaseDateCache;
use crate::catalog::{CatalogImage, CatalogResult, ImageCatalog, OperatorBundle};
use crate::error::FreshmakerResult;
use crate::models::PullspecReplacement;
use crate::services::BuildSystem;
use crate::store::RebuildStore;
use crate::versioning::bundle::is_valid_semver;
use crate::versioning::{csv_updates, CsvUpdate, RebuildStamp};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// One bundle image selected for rebuild
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleToRebuild {
    /// NVR of the bundle image
    pub nvr: String,
    pub images: Vec<CatalogImage>,
    pub auto_rebuild: bool,
    pub osbs_pinning: bool,
    pub pullspec_replacements: Vec<PullspecReplacement>,
    pub update: CsvUpdate,
}

impl BundleToRebuild {
    /// Fold another result for the same bundle image into this one. Fields
    /// that cannot be merged keep the value seen first.
    fn merge(&mut self, other: BundleToRebuild) {
        let mut seen: HashSet<(String, Option<String>)> = self
            .pullspec_replacements
            .iter()
            .map(|r| (r.original.clone(), r.old.clone()))
            .collect();
        for replacement in other.pullspec_replacements {
            if seen.insert((replacement.original.clone(), replacement.old.clone())) {
                self.pullspec_replacements.push(replacement);
            }
        }
        for image in other.images {
            if !self.images.contains(&image) {
                self.images.push(image);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BundleResolution {
    Rebuild(Vec<BundleToRebuild>),
    /// Nothing can be resolved; the event should be skipped with this reason
    Skip(String),
}

/// Restrictions applied to manually requested rebuilds
#[derive(Debug, Clone, Default)]
pub struct BundleFilters {
    /// Only these bundle NVRs may be rebuilt
    pub allowed_nvrs: Option<HashSet<String>>,
    /// Drop bundles already rebuilt by an event this event depends on
    pub dependent_of_event: Option<i64>,
}

/// Rewrite pullspecs pinned to an original digest so they point at the
/// rebuilt digest. Pullspecs without a known digest are dropped.
pub fn replace_pullspecs(
    pullspecs: &[PullspecReplacement],
    rebuilt_digests: &HashMap<String, String>,
) -> Vec<PullspecReplacement> {
    pullspecs
        .iter()
        .filter_map(|pullspec| {
            let (repository, digest) = pullspec.new.split_once('@')?;
            let rebuilt = rebuilt_digests.get(digest)?;
            Some(PullspecReplacement {
                new: format!("{repository}@{rebuilt}"),
                old: Some(pullspec.new.clone()),
                ..pullspec.clone()
            })
        })
        .collect()
}

pub struct BundleResolver {
    catalog: Arc<dyn ImageCatalog>,
    build_system: Arc<dyn BuildSystem>,
    store: Arc<dyn RebuildStore>,
    eligibility: AutoRebuildEligibility,
    release_dates: Arc<ReleaseDateCache>,
    max_concurrent_lookups: usize,
}

impl BundleResolver {
    pub fn new(
        catalog: Arc<dyn ImageCatalog>,
        build_system: Arc<dyn BuildSystem>,
        store: Arc<dyn RebuildStore>,
        eligibility: AutoRebuildEligibility,
        release_dates: Arc<ReleaseDateCache>,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            catalog,
            build_system,
            store,
            eligibility,
            release_dates,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
        }
    }

    /// Paths of index images whose platform version has reached GA
    #[instrument(skip(self))]
    pub async fn released_index_paths(&self, organizations: &[String]) -> CatalogResult<Vec<String>> {
        let indices = self.catalog.operator_indices(organizations).await?;
        let mut paths = Vec::new();
        for index in indices {
            if !self.release_dates.is_released(&index.ocp_version).await {
                debug!(ocp_version = %index.ocp_version, "Index image not yet released");
                continue;
            }
            if let Some(path) = index.path {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        Ok(paths)
    }

    /// Bundles that must be rebuilt because images in `mapping`
    /// (original NVR → rebuilt NVR) were rebuilt
    #[instrument(skip(self, mapping, filters, stamp), fields(originals = mapping.len()))]
    pub async fn resolve(
        &self,
        mapping: &BTreeMap<String, String>,
        index_paths: &[String],
        filters: &BundleFilters,
        stamp: RebuildStamp,
    ) -> FreshmakerResult<BundleResolution> {
        let rebuilt_digests = self.digest_mapping(mapping).await?;
        if rebuilt_digests.is_empty() {
            let originals: Vec<&str> = mapping.keys().map(String::as_str).collect();
            return Ok(BundleResolution::Skip(format!(
                "None of the original images have digest in the catalog: {}",
                originals.join(", ")
            )));
        }

        let bundles = self.bundles_referencing(&rebuilt_digests, index_paths).await?;

        let resolved: Vec<Option<BundleToRebuild>> = stream::iter(bundles)
            .map(|bundle| {
                let rebuilt_digests = &rebuilt_digests;
                async move { self.resolve_bundle(bundle, rebuilt_digests, stamp).await }
            })
            .buffered(self.max_concurrent_lookups)
            .try_collect()
            .await?;

        let mut merged: Vec<BundleToRebuild> = Vec::new();
        for bundle in resolved.into_iter().flatten() {
            match merged.iter_mut().find(|b| b.nvr == bundle.nvr) {
                Some(existing) => {
                    debug!(nvr = %bundle.nvr, "Merging bundle results for the same image");
                    existing.merge(bundle);
                }
                None => merged.push(bundle),
            }
        }

        let mut to_rebuild = Vec::new();
        for bundle in merged {
            if !bundle.osbs_pinning {
                info!(nvr = %bundle.nvr, "Skipping bundle without pinned related images");
                continue;
            }
            if !bundle.auto_rebuild {
                info!(nvr = %bundle.nvr, "Skipping bundle without an auto-rebuild tag");
                continue;
            }
            if let Some(allowed) = &filters.allowed_nvrs {
                if !allowed.contains(&bundle.nvr) {
                    debug!(nvr = %bundle.nvr, "Bundle was not requested");
                    continue;
                }
            }
            if let Some(event_id) = filters.dependent_of_event {
                if let Some(build) = self.store.dependency_build_for(event_id, &bundle.nvr).await? {
                    debug!(
                        nvr = %bundle.nvr,
                        dependency_event_id = build.event_id,
                        "Bundle already rebuilt in a dependency event"
                    );
                    continue;
                }
            }
            to_rebuild.push(bundle);
        }

        info!(bundles = to_rebuild.len(), "Bundles resolved for rebuild");
        Ok(BundleResolution::Rebuild(to_rebuild))
    }

    /// Original manifest list digest → rebuilt manifest list digest
    async fn digest_mapping(
        &self,
        mapping: &BTreeMap<String, String>,
    ) -> CatalogResult<HashMap<String, String>> {
        let mut digests = HashMap::new();
        for (original, rebuilt) in mapping {
            let Some(original_digest) = self.catalog.manifest_list_digest_by_nvr(original, true).await?
            else {
                warn!(nvr = %original, "Original image has no published manifest list digest");
                continue;
            };
            let Some(rebuilt_digest) = self.catalog.manifest_list_digest_by_nvr(rebuilt, false).await?
            else {
                warn!(nvr = %rebuilt, "Rebuilt image has no manifest list digest");
                continue;
            };
            digests.insert(original_digest, rebuilt_digest);
        }
        Ok(digests)
    }

    /// Bundles referencing any original digest, unique by bundle content
    /// digest and with a valid semantic version
    async fn bundles_referencing(
        &self,
        rebuilt_digests: &HashMap<String, String>,
        index_paths: &[String],
    ) -> CatalogResult<Vec<OperatorBundle>> {
        // Sorted so the traversal order does not depend on hashing
        let mut originals: Vec<String> = rebuilt_digests.keys().cloned().collect();
        originals.sort();

        let found: Vec<Vec<OperatorBundle>> = stream::iter(originals)
            .map(|digest| async move {
                self.catalog
                    .bundles_by_related_image_digest(&digest, index_paths, true)
                    .await
            })
            .buffered(self.max_concurrent_lookups)
            .try_collect()
            .await?;

        let mut seen = HashSet::new();
        let mut bundles = Vec::new();
        for bundle in found.into_iter().flatten() {
            if !is_valid_semver(&bundle.version_original) {
                error!(
                    csv_name = %bundle.csv_name,
                    version = %bundle.version_original,
                    "Skipping bundle with an invalid semantic version"
                );
                continue;
            }
            let Some(digest) = bundle.bundle_path_digest.clone() else {
                warn!(csv_name = %bundle.csv_name, "Skipping bundle without bundle path digest");
                continue;
            };
            if seen.insert(digest) {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }

    async fn resolve_bundle(
        &self,
        bundle: OperatorBundle,
        rebuilt_digests: &HashMap<String, String>,
        stamp: RebuildStamp,
    ) -> FreshmakerResult<Option<BundleToRebuild>> {
        let Some(bundle_digest) = bundle.bundle_path_digest.as_deref() else {
            return Ok(None);
        };
        let images = self.catalog.images_by_digest(bundle_digest).await?;
        let Some(nvr) = images.iter().find_map(|i| i.nvr()).map(str::to_string) else {
            warn!(digest = %bundle_digest, "No image found for bundle digest");
            return Ok(None);
        };

        let mut auto_rebuild = false;
        for image in &images {
            if self.eligibility.image_has_auto_rebuild_tag(image).await? {
                auto_rebuild = true;
                break;
            }
        }

        let (osbs_pinning, pullspec_replacements) = match self.build_system.build(&nvr).await? {
            Some(info) => (
                info.created_by_osbs,
                replace_pullspecs(&info.related_image_pullspecs, rebuilt_digests),
            ),
            None => {
                warn!(nvr = %nvr, "Bundle build not found in build system");
                (false, Vec::new())
            }
        };

        let update = match csv_updates(&bundle.csv_name, &bundle.version_original, stamp) {
            Ok(update) => update,
            Err(e) => {
                error!(nvr = %nvr, error = %e, "Cannot compute CSV update for bundle");
                return Ok(None);
            }
        };

        Ok(Some(BundleToRebuild {
            nvr,
            images,
            auto_rebuild,
            osbs_pinning,
            pullspec_replacements,
            update,
        }))
    }

    /// `_old → new` pullspec map recorded on already rebuilt bundle images
    async fn pullspec_mapping(&self, bundle_images: &[String]) -> FreshmakerResult<HashMap<String, String>> {
        let mut mapping = HashMap::new();
        for nvr in bundle_images {
            let Some(build) = self.store.build_by_rebuilt_nvr(nvr).await? else {
                warn!("Can't find build for a bundle image \"{nvr}\"");
                continue;
            };
            let Some(overrides) = build.bundle_pullspec_overrides else {
                continue;
            };
            for replacement in overrides.pullspec_replacements {
                if let Some(old) = replacement.old {
                    mapping.insert(old, replacement.new);
                }
            }
        }
        Ok(mapping)
    }

    /// Bundles for a release-driver request.
    ///
    /// `container_images` are the bundle images to rebuild; `bundle_images`
    /// are bundles already rebuilt for the release, whose pullspec changes
    /// are carried over.
    #[instrument(skip(self, stamp))]
    pub async fn release_driver_bundles(
        &self,
        container_images: &[String],
        bundle_images: &[String],
        stamp: RebuildStamp,
    ) -> FreshmakerResult<Vec<BundleToRebuild>> {
        let remap = self.pullspec_mapping(bundle_images).await?;
        let mut bundles = Vec::new();

        for nvr in container_images {
            let recorded = self
                .store
                .build_by_rebuilt_nvr(nvr)
                .await?
                .and_then(|build| build.bundle_pullspec_overrides);
            let mut replacements = match recorded {
                Some(overrides) => overrides.pullspec_replacements,
                None => match self.build_system.build(nvr).await? {
                    Some(info) => info.related_image_pullspecs,
                    None => {
                        warn!(nvr = %nvr, "Bundle build not found in build system");
                        Vec::new()
                    }
                },
            };
            for replacement in &mut replacements {
                if let Some(new) = remap.get(&replacement.new) {
                    replacement.new = new.clone();
                }
            }

            let Some(digest) = self.catalog.manifest_list_digest_by_nvr(nvr, true).await? else {
                warn!(nvr = %nvr, "Bundle image has no published manifest list digest");
                continue;
            };
            let found = self.catalog.bundles_by_digest(&digest).await?;
            let Some(bundle) = found.first() else {
                warn!(nvr = %nvr, digest = %digest, "No bundle found for bundle image digest");
                continue;
            };
            let update = match csv_updates(&bundle.csv_name, &bundle.version_original, stamp) {
                Ok(update) => update,
                Err(e) => {
                    error!(nvr = %nvr, error = %e, "Cannot compute CSV update for bundle");
                    continue;
                }
            };

            bundles.push(BundleToRebuild {
                nvr: nvr.clone(),
                images: Vec::new(),
                auto_rebuild: true,
                osbs_pinning: true,
                pullspec_replacements: replacements,
                update,
            });
        }

        Ok(bundles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pullspec(new: &str, original: &str) -> PullspecReplacement {
        PullspecReplacement {
            new: new.to_string(),
            original: original.to_string(),
            pinned: true,
            old: None,
        }
    }

    #[test]
    fn test_replace_pullspecs_rewrites_known_digests() {
        let digests = HashMap::from([(
            "original_1_digest".to_string(),
            "rebuilt_1_digest".to_string(),
        )]);
        let replaced = replace_pullspecs(
            &[
                pullspec("registry/repo/operator1@original_1_digest", "registry/repo/operator1:v2.2.0"),
                pullspec("registry/repo/other@unknown", "registry/repo/other:v1"),
                pullspec("registry/repo/tagged:v1", "registry/repo/tagged:v1"),
            ],
            &digests,
        );
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].new, "registry/repo/operator1@rebuilt_1_digest");
        assert_eq!(
            replaced[0].old.as_deref(),
            Some("registry/repo/operator1@original_1_digest")
        );
        assert_eq!(replaced[0].original, "registry/repo/operator1:v2.2.0");
    }

    #[test]
    fn test_merge_unions_replacements_first_seen_wins() {
        let update = csv_updates("image.1.2.3", "1.2.3", RebuildStamp::from_timestamp(1608854400)).unwrap();
        let mut first = BundleToRebuild {
            nvr: "bundle-1-1".to_string(),
            images: Vec::new(),
            auto_rebuild: true,
            osbs_pinning: true,
            pullspec_replacements: vec![PullspecReplacement {
                old: Some("a@1".to_string()),
                ..pullspec("a@2", "a:v1")
            }],
            update: update.clone(),
        };
        let second = BundleToRebuild {
            auto_rebuild: false,
            pullspec_replacements: vec![
                PullspecReplacement {
                    old: Some("a@1".to_string()),
                    ..pullspec("a@3", "a:v1")
                },
                PullspecReplacement {
                    old: Some("b@1".to_string()),
                    ..pullspec("b@2", "b:v1")
                },
            ],
            ..first.clone()
        };

        first.merge(second);
        assert!(first.auto_rebuild);
        let news: Vec<&str> = first.pullspec_replacements.iter().map(|r| r.new.as_str()).collect();
        assert_eq!(news, vec!["a@2", "b@2"]);
    }
}
